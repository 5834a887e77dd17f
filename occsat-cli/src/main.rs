use std::env;
use std::fs;
use std::io::{self, Read, Write};

use anyhow::Error;
use clap::{values_t, App, AppSettings, Arg};
use env_logger::fmt::Formatter;
use env_logger::{Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use occsat::config::{SolverConfig, SolverConfigUpdate};
use occsat::{Lit, Solver};

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("OCCSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is occsat {}", env!("CARGO_PKG_VERSION"));
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("occsat")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read parameters from configuration file'")
        .arg(
            Arg::from_usage("[config-option] -C --config-option")
                .value_name("OPTION>=<VALUE")
                .help("Specify a single config option, see 'occsat -C help' for a list of options.")
                .multiple(true)
                .number_of_values(1),
        )
        .get_matches();

    if values_t!(matches, "config-option", String)
        .unwrap_or_else(|_| vec![])
        .iter()
        .any(|option| option == "help")
    {
        print!("{}", SolverConfig::help());
        return Ok(0);
    }

    init_logging();
    banner();

    let mut config_update = SolverConfigUpdate::default();

    if let Some(config_path) = matches.value_of("config-file") {
        let mut config_contents = String::new();
        fs::File::open(config_path)?.read_to_string(&mut config_contents)?;

        config_update.merge(toml::from_str(&config_contents)?);
    }

    for config_option in values_t!(matches, "config-option", String).unwrap_or_else(|_| vec![]) {
        config_update.merge(toml::from_str(&config_option)?);
    }

    let mut solver = Solver::new();

    solver.config(&config_update)?;

    let stdin = io::stdin();

    let mut locked_stdin;
    let mut opened_file;

    let file: &mut dyn io::Read = match matches.value_of("INPUT") {
        Some(path) => {
            info!("Reading file '{}'", path);
            opened_file = fs::File::open(path)?;
            &mut opened_file
        }
        None => {
            info!("Reading from stdin");
            locked_stdin = stdin.lock();
            &mut locked_stdin
        }
    };

    solver.add_dimacs_cnf(file)?;

    match solver.solve() {
        None => {
            println!("s UNKNOWN");
            Ok(0)
        }
        Some(false) => {
            println!("s UNSATISFIABLE");
            Ok(20)
        }
        Some(true) => {
            println!("s SATISFIABLE");

            let model = solver.model().expect("satisfiable solve has a model");
            print_model(&model)?;

            Ok(10)
        }
    }
}

/// Print the model as space separated signed integers, terminated by 0.
fn print_model(model: &[Lit]) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();

    let mut line = String::from("v");
    for lit in model {
        if line.len() > 70 {
            writeln!(stdout_lock, "{}", line)?;
            line.clear();
            line.push('v');
        }
        line.push_str(&format!(" {}", lit));
    }
    writeln!(stdout_lock, "{} 0", line)?;

    Ok(())
}
