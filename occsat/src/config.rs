//! Solver configuration.
use serde::Deserialize;

/// Configurable parameters used during solving.
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic.
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities.
    pub clause_activity_decay: f32,

    /// Number of conflicts between local clause reductions.
    pub reduce_locals_interval: u64,

    /// Number of conflicts between mid clause reductions.
    pub reduce_mids_interval: u64,

    /// Scaling factor for luby sequence based restarts (number of conflicts).
    pub luby_restart_interval_scale: u64,

    /// Number of conflicts between in-processing simplification rounds.
    pub simplify_interval: u64,

    /// Whether in-processing simplification runs at all.
    pub inprocessing: bool,

    /// Whether OR-gate based rewriting runs during simplification.
    pub gate_finding: bool,

    /// Whether bounded variable elimination runs during simplification.
    pub variable_elimination: bool,

    /// Whether blocked clause elimination runs during simplification.
    pub blocked_clause_elimination: bool,

    /// Step budget for backward subsumption per simplification round.
    pub subsume0_budget: i64,

    /// Step budget for self-subsuming resolution per simplification round.
    pub subsume1_budget: i64,

    /// Step budget for OR-gate discovery per simplification round.
    pub gate_finder_budget: i64,

    /// Step budget for gate based clause shortening per simplification round.
    pub shorten_with_gates_budget: i64,

    /// Step budget for gate based clause removal per simplification round.
    pub cl_rem_with_gates_budget: i64,

    /// Step budget for variable elimination per simplification round.
    pub elim_budget: i64,

    /// Step budget for blocked clause elimination per simplification round.
    pub block_budget: i64,

    /// Memory cap in MB for linking irredundant clauses into occurrence lists.
    pub max_occur_irred_mb: usize,

    /// Memory cap in MB for linking redundant clauses into occurrence lists.
    pub max_occur_red_mb: usize,

    /// Redundant clauses longer than this are not linked into occurrence lists.
    pub max_red_link_in_size: usize,

    /// Maximal size of the left hand side of discovered OR-gates.
    pub max_gate_size: usize,

    /// Variable elimination scoring: 0 uses occurrence counts, 1 uses trial resolution.
    pub elim_strategy: u32,

    /// Seed for the solver's pseudorandom sampling.
    pub rng_seed: u64,

    /// Stop after this many conflicts and report an unknown result, 0 means no limit.
    pub max_conflicts: u64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            vsids_decay: 0.95,
            clause_activity_decay: 0.999,
            reduce_locals_interval: 15_000,
            reduce_mids_interval: 10_000,
            luby_restart_interval_scale: 128,
            simplify_interval: 30_000,
            inprocessing: true,
            gate_finding: true,
            variable_elimination: true,
            blocked_clause_elimination: true,
            subsume0_budget: 800_000_000,
            subsume1_budget: 400_000_000,
            gate_finder_budget: 100_000_000,
            shorten_with_gates_budget: 100_000_000,
            cl_rem_with_gates_budget: 100_000_000,
            elim_budget: 400_000_000,
            block_budget: 400_000_000,
            max_occur_irred_mb: 800,
            max_occur_red_mb: 800,
            max_red_link_in_size: 200,
            max_gate_size: 7,
            elim_strategy: 0,
            rng_seed: 91_648_253,
            max_conflicts: 0,
        }
    }
}

macro_rules! config_update {
    ( $( $field:ident : $ty:ty ),* $(,)? ) => {
        /// A partial [`SolverConfig`] used to update individual parameters.
        ///
        /// Every field mirrors a `SolverConfig` field; fields left as `None` keep their current
        /// value. This can be deserialized from TOML fragments like `vsids_decay = 0.9`.
        #[derive(Default, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct SolverConfigUpdate {
            $( pub $field: Option<$ty>, )*
        }

        impl SolverConfigUpdate {
            /// Merge another update into this one, with the other taking precedence.
            pub fn merge(&mut self, other: SolverConfigUpdate) {
                $( if let Some(value) = other.$field { self.$field = Some(value); } )*
            }

            /// Apply the update to a configuration.
            pub fn apply(&self, config: &mut SolverConfig) {
                $( if let Some(value) = self.$field { config.$field = value; } )*
            }
        }

        impl SolverConfig {
            /// A help string listing all configurable options.
            pub fn help() -> String {
                let defaults = SolverConfig::default();
                let mut help = String::from("solver configuration options:\n");
                $(
                    help.push_str(&format!(
                        "  {} (default: {:?})\n",
                        stringify!($field),
                        defaults.$field,
                    ));
                )*
                help
            }
        }
    };
}

config_update! {
    vsids_decay: f32,
    clause_activity_decay: f32,
    reduce_locals_interval: u64,
    reduce_mids_interval: u64,
    luby_restart_interval_scale: u64,
    simplify_interval: u64,
    inprocessing: bool,
    gate_finding: bool,
    variable_elimination: bool,
    blocked_clause_elimination: bool,
    subsume0_budget: i64,
    subsume1_budget: i64,
    gate_finder_budget: i64,
    shorten_with_gates_budget: i64,
    cl_rem_with_gates_budget: i64,
    elim_budget: i64,
    block_budget: i64,
    max_occur_irred_mb: usize,
    max_occur_red_mb: usize,
    max_red_link_in_size: usize,
    max_gate_size: usize,
    elim_strategy: u32,
    rng_seed: u64,
    max_conflicts: u64,
}

impl SolverConfig {
    /// Check an updated configuration for consistency.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.vsids_decay < 1.0 && self.vsids_decay > 1.0 / 16.0) {
            return Err("vsids_decay must be in (1/16, 1)".to_string());
        }
        if !(self.clause_activity_decay < 1.0 && self.clause_activity_decay > 1.0 / 16.0) {
            return Err("clause_activity_decay must be in (1/16, 1)".to_string());
        }
        if self.elim_strategy > 1 {
            return Err("elim_strategy must be 0 or 1".to_string());
        }
        if self.reduce_locals_interval == 0
            || self.reduce_mids_interval == 0
            || self.simplify_interval == 0
        {
            return Err("schedule intervals must be nonzero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_merge_and_apply() {
        let mut config = SolverConfig::default();

        let mut update = SolverConfigUpdate::default();
        update.vsids_decay = Some(0.9);

        let mut other = SolverConfigUpdate::default();
        other.vsids_decay = Some(0.8);
        other.max_gate_size = Some(4);

        update.merge(other);
        update.apply(&mut config);

        assert_eq!(config.vsids_decay, 0.8);
        assert_eq!(config.max_gate_size, 4);
        assert_eq!(
            config.simplify_interval,
            SolverConfig::default().simplify_interval
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn help_lists_every_option() {
        let help = SolverConfig::help();
        assert!(help.contains("vsids_decay"));
        assert!(help.contains("elim_budget"));
    }
}
