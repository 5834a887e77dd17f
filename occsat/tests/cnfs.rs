//! End-to-end tests on small concrete formulas.
use proptest::prelude::*;

use occsat::config::SolverConfigUpdate;
use occsat::{CnfFormula, Lit, Solver};

use occsat_formula::{cnf::strategy::cnf_formula as arbitrary_formula, cnf_formula, lits};

fn solve(formula: &CnfFormula) -> (Option<bool>, Option<Vec<Lit>>) {
    let mut solver = Solver::new();
    solver.add_formula(formula);
    let result = solver.solve();
    let model = solver.model();
    (result, model)
}

fn check_model(formula: &CnfFormula, model: &[Lit]) -> bool {
    formula
        .iter()
        .all(|clause| clause.iter().any(|lit| model.contains(lit)))
}

#[test]
fn contradiction_on_two_vars() {
    let formula = cnf_formula![
        1, 2;
        -1, 2;
        1, -2;
        -1, -2;
    ];

    let (result, _) = solve(&formula);
    assert_eq!(result, Some(false));
}

#[test]
fn elimination_extends_the_model() {
    // Variable 1 is a prime elimination candidate; any model of the residual formula must be
    // extended through the blocked clause log into a model of the original.
    let formula = cnf_formula![
        1, 2, 3;
        -1, 2, 3;
        1, -2, 3;
        1, 2, -3;
    ];

    let (result, model) = solve(&formula);
    assert_eq!(result, Some(true));
    assert!(check_model(&formula, &model.unwrap()));
}

#[test]
fn gate_instance_stays_sat() {
    // Contains the OR-gate 4 ≡ 1 ∨ 2 ∨ 3; gate rewriting, subsumption and blocked clause
    // elimination between them remove a clause without changing satisfiability.
    let formula = cnf_formula![
        -4, 1, 2, 3;
        4, -1;
        4, -2;
        4, -3;
        -1, -2, -3, 5;
        -4, 5;
    ];

    let (result, model) = solve(&formula);
    assert_eq!(result, Some(true));
    assert!(check_model(&formula, &model.unwrap()));
}

#[test]
fn subsumed_clause_is_removed() {
    let formula = cnf_formula![
        1, 2, 3;
        1, 2, 3, 4;
    ];

    let (result, model) = solve(&formula);
    assert_eq!(result, Some(true));
    assert!(check_model(&formula, &model.unwrap()));
}

#[test]
fn self_subsumption_instance() {
    let formula = cnf_formula![
        1, 2, 3;
        -1, 2, 3, 4;
    ];

    let (result, model) = solve(&formula);
    assert_eq!(result, Some(true));
    assert!(check_model(&formula, &model.unwrap()));
}

#[test]
fn pure_literal_is_assigned_true_on_replay() {
    // Variable 7 appears only positively, so it is eliminated with zero resolvents and the
    // extender assigns it true during replay.
    let formula = cnf_formula![
        7, 1, 2;
        7, -1, -2;
        1, -2, 3;
        -1, 2, 3;
    ];

    let (result, model) = solve(&formula);
    assert_eq!(result, Some(true));

    let model = model.unwrap();
    assert!(model.contains(&lits![7][0]));
    assert!(check_model(&formula, &model));
}

#[test]
fn empty_formula_is_sat() {
    let formula = CnfFormula::new();

    let (result, _) = solve(&formula);
    assert_eq!(result, Some(true));
}

#[test]
fn conflicting_units() {
    let formula = cnf_formula![
        5;
        -5;
    ];

    let (result, _) = solve(&formula);
    assert_eq!(result, Some(false));
}

#[test]
fn adding_clauses_over_eliminated_variables() {
    use occsat::ExtendFormula;

    // First solve eliminates variables; the added clause forces them back in.
    let formula = cnf_formula![
        1, 2, 3;
        -1, 2, 3;
        1, -2, 3;
        1, 2, -3;
    ];

    let mut solver = Solver::new();
    solver.add_formula(&formula);
    assert_eq!(solver.solve(), Some(true));

    // The original clauses force at least two true variables, the new ones forbid any two.
    solver.add_clause(&lits![-1, -2]);
    solver.add_clause(&lits![-1, -3]);
    solver.add_clause(&lits![-2, -3]);

    assert_eq!(solver.solve(), Some(false));
}

proptest! {
    #[test]
    fn simplification_agrees_with_plain_search(
        formula in arbitrary_formula(1..20usize, 0..60, 0..6),
    ) {
        let mut with_simp = Solver::new();
        with_simp.add_formula(&formula);

        let mut without_simp = Solver::new();
        let mut update = SolverConfigUpdate::default();
        update.inprocessing = Some(false);
        without_simp.config(&update).unwrap();
        without_simp.add_formula(&formula);

        let result = with_simp.solve();
        prop_assert_eq!(result, without_simp.solve());

        if result == Some(true) {
            let model = with_simp.model().unwrap();
            prop_assert!(check_model(&formula, &model));
        }
    }
}
