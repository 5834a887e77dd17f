//! Boolean satisfiability solver.
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use partial_ref::{partial, IntoPartialRef, IntoPartialRefMut, PartialRef};

use anyhow::Error;
use log::info;
use thiserror::Error;

use occsat_dimacs::DimacsParser;
use occsat_formula::{CnfFormula, ExtendFormula, Lit, Var};

use crate::config::SolverConfigUpdate;
use crate::context::{config_changed, ensure_var_count, parts::*, Context};
use crate::load::load_clause;
use crate::model::compute_full_model;
use crate::proc::extend::un_eliminate;
use crate::schedule::schedule_step;
use crate::state::SatState;
use crate::variables::Removed;

/// Errors reported by the solver API.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
}

/// A boolean satisfiability solver with in-processing simplification.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Change the solver configuration.
    pub fn config(&mut self, config_update: &SolverConfigUpdate) -> Result<(), SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        {
            let config = ctx.part_mut(SolverConfigP);
            config_update.apply(config);
            config.validate().map_err(SolverError::InvalidConfig)?;
        }
        config_changed(ctx.borrow(), config_update);
        Ok(())
    }

    /// Add a formula to the solver.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            Self::load_clause_resolving_eliminated(ctx.borrow(), clause);
        }
    }

    /// Reads and adds a formula in DIMACS CNF format.
    ///
    /// Using this avoids creating a temporary [`CnfFormula`].
    pub fn add_dimacs_cnf(&mut self, input: impl io::Read) -> Result<(), Error> {
        let parser = DimacsParser::parse_incremental(input, |parser| {
            self.add_formula(&parser.take_formula());
            Ok(())
        })?;

        info!(
            "Parsed formula with {} variables and {} clauses",
            parser.var_count(),
            parser.clause_count()
        );

        Ok(())
    }

    fn load_clause_resolving_eliminated(
        mut ctx: partial!(
            Context,
            mut AssignmentP,
            mut BlockedClausesP,
            mut ClauseAllocP,
            mut ClauseDbP,
            mut EliminatorP,
            mut ImplGraphP,
            mut ProcP,
            mut SolverStateP,
            mut TmpDataP,
            mut TrailP,
            mut VariablesP,
            mut VsidsP,
            mut WatchlistsP,
        ),
        clause: &[Lit],
    ) {
        crate::prop::full_restart(ctx.borrow());

        // New clauses over eliminated variables force those back into the solver.
        loop {
            let eliminated = clause.iter().find(|&&lit| {
                ctx.part(VariablesP)
                    .lit_from_outer(lit)
                    .map(|inner| {
                        ctx.part(VariablesP).removed(inner.var()) == Removed::Eliminated
                    })
                    .unwrap_or(false)
            });
            match eliminated {
                None => break,
                Some(&lit) => un_eliminate(ctx.borrow(), lit.var()),
            }
        }

        let inner_clause: Vec<Lit> = clause
            .iter()
            .map(|&lit| {
                ctx.part(VariablesP)
                    .lit_from_outer(lit)
                    .expect("outer variable without inner name")
            })
            .collect();

        load_clause(ctx.borrow(), &inner_clause);
    }

    /// Check the satisfiability of the current formula.
    ///
    /// Returns `None` when the conflict budget ran out or the solver was interrupted before a
    /// result was established.
    pub fn solve(&mut self) -> Option<bool> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        while schedule_step(ctx.borrow()) {}

        match ctx.part(SolverStateP).sat_state {
            SatState::Unknown => None,
            SatState::Sat => {
                compute_full_model(ctx.borrow());
                Some(true)
            }
            SatState::Unsat => Some(false),
        }
    }

    /// Set of literals that satisfy the formula.
    pub fn model(&self) -> Option<Vec<Lit>> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state != SatState::Sat {
            return None;
        }
        ctx.part(SolverStateP).full_model.as_ref().map(|model| {
            model
                .iter()
                .enumerate()
                .map(|(index, &value)| Var::from_index(index).lit(!value))
                .collect()
        })
    }

    /// A handle to interrupt a running solve from another thread.
    ///
    /// The solver polls the flag between major phases and returns with an unknown result,
    /// leaving a consistent database behind.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        let ctx = self.ctx.into_partial_ref();
        ctx.part(SolverStateP).interrupt.clone()
    }

    /// Clear an interrupt set by [`interrupt_handle`](Solver::interrupt_handle).
    pub fn clear_interrupt(&mut self) {
        let ctx = self.ctx.into_partial_ref();
        ctx.part(SolverStateP)
            .interrupt
            .store(false, Ordering::Relaxed);
    }
}

impl ExtendFormula for Solver {
    fn add_clause(&mut self, clause: &[Lit]) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let mut var_count = ctx.part(AssignmentP).assignment().len();
        for &lit in clause.iter() {
            var_count = std::cmp::max(var_count, lit.index() + 1);
        }
        ensure_var_count(ctx.borrow(), var_count);
        Self::load_clause_resolving_eliminated(ctx.borrow(), clause);
    }

    fn new_var(&mut self) -> Var {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let count = ctx.part(AssignmentP).assignment().len();
        ensure_var_count(ctx.borrow(), count + 1);
        Var::from_index(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use occsat_dimacs::write_dimacs;

    use crate::test::{sat_formula, sgen_unsat_formula};

    fn check_model(formula: &CnfFormula, model: &[Lit]) -> bool {
        formula
            .iter()
            .all(|clause| clause.iter().any(|lit| model.contains(lit)))
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(false));
        }

        #[test]
        fn sat_with_model(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(true));

            let model = solver.model().unwrap();
            prop_assert!(check_model(&formula, &model));
        }

        #[test]
        fn sat_via_dimacs(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            let mut dimacs = vec![];

            write_dimacs(&mut dimacs, &formula).unwrap();

            solver.add_dimacs_cnf(&mut &dimacs[..]).unwrap();

            prop_assert_eq!(solver.solve(), Some(true));

            let model = solver.model().unwrap();
            prop_assert!(check_model(&formula, &model));
        }

        #[test]
        fn incremental_clause_adding(formula in sgen_unsat_formula(1..5usize)) {
            let mut solver = Solver::new();

            let mut last_state = Some(true);

            for clause in formula.iter() {
                solver.add_clause(clause);

                let state = solver.solve();

                if state != last_state {
                    prop_assert_eq!(state, Some(false));
                    prop_assert_eq!(last_state, Some(true));
                    last_state = state;
                }
            }

            prop_assert_eq!(last_state, Some(false));
        }
    }
}
