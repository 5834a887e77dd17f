//! Unit propagation.
pub mod assignment;
pub mod graph;
pub mod long;
pub mod watch;

pub use assignment::{backtrack, enqueue_assignment, full_restart, Assignment, Trail};
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use watch::{attach_all_longs, detach_all_longs, LongWatchMode, Watch, Watchlists};

use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};

/// Propagate all enqueued assignments.
///
/// Propagates binary and ternary clauses from the watchlists and long clauses using the
/// two-watched-literals scheme. If long watches are detached they are rebuilt first.
///
/// On conflict returns the clause that would become empty under the current assignment.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
        ClauseDbP,
    ),
) -> Result<(), Conflict> {
    if ctx.part(WatchlistsP).mode() == LongWatchMode::Detached {
        attach_all_longs(ctx.borrow());
    }

    debug_assert_eq!(ctx.part(WatchlistsP).mode(), LongWatchMode::Propagation);

    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        long::propagate_watches(ctx.borrow(), lit)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use occsat_formula::{cnf_formula, lits};

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::state::SatState;

    #[test]
    fn propagation_through_all_clause_lengths() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            -1, 2;
            -2, -3, 4;
            -4, -2, 5, 6;
            -6;
        ];

        set_var_count(ctx.borrow(), formula.var_count());

        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        load_clause(ctx.borrow(), &lits![1]);
        load_clause(ctx.borrow(), &lits![3]);

        assert!(propagate(ctx.borrow()).is_ok());

        for lit in lits![1, 2, 3, 4, 5, -6].iter() {
            assert!(ctx.part(AssignmentP).lit_is_true(*lit));
        }
    }

    #[test]
    fn propagation_finds_long_conflict() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            -1, 3, 4, 5;
            -1, 3, 4, -5;
            -3;
            -4;
        ];

        set_var_count(ctx.borrow(), formula.var_count());

        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        assert!(propagate(ctx.borrow()).is_ok());

        load_clause(ctx.borrow(), &lits![1]);

        assert!(propagate(ctx.borrow()).is_err());
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }
}
