//! Adding clauses to the solver.
use partial_ref::{partial, PartialRef};

use occsat_formula::Lit;

use crate::clause::{assess::select_tier, db, ClauseHeader, ClauseRef, Tier};
use crate::context::{parts::*, Context};
use crate::proc::occur;
use crate::prop::{enqueue_assignment, full_restart, LongWatchMode, Reason};
use crate::state::SatState;

/// Adds a clause to the current formula.
///
/// Removes duplicated literals, ignores tautological clauses (eg. x v -x v y), handles empty
/// clauses and dispatches among unit, binary, ternary and long clauses.
///
/// Does not adjust the solver's variable count. If necessary that has to be done before calling
/// this.
pub fn load_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProcP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    lits: &[Lit],
) {
    match ctx.part(SolverStateP).sat_state {
        SatState::Unsat => return,
        SatState::Sat => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unknown;
            ctx.part_mut(SolverStateP).full_model = None;
        }
        _ => {}
    }

    // Restart the search when the user adds new clauses.
    full_restart(ctx.borrow());

    add_clause_int(ctx.borrow(), lits, false, 0, true);
}

/// The unified clause adder.
///
/// Sorts and deduplicates the literals, drops tautological and satisfied clauses, removes false
/// literals, enqueues unit clauses and adds binary and ternary clauses to their implicit form
/// (returning `None` in all those cases). Clauses of length 4 and up are allocated in the arena
/// and, if `attach` is set, linked into the watchlists according to the current watch mode.
///
/// Deriving the empty clause sets the solver state to unsat.
///
/// May only be called with no active decisions. Propagating newly enqueued units is up to the
/// caller.
pub fn add_clause_int(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProcP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lits: &[Lit],
    redundant: bool,
    glue: usize,
    attach: bool,
) -> Option<ClauseRef> {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp_data.lits.clear();
    tmp_data.lits.extend_from_slice(lits);
    let lits = &mut tmp_data.lits;
    let simplified_lits = &mut tmp_data.lits_2;

    lits.sort_unstable();
    lits.dedup();

    // Detect tautological clauses
    if lits.windows(2).any(|pair| pair[1] == !pair[0]) {
        return None;
    }

    // Remove false literals and drop satisfied clauses
    simplified_lits.clear();

    for &lit in lits.iter() {
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => return None,
            Some(false) => (),
            None => simplified_lits.push(lit),
        }
    }

    match simplified_lits[..] {
        [] => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            None
        }
        [lit] => {
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
            None
        }
        [lit_0, lit_1] => {
            ctx.part_mut(WatchlistsP).add_binary([lit_0, lit_1], redundant);
            None
        }
        [lit_0, lit_1, lit_2] => {
            ctx.part_mut(WatchlistsP)
                .add_ternary([lit_0, lit_1, lit_2], redundant);
            None
        }
        ref clause_lits => {
            debug_assert!(crate::clause::check_clause_bounds(
                clause_lits,
                ctx.part(AssignmentP).assignment().len(),
            ));

            let mut header = ClauseHeader::new();
            let glue = if glue == 0 { clause_lits.len() } else { glue };
            header.set_glue(glue);
            header.set_tier(if redundant {
                select_tier(glue)
            } else {
                Tier::Irred
            });

            let cref = db::add_clause(ctx.borrow(), header, clause_lits);

            if attach {
                match ctx.part(WatchlistsP).mode() {
                    LongWatchMode::Propagation => {
                        let abst = ctx.part(ClauseAllocP).header(cref).abstraction();
                        ctx.part_mut(WatchlistsP).watch_long_clause(
                            cref,
                            [clause_lits[0], clause_lits[1]],
                            abst,
                        );
                    }
                    LongWatchMode::Occur => {
                        occur::link_clause(ctx.borrow(), cref);
                    }
                    LongWatchMode::Detached => (),
                }
            }

            Some(cref)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use occsat_formula::lits;

    use crate::context::set_var_count;

    #[test]
    fn unsat_on_empty_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &[]);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn unit_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1]);

        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        load_clause(ctx.borrow(), &lits![3, -3]);

        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        load_clause(ctx.borrow(), &lits![-2]);

        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        load_clause(ctx.borrow(), &lits![1, 1]);

        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);

        load_clause(ctx.borrow(), &lits![2]);

        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn binary_and_ternary_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2]);

        assert_eq!(ctx.part(WatchlistsP).irred_bin_count(), 1);

        load_clause(ctx.borrow(), &lits![-1, 3, 3]);

        assert_eq!(ctx.part(WatchlistsP).irred_bin_count(), 2);

        load_clause(ctx.borrow(), &lits![4, -4]);

        assert_eq!(ctx.part(WatchlistsP).irred_bin_count(), 2);

        load_clause(ctx.borrow(), &lits![4, 5, 6]);

        assert_eq!(ctx.part(WatchlistsP).irred_tri_count(), 1);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }

    #[test]
    fn long_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 7]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);

        load_clause(ctx.borrow(), &lits![-2, 3, 3, 4, 8]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 2);

        load_clause(ctx.borrow(), &lits![4, -5, 5, 2, 9]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }
}
