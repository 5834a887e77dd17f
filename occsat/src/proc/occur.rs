//! Linking clauses into occurrence lists.
//!
//! During simplification the watchlists switch into occur mode: every long clause gets one record
//! in the list of each of its literals, so the list of a literal enumerates all clauses
//! containing it. Linking is subject to memory caps; redundant clauses that are too long or would
//! blow the cap stay unlinked and are invisible to the simplifier for the round.
use log::debug;
use partial_ref::{partial, PartialRef};

use occsat_formula::Lit;

use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, LongWatchMode, Reason, Watch};
use crate::state::SatState;

/// Approximate bytes of occur list space a clause of the given length needs.
fn link_in_cost(len: usize) -> usize {
    len * std::mem::size_of::<Watch>()
}

/// Switch the watchlists into occur mode and link in all long clauses.
///
/// Returns false without linking anything when the irredundant clauses alone exceed their memory
/// cap; simplification is pointless in that case. Redundant clauses are linked as long as their
/// cap lasts, longest ones skipped first by the per-clause size cap.
pub fn link_all(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ProcP,
        mut WatchlistsP,
        ClauseDbP,
        SolverConfigP,
    ),
) -> bool {
    assert_eq!(ctx.part(WatchlistsP).mode(), LongWatchMode::Detached);

    let config = ctx.part(SolverConfigP);
    let irred_cap = config.max_occur_irred_mb * 1024 * 1024;
    let red_cap = config.max_occur_red_mb * 1024 * 1024;
    let max_red_size = config.max_red_link_in_size;

    let crefs = db::live_clauses(ctx.part(ClauseDbP), ctx.part(ClauseAllocP));

    let irred_estimate: usize = crefs
        .iter()
        .map(|&cref| {
            let header = ctx.part(ClauseAllocP).header(cref);
            if header.redundant() {
                0
            } else {
                link_in_cost(header.len())
            }
        })
        .sum();

    if irred_estimate > irred_cap {
        debug!(
            "occur link-in skipped: irredundant estimate {} MB over cap",
            irred_estimate / (1024 * 1024)
        );
        return false;
    }

    ctx.part_mut(WatchlistsP).set_mode(LongWatchMode::Occur);
    ctx.part_mut(ProcP).clauses.clear();

    let mut red_used = 0;

    for cref in crefs {
        let header = ctx.part(ClauseAllocP).header(cref);
        let redundant = header.redundant();
        let len = header.len();

        if redundant {
            let cost = link_in_cost(len);
            if len > max_red_size || red_used + cost > red_cap {
                ctx.part_mut(ClauseAllocP)
                    .header_mut(cref)
                    .set_occur_linked(false);
                continue;
            }
            red_used += cost;
        }

        link_clause(ctx.borrow(), cref);
    }

    true
}

/// Link a single long clause into the occurrence lists.
///
/// Sorts the clause's literals; the subsumer relies on ascending order being maintained by every
/// mutation while occur-linked.
pub fn link_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ProcP, mut WatchlistsP),
    cref: ClauseRef,
) {
    debug_assert_eq!(ctx.part(WatchlistsP).mode(), LongWatchMode::Occur);

    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    let clause = alloc.clause_mut(cref);
    clause.lits_mut().sort_unstable();
    clause.header_mut().set_occur_linked(true);
    // Gate definition flags are only valid within one round.
    clause.header_mut().set_or_gate(false);

    let abst = clause.header().abstraction();

    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    for &lit in clause.lits() {
        watchlists.add_watch(lit, Watch::Long { cref, abst });
    }

    ctx.part_mut(ProcP).clauses.push(cref);
}

/// Unlink a clause from the occurrence lists and free it.
pub fn unlink_and_free(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
) {
    let occur_linked = {
        let header = ctx.part(ClauseAllocP).header(cref);
        debug_assert!(!header.freed());
        header.occur_linked()
    };

    if occur_linked {
        let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
        let alloc = ctx.part(ClauseAllocP);
        for &lit in alloc.clause(cref).lits() {
            let removed = watchlists.remove_long_watch(lit, cref);
            debug_assert!(removed, "missing occur record while unlinking");
        }
    }

    db::delete_clause(ctx.borrow(), cref);
}

/// Switch back out of occur mode.
///
/// Removes all long records and clears the round's bookkeeping. The propagation watches are
/// rebuilt by the next propagation.
pub fn unlink_all(
    mut ctx: partial!(Context, mut GateFinderP, mut ProcP, mut WatchlistsP),
) {
    ctx.part_mut(WatchlistsP).clear_long_watches();
    ctx.part_mut(ProcP).clauses.clear();
    ctx.part_mut(GateFinderP).clear();
}

/// Level-0 propagation over the occurrence lists with eager cleaning.
///
/// Every clause satisfied by a newly true literal is removed, every clause containing the
/// falsified negation is strengthened. Newly derived units cascade. Returns false when a
/// contradiction is derived, setting the solver state to unsat.
pub fn propagate_and_clean(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminatorP,
        mut GateFinderP,
        mut ImplGraphP,
        mut ProcP,
        mut SolverStateP,
        mut SubsumerP,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(WatchlistsP).mode(), LongWatchMode::Occur);

    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        // Clauses containing the now true literal are satisfied.
        let satisfied: Vec<Watch> = ctx.part(WatchlistsP).watched_by(lit).to_vec();
        for watch in satisfied {
            match watch {
                Watch::Binary { other, .. } => {
                    ctx.part_mut(WatchlistsP).remove_binary([lit, other]);
                }
                Watch::Ternary { other: [a, b], .. } => {
                    ctx.part_mut(WatchlistsP).remove_ternary([lit, a, b]);
                }
                Watch::Long { cref, .. } => {
                    if !ctx.part(ClauseAllocP).header(cref).freed() {
                        unlink_and_free(ctx.borrow(), cref);
                    }
                }
            }
        }

        // Clauses containing the negation lose a literal.
        let false_lit = !lit;
        let weakened: Vec<Watch> = ctx.part(WatchlistsP).watched_by(false_lit).to_vec();
        for watch in weakened {
            match watch {
                Watch::Binary { other, .. } => {
                    if ctx.part_mut(WatchlistsP).remove_binary([false_lit, other]).is_none() {
                        continue;
                    }
                    match ctx.part(AssignmentP).lit_value(other) {
                        Some(true) => (),
                        Some(false) => {
                            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                            return false;
                        }
                        None => enqueue_assignment(ctx.borrow(), other, Reason::Unit),
                    }
                }
                Watch::Ternary { other: [a, b], redundant } => {
                    if ctx
                        .part_mut(WatchlistsP)
                        .remove_ternary([false_lit, a, b])
                        .is_none()
                    {
                        continue;
                    }
                    let value_a = ctx.part(AssignmentP).lit_value(a);
                    let value_b = ctx.part(AssignmentP).lit_value(b);
                    match (value_a, value_b) {
                        (Some(true), _) | (_, Some(true)) => (),
                        (None, None) => {
                            ctx.part_mut(WatchlistsP).add_binary([a, b], redundant);
                        }
                        (Some(false), None) => {
                            enqueue_assignment(ctx.borrow(), b, Reason::Unit)
                        }
                        (None, Some(false)) => {
                            enqueue_assignment(ctx.borrow(), a, Reason::Unit)
                        }
                        (Some(false), Some(false)) => {
                            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                            return false;
                        }
                    }
                }
                Watch::Long { cref, .. } => {
                    if ctx.part(ClauseAllocP).header(cref).freed() {
                        continue;
                    }
                    if !super::subsume::strengthen_clause(ctx.borrow(), cref, false_lit) {
                        return false;
                    }
                }
            }
        }
    }

    true
}
