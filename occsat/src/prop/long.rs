//! Scanning watchlists after an assignment.
use partial_ref::{partial, PartialRef};

use occsat_formula::Lit;

use crate::context::{parts::*, Context};

use super::enqueue_assignment;
use super::{Conflict, Reason, Watch};

/// Propagate all consequences of the given literal becoming true.
///
/// Scans the watchlist of the literal's negation, which holds one record per binary and ternary
/// clause containing the negation and one record per watched long clause. Binary and ternary
/// records fully describe their clause; long clauses are inspected in the arena, moving the watch
/// to a non-false literal where possible.
///
/// On conflict returns the clause that is empty under the current assignment.
pub fn propagate_watches(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    let false_lit = !lit;

    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    // The list is taken out of the watchlists so watches of other literals can be updated while
    // scanning it. Records that stay watched are compacted to the front and the tail truncated.
    let mut watches = std::mem::take(watchlists.watched_by_mut(false_lit));

    let mut read = 0;
    let mut write = 0;
    let mut conflict = None;

    'watches: while read < watches.len() {
        let watch = watches[read];
        read += 1;

        match watch {
            Watch::Binary { other, .. } => {
                watches[write] = watch;
                write += 1;

                let assignment = ctx.part(AssignmentP);
                if assignment.lit_is_false(other) {
                    conflict = Some(Conflict::Binary([false_lit, other]));
                    break 'watches;
                } else if !assignment.lit_is_true(other) {
                    enqueue_assignment(ctx.borrow(), other, Reason::Binary([false_lit]));
                }
            }
            Watch::Ternary { other: [a, b], .. } => {
                watches[write] = watch;
                write += 1;

                let assignment = ctx.part(AssignmentP);
                if assignment.lit_is_true(a) || assignment.lit_is_true(b) {
                    continue;
                }
                match (assignment.lit_is_false(a), assignment.lit_is_false(b)) {
                    (true, true) => {
                        conflict = Some(Conflict::Ternary([false_lit, a, b]));
                        break 'watches;
                    }
                    (true, false) => {
                        enqueue_assignment(ctx.borrow(), b, Reason::Ternary([false_lit, a]));
                    }
                    (false, true) => {
                        enqueue_assignment(ctx.borrow(), a, Reason::Ternary([false_lit, b]));
                    }
                    (false, false) => (),
                }
            }
            Watch::Long { cref, abst } => {
                let clause = alloc.clause_mut(cref);
                debug_assert!(!clause.header().freed());
                let lits = clause.lits_mut();

                // Make sure the false literal is in position 1, so a successful propagation finds
                // the propagated literal in position 0.
                if lits[0] == false_lit {
                    lits.swap(0, 1);
                }
                debug_assert_eq!(lits[1], false_lit);

                let first = lits[0];

                if ctx.part(AssignmentP).lit_is_true(first) {
                    watches[write] = watch;
                    write += 1;
                    continue;
                }

                // Look for a non-false replacement for the false watched literal.
                for position in 2..lits.len() {
                    let rest_lit = lits[position];
                    if !ctx.part(AssignmentP).lit_is_false(rest_lit) {
                        lits[1] = rest_lit;
                        lits[position] = false_lit;

                        debug_assert_ne!(rest_lit, false_lit);
                        watchlists.add_watch(rest_lit, Watch::Long { cref, abst });
                        continue 'watches;
                    }
                }

                // No replacement, the clause is unit or empty.
                watches[write] = watch;
                write += 1;

                if ctx.part(AssignmentP).lit_is_false(first) {
                    conflict = Some(Conflict::Long(cref));
                    break 'watches;
                }

                enqueue_assignment(ctx.borrow(), first, Reason::Long(cref));
            }
        }
    }

    if conflict.is_some() {
        // Keep all unprocessed watches.
        while read < watches.len() {
            watches[write] = watches[read];
            write += 1;
            read += 1;
        }
    }

    watches.truncate(write);
    *watchlists.watched_by_mut(false_lit) = watches;

    match conflict {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}
