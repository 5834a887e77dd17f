//! Arena compaction.
//!
//! Freeing a clause only marks its header, so the arena accumulates dead slots. Compaction moves
//! every live clause to a prefix of the buffer and rewrites all outstanding clause references:
//! the clause database lists and the trail reasons. Long watch records are required to be
//! detached beforehand, the compactor re-asserts this; the next propagation rebuilds them from
//! the updated database.
use log::debug;
use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::prop::{LongWatchMode, Reason};

use super::ClauseRef;

/// Compact the arena when the live fraction drops below the trigger.
pub fn consolidate_if_needed(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
    force: bool,
) {
    if force || ctx.part(ClauseAllocP).should_consolidate() {
        consolidate(ctx.borrow());
    }
}

/// Unconditionally compact the arena and rewrite every outstanding clause reference.
///
/// After this returns, any [`ClauseRef`] not reachable through the clause database or the trail
/// reasons is invalid; holding one across this call is a bug.
pub fn consolidate(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    assert_eq!(ctx.part(TrailP).current_level(), 0);
    assert!(ctx.part(TrailP).fully_propagated());
    assert_ne!(ctx.part(WatchlistsP).mode(), LongWatchMode::Occur);

    // The caller is expected to have detached the long watches; re-assert by clearing.
    ctx.part_mut(WatchlistsP).clear_long_watches();

    let old_size = ctx.part(ClauseAllocP).buffer_size();
    let relocations = ctx.part_mut(ClauseAllocP).consolidate();

    let remap = |cref: ClauseRef| -> Option<ClauseRef> {
        relocations
            .binary_search_by_key(&cref, |&(old, _)| old)
            .ok()
            .map(|index| relocations[index].1)
    };

    // Update the clause database lists, dropping entries for freed clauses.
    {
        let db = ctx.part_mut(ClauseDbP);
        db.clauses.retain(|cref| remap(*cref).is_some());
        for cref in db.clauses.iter_mut() {
            *cref = remap(*cref).expect("retained clause has a relocation");
        }
        for by_tier in db.by_tier.iter_mut() {
            by_tier.retain(|cref| remap(*cref).is_some());
            for cref in by_tier.iter_mut() {
                *cref = remap(*cref).expect("retained clause has a relocation");
            }
        }
    }

    // Update the long clause reasons on the trail.
    {
        let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
        for &lit in ctx.part(TrailP).trail().iter() {
            if let Reason::Long(cref) = *impl_graph.reason(lit.var()) {
                let new_cref = remap(cref)
                    .expect("trail reason points at a freed clause");
                impl_graph.update_reason(lit.var(), Reason::Long(new_cref));
            }
        }
    }

    debug!(
        "consolidate: {} -> {} words",
        old_size,
        ctx.part(ClauseAllocP).buffer_size()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use proptest::prelude::*;

    use occsat_formula::cnf::strategy::cnf_formula;
    use occsat_formula::Lit;

    use crate::clause::{db, header::HEADER_LEN, ClauseHeader};
    use crate::context::set_var_count;
    use crate::prop::enqueue_assignment;

    proptest! {
        #[test]
        fn consolidation_preserves_clauses_and_reasons(
            input_keep in cnf_formula(2..100usize, 10..100, 4..20),
            input_free in cnf_formula(2..100usize, 10..100, 4..20),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(
                ctx.borrow(),
                std::cmp::max(input_keep.var_count(), input_free.var_count()),
            );

            let mut crefs_keep = vec![];
            let mut crefs_free = vec![];

            for lits in input_keep.iter() {
                let cref = db::add_clause(ctx.borrow(), ClauseHeader::new(), lits);
                crefs_keep.push(cref);

                // Mark some clauses as propagation reasons. This isn't consistent, as the
                // clauses aren't actually propagating, but that isn't checked here.
                if ctx.part(AssignmentP).lit_value(lits[0]).is_none() {
                    enqueue_assignment(ctx.borrow(), lits[0], Reason::Long(cref));
                }
            }

            for lits in input_free.iter() {
                let cref = db::add_clause(ctx.borrow(), ClauseHeader::new(), lits);
                crefs_free.push(cref);
            }

            for cref in crefs_free {
                db::delete_clause(ctx.borrow(), cref);
            }

            // Drain the propagation queue so the compactor's precondition holds.
            while ctx.part_mut(TrailP).pop_queue().is_some() {}

            consolidate(ctx.borrow());

            // The used words match the live clauses exactly.
            let live_words: usize = input_keep
                .iter()
                .map(|lits| HEADER_LEN + lits.len())
                .sum();
            prop_assert_eq!(ctx.part(ClauseAllocP).buffer_size(), live_words);
            prop_assert_eq!(ctx.part(ClauseAllocP).used_words(), live_words);

            // All live clauses survived with their literals.
            let mut output_clauses: Vec<Vec<Lit>> = vec![];
            for &cref in ctx.part(ClauseDbP).clauses.iter() {
                let clause = ctx.part(ClauseAllocP).clause(cref);
                prop_assert!(!clause.header().freed());
                output_clauses.push(clause.lits().to_vec());
            }

            let mut input_clauses: Vec<Vec<Lit>> =
                input_keep.iter().map(|lits| lits.to_vec()).collect();

            output_clauses.sort();
            input_clauses.sort();
            prop_assert_eq!(input_clauses, output_clauses);

            // Reasons still point at the clause propagating their literal.
            for &lit in ctx.part(TrailP).trail().iter() {
                if let Reason::Long(cref) = *ctx.part(ImplGraphP).reason(lit.var()) {
                    prop_assert_eq!(ctx.part(ClauseAllocP).clause(cref).lits()[0], lit);
                }
            }
        }
    }
}
