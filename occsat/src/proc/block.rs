//! Blocked clause elimination.
//!
//! A clause C is blocked on one of its literals `l` when every resolvent of C on `l` is
//! tautological. Removing C preserves satisfiability: any model of the remaining formula that
//! falsifies C can be repaired by flipping `l`, which cannot unsatisfy the clauses containing
//! `!l` because each of them shares a second complementary literal with C. Removed clauses are
//! logged for the solution extender.
use partial_ref::{partial, PartialRef};
use rand::Rng;

use occsat_formula::Lit;

use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};
use crate::prop::Watch;
use crate::variables::Removed;

use super::extend::BlockedClause;
use super::occur::unlink_and_free;

/// Whether every irredundant resolvent on the literal is tautological.
///
/// Expects the candidate clause's literals to be set in the `seen` scratch bits. A resolvent with
/// a clause D containing `!lit` is tautological iff D has another literal whose negation is in
/// the candidate.
fn all_tautology_slim(
    mut ctx: partial!(Context, mut ProcP, ClauseAllocP, ScratchP, WatchlistsP),
    lit: Lit,
) -> bool {
    let (scratch, mut ctx) = ctx.split_part(ScratchP);
    let (watchlists, mut ctx) = ctx.split_part(WatchlistsP);

    let list = watchlists.watched_by(!lit);
    ctx.part_mut(ProcP).budgets.block -= list.len() as i64;

    for watch in list {
        match watch {
            Watch::Binary { other, redundant } => {
                if *redundant || scratch.seen.is_set(!*other) {
                    continue;
                }
                return false;
            }
            Watch::Ternary { other: [a, b], redundant } => {
                if *redundant || scratch.seen.is_set(!*a) || scratch.seen.is_set(!*b) {
                    continue;
                }
                return false;
            }
            Watch::Long { cref, .. } => {
                let (skip, len) = {
                    let header = ctx.part(ClauseAllocP).header(*cref);
                    (header.freed() || header.redundant(), header.len() as i64)
                };
                if skip {
                    continue;
                }
                ctx.part_mut(ProcP).budgets.block -= len;
                let clause = ctx.part(ClauseAllocP).clause(*cref);
                let tautological = clause
                    .lits()
                    .iter()
                    .any(|&other| other != !lit && scratch.seen.is_set(!other));
                if !tautological {
                    return false;
                }
            }
        }
    }

    true
}

/// Remove blocked long clauses, logging them for model extension.
pub fn block_clauses(
    mut ctx: partial!(
        Context,
        mut BlockedClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProcP,
        mut ScratchP,
        mut WatchlistsP,
        VariablesP,
    ),
) {
    let clause_count = ctx.part(ProcP).clauses.len();
    if clause_count == 0 {
        return;
    }

    let mut attempts = 2 * clause_count;
    let mut blocked = 0u64;

    while attempts > 0 && ctx.part(ProcP).budgets.block > 0 {
        attempts -= 1;
        ctx.part_mut(ProcP).budgets.block -= 2;

        let index = ctx.part_mut(ProcP).rng().gen_range(0, clause_count);
        let cref: ClauseRef = ctx.part(ProcP).clauses[index];

        {
            let header = ctx.part(ClauseAllocP).header(cref);
            if header.freed() || header.redundant() {
                continue;
            }
        }

        let lits: Vec<Lit> = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
        ctx.part_mut(ProcP).budgets.block -= lits.len() as i64;

        for &lit in lits.iter() {
            ctx.part_mut(ScratchP).seen.set(lit);
        }

        let mut blocked_on = None;
        for &lit in lits.iter() {
            if ctx.part(VariablesP).removed(lit.var()) != Removed::None {
                continue;
            }
            if all_tautology_slim(ctx.borrow(), lit) {
                blocked_on = Some(lit);
                break;
            }
        }

        ctx.part_mut(ScratchP).seen.clear();

        if let Some(lit) = blocked_on {
            let variables = ctx.part(VariablesP);
            let entry = BlockedClause {
                blocked_on: variables.lit_to_outer(lit),
                to_remove: false,
                lits: lits.iter().map(|&l| variables.lit_to_outer(l)).collect(),
            };
            ctx.part_mut(BlockedClausesP).push(entry);
            unlink_and_free(ctx.borrow(), cref);
            blocked += 1;
        }
    }

    ctx.part_mut(ProcP).stats.blocked += blocked;
}
