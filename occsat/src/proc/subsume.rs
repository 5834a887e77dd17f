//! Backward subsumption and self-subsuming resolution.
//!
//! Given a candidate clause C, [`subsume0`] removes every occur-linked clause whose literal set is
//! a superset of C's. [`subsume1`] additionally finds clauses D where exactly one literal of C
//! occurs in D with opposite sign; resolving C with D then subsumes D, so D can be strengthened
//! by dropping that literal.
//!
//! Candidates are enumerated through the smallest occurrence list among C's literals and
//! prefiltered by the 32-bit abstractions cached in the watch records, so most candidates are
//! rejected without touching the clause arena.
use partial_ref::{partial, PartialRef};
use rand::Rng;

use occsat_formula::Lit;

use crate::clause::{db, ClauseRef, Tier};
use crate::context::{parts::*, Context};
use crate::prop::Watch;

use super::occur::unlink_and_free;

/// Scratch vectors and statistics of the subsumer.
#[derive(Default)]
pub struct Subsumer {
    /// Clauses found subsumed by the current candidate.
    subs: Vec<ClauseRef>,
    /// For subsume1: the literal to strengthen away, or `None` for a full subsumption.
    subs_lits: Vec<Option<Lit>>,

    pub stats: SubsumeStats,
}

/// Statistics of one simplification round.
#[derive(Default)]
pub struct SubsumeStats {
    pub subsumed: u64,
    pub strengthened: u64,
    pub promoted_irred: u64,
}

/// Outcome of matching a candidate against one clause.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Subset1 {
    /// All literals occur identically, the clause is subsumed.
    Subsumes,
    /// All literals occur identically except this one, which occurs negated. The clause can drop
    /// it. The literal is in the checked clause's polarity.
    Strengthen(Lit),
    Neither,
}

/// Test whether `sub` is a subset of `sup`. Both must be sorted ascending.
pub(crate) fn clause_subsumes(sub: &[Lit], sup: &[Lit]) -> bool {
    let mut sup_iter = sup.iter();
    'subs: for &lit in sub {
        for &sup_lit in sup_iter.by_ref() {
            if sup_lit == lit {
                continue 'subs;
            }
            if sup_lit > lit {
                return false;
            }
        }
        return false;
    }
    true
}

/// Merge-walk of two sorted clauses for self-subsuming resolution.
fn subset1(sub: &[Lit], sup: &[Lit]) -> Subset1 {
    let mut flipped = None;

    let mut sup_index = 0;
    for &lit in sub {
        loop {
            if sup_index == sup.len() {
                return Subset1::Neither;
            }
            let sup_lit = sup[sup_index];
            if sup_lit.var() < lit.var() {
                sup_index += 1;
                continue;
            }
            if sup_lit.var() > lit.var() {
                return Subset1::Neither;
            }
            sup_index += 1;
            if sup_lit == lit {
                break;
            }
            // Same variable, opposite sign. More than one resolvable literal means the resolvent
            // is no shorter than sup itself.
            if flipped.is_some() {
                return Subset1::Neither;
            }
            flipped = Some(sup_lit);
            break;
        }
    }

    match flipped {
        None => Subset1::Subsumes,
        Some(lit) => Subset1::Strengthen(lit),
    }
}

/// Find all occur-linked clauses subsumed by the given clause.
///
/// With `also_strengthen` set, clauses with exactly one resolvable literal are reported as
/// strengthening candidates as well. Subsumption candidates are enumerated through the shortest
/// occurrence list of the clause's literals; strengthening candidates can contain any one literal
/// negated, so both polarity lists of the variable with the fewest total occurrences are scanned.
fn find_subsumed(
    mut ctx: partial!(Context, mut ProcP, mut SubsumerP, ClauseAllocP, WatchlistsP),
    cref: ClauseRef,
    also_strengthen: bool,
) {
    let search_lits: [Option<Lit>; 2] = {
        let watchlists = ctx.part(WatchlistsP);
        let lits = ctx.part(ClauseAllocP).clause(cref).lits();

        if also_strengthen {
            let mut best = lits[0];
            let mut best_len = usize::max_value();
            for &lit in lits.iter() {
                let len = watchlists.watched_by(lit).len() + watchlists.watched_by(!lit).len();
                if len < best_len {
                    best = lit;
                    best_len = len;
                }
            }
            [Some(best), Some(!best)]
        } else {
            let mut best = lits[0];
            let mut best_len = watchlists.watched_by(best).len();
            for &lit in &lits[1..] {
                let len = watchlists.watched_by(lit).len();
                if len < best_len {
                    best = lit;
                    best_len = len;
                }
            }
            [Some(best), None]
        }
    };

    let (subsumer, mut ctx) = ctx.split_part_mut(SubsumerP);
    subsumer.subs.clear();
    subsumer.subs_lits.clear();

    let abst = ctx.part(ClauseAllocP).header(cref).abstraction();
    let len = ctx.part(ClauseAllocP).header(cref).len();

    let (watchlists, mut ctx) = ctx.split_part(WatchlistsP);
    let (alloc, mut ctx) = ctx.split_part(ClauseAllocP);

    for &search_lit in search_lits.iter() {
        let search_lit = match search_lit {
            Some(lit) => lit,
            None => continue,
        };

        let list = watchlists.watched_by(search_lit);
        {
            let budget = if also_strengthen {
                &mut ctx.part_mut(ProcP).budgets.subsume1
            } else {
                &mut ctx.part_mut(ProcP).budgets.subsume0
            };
            *budget -= list.len() as i64;
        }

        for watch in list {
            let (candidate, candidate_abst) = match watch {
                Watch::Long { cref: candidate, abst } => (*candidate, *abst),
                _ => continue,
            };
            if candidate == cref {
                continue;
            }
            if abst & !candidate_abst != 0 {
                continue;
            }

            let candidate_clause = alloc.clause(candidate);
            if candidate_clause.header().freed() || len > candidate_clause.lits().len() {
                continue;
            }

            {
                let budget = if also_strengthen {
                    &mut ctx.part_mut(ProcP).budgets.subsume1
                } else {
                    &mut ctx.part_mut(ProcP).budgets.subsume0
                };
                *budget -= len as i64;
            }

            let lits = alloc.clause(cref).lits();
            if also_strengthen {
                match subset1(lits, candidate_clause.lits()) {
                    Subset1::Neither => (),
                    Subset1::Subsumes => {
                        subsumer.subs.push(candidate);
                        subsumer.subs_lits.push(None);
                    }
                    Subset1::Strengthen(lit) => {
                        subsumer.subs.push(candidate);
                        subsumer.subs_lits.push(Some(lit));
                    }
                }
            } else if clause_subsumes(lits, candidate_clause.lits()) {
                subsumer.subs.push(candidate);
                subsumer.subs_lits.push(None);
            }
        }
    }
}

/// Make a redundant clause irredundant because it subsumes an irredundant one.
fn promote_to_irred(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut SubsumerP),
    cref: ClauseRef,
) {
    if ctx.part(ClauseAllocP).header(cref).redundant() {
        db::set_clause_tier(ctx.borrow(), cref, Tier::Irred);
        ctx.part_mut(SubsumerP).stats.promoted_irred += 1;
    }
}

/// Backward subsumption with the given clause.
///
/// Removes every occur-linked clause that is a strict or equal superset of the candidate. Returns
/// the number of removed clauses.
pub fn subsume0(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProcP,
        mut SubsumerP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
) -> u64 {
    find_subsumed(ctx.borrow(), cref, false);

    let mut subsumed = 0;
    let mut subsumed_irred = false;

    for index in 0..ctx.part(SubsumerP).subs.len() {
        let victim = ctx.part(SubsumerP).subs[index];
        if ctx.part(ClauseAllocP).header(victim).freed() {
            continue;
        }

        subsumed_irred |= !ctx.part(ClauseAllocP).header(victim).redundant();
        unlink_and_free(ctx.borrow(), victim);
        subsumed += 1;
    }

    // A redundant clause that subsumes an irredundant one is itself necessary.
    if subsumed_irred {
        promote_to_irred(ctx.borrow(), cref);
    }

    ctx.part_mut(SubsumerP).stats.subsumed += subsumed;
    subsumed
}

/// Backward subsumption and self-subsuming resolution with the given clause.
///
/// Returns false when strengthening derived a contradiction.
pub fn subsume1(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProcP,
        mut SolverStateP,
        mut SubsumerP,
        mut TrailP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
) -> bool {
    find_subsumed(ctx.borrow(), cref, true);

    for index in 0..ctx.part(SubsumerP).subs.len() {
        let victim = ctx.part(SubsumerP).subs[index];
        let strengthen_lit = ctx.part(SubsumerP).subs_lits[index];

        if ctx.part(ClauseAllocP).header(victim).freed()
            || ctx.part(ClauseAllocP).header(cref).freed()
        {
            continue;
        }

        match strengthen_lit {
            None => {
                if !ctx.part(ClauseAllocP).header(victim).redundant() {
                    promote_to_irred(ctx.borrow(), cref);
                }
                unlink_and_free(ctx.borrow(), victim);
                ctx.part_mut(SubsumerP).stats.subsumed += 1;
            }
            Some(lit) => {
                if !strengthen_clause(ctx.borrow(), victim, lit) {
                    return false;
                }
            }
        }
    }

    true
}

/// Remove a literal from an occur-linked long clause.
///
/// The clause shrinks in place; shrinking to three or two literals converts it to its implicit
/// form and frees the arena slot. Returns false when a contradiction is derived.
pub fn strengthen_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SubsumerP,
        mut TrailP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
    lit: Lit,
) -> bool {
    {
        let removed = ctx.part_mut(WatchlistsP).remove_long_watch(lit, cref);
        debug_assert!(removed, "strengthened literal had no occur record");

        let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
        clause.strengthen(lit);
    }

    ctx.part_mut(SubsumerP).stats.strengthened += 1;

    let len = ctx.part(ClauseAllocP).header(cref).len();
    debug_assert!(len >= 3);

    if len > 3 {
        return true;
    }

    // The clause became ternary; move it out of the arena.
    let lits = {
        let clause = ctx.part(ClauseAllocP).clause(cref);
        [clause.lits()[0], clause.lits()[1], clause.lits()[2]]
    };
    let redundant = ctx.part(ClauseAllocP).header(cref).redundant();

    unlink_and_free(ctx.borrow(), cref);
    ctx.part_mut(WatchlistsP).add_ternary(lits, redundant);

    true
}

/// Run backward subsumption over a random sample of the occur-linked clauses.
pub fn perform_subsumption(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProcP,
        mut SubsumerP,
        mut WatchlistsP,
    ),
) {
    let clause_count = ctx.part(ProcP).clauses.len();
    if clause_count == 0 {
        return;
    }

    let mut attempts = clause_count + clause_count / 2;

    while attempts > 0 && ctx.part(ProcP).budgets.subsume0 > 0 {
        attempts -= 1;

        let index = ctx.part_mut(ProcP).rng().gen_range(0, clause_count);
        let cref = ctx.part(ProcP).clauses[index];

        if ctx.part(ClauseAllocP).header(cref).freed() {
            continue;
        }

        subsume0(ctx.borrow(), cref);
    }
}

/// Run self-subsuming resolution over a random sample of the occur-linked clauses.
///
/// Returns false when a contradiction was derived.
pub fn perform_strengthening(
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
    let clause_count = ctx.part(ProcP).clauses.len();
    if clause_count == 0 {
        return true;
    }

    let mut attempts = clause_count + clause_count / 2;

    while attempts > 0 && ctx.part(ProcP).budgets.subsume1 > 0 {
        attempts -= 1;

        let index = ctx.part_mut(ProcP).rng().gen_range(0, clause_count);
        let cref = ctx.part(ProcP).clauses[index];

        if ctx.part(ClauseAllocP).header(cref).freed() {
            continue;
        }

        if !subsume1(ctx.borrow(), cref) {
            return false;
        }

        if !ctx.part(TrailP).fully_propagated() {
            if !super::occur::propagate_and_clean(ctx.borrow()) {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use occsat_formula::lits;

    #[test]
    fn sorted_subset_tests() {
        let mut a = lits![1, 2, 3].to_vec();
        let mut b = lits![1, 2, 3, 4].to_vec();
        let mut c = lits![-1, 2, 3, 4].to_vec();
        a.sort_unstable();
        b.sort_unstable();
        c.sort_unstable();

        assert!(clause_subsumes(&a, &b));
        assert!(!clause_subsumes(&b, &a));
        assert!(!clause_subsumes(&a, &c));

        assert_eq!(subset1(&a, &b), Subset1::Subsumes);
        assert_eq!(subset1(&a, &c), Subset1::Strengthen(lits![-1][0]));
        assert_eq!(subset1(&b, &a), Subset1::Neither);

        let mut d = lits![-1, -2, 3, 4].to_vec();
        d.sort_unstable();
        assert_eq!(subset1(&a, &d), Subset1::Neither);
    }
}
