//! Simplification using top level assignments.
//!
//! Once a variable is assigned at decision level 0 it keeps that value forever, so every clause
//! containing the true literal can be dropped and the false literal can be stripped from the
//! remaining clauses. Implicit binary and ternary clauses touching an assigned variable are
//! always satisfied after full propagation and are dropped wholesale.
use partial_ref::{partial, PartialRef};

use occsat_formula::Lit;

use crate::clause::{clause_abstraction, db::filter_clauses};
use crate::context::{parts::*, Context};

/// Run [`simplify`] if there are new top level assignments since the last call.
pub fn simplify_if_new_units(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut WatchlistsP,
        AssignmentP,
        TrailP,
    ),
) {
    if ctx.part(TrailP).current_level() != 0 {
        return;
    }
    if ctx.part(TrailP).trail().len() == ctx.part(SolverStateP).units_simplified {
        return;
    }
    simplify(ctx.borrow());
}

/// Remove satisfied clauses and false literals.
///
/// Requires full propagation at decision level 0. Long watches are detached in the process; the
/// next propagation rebuilds them.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut WatchlistsP,
        AssignmentP,
        TrailP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    ctx.part_mut(WatchlistsP).clear_long_watches();

    // Top level assignments are facts now. Their reason clauses are about to be removed as
    // satisfied, so no reason may keep pointing into the clause arena.
    {
        let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
        for &lit in ctx.part(TrailP).trail().iter() {
            impl_graph.update_reason(lit.var(), crate::prop::Reason::Unit);
        }
    }

    let (assignment, mut ctx) = ctx.split_part(AssignmentP);

    // Implicit clauses touching an assigned variable are satisfied or demote to a binary.
    let mut new_binaries: Vec<([Lit; 2], bool)> = vec![];
    ctx.part_mut(WatchlistsP)
        .scrub_assigned(|lit| assignment.lit_value(lit), &mut new_binaries);

    let mut new_lits: Vec<Lit> = vec![];
    let mut new_ternaries: Vec<([Lit; 3], bool)> = vec![];

    filter_clauses(ctx.borrow(), |alloc, cref| {
        new_lits.clear();
        for &lit in alloc.clause(cref).lits() {
            match assignment.lit_value(lit) {
                None => new_lits.push(lit),
                Some(true) => return false,
                Some(false) => (),
            }
        }

        let clause = alloc.clause_mut(cref);
        if new_lits.len() == clause.lits().len() {
            return true;
        }

        let redundant = clause.header().redundant();
        match new_lits[..] {
            // Cannot have empty or unit clauses after full propagation. An empty clause would
            // have been a conflict and a unit clause must be satisfied and thus would have been
            // dropped above.
            [] | [_] => unreachable!(),
            [lit_0, lit_1] => {
                new_binaries.push(([lit_0, lit_1], redundant));
                false
            }
            [lit_0, lit_1, lit_2] => {
                new_ternaries.push(([lit_0, lit_1, lit_2], redundant));
                false
            }
            ref lits => {
                clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                clause.header_mut().set_len(lits.len());
                let abstraction = clause_abstraction(lits);
                clause.header_mut().set_abstraction(abstraction);
                clause.header_mut().set_changed(true);
                true
            }
        }
    });

    for (lits, redundant) in new_binaries {
        ctx.part_mut(WatchlistsP).add_binary(lits, redundant);
    }
    for (lits, redundant) in new_ternaries {
        ctx.part_mut(WatchlistsP).add_ternary(lits, redundant);
    }

    let trail_len = ctx.part(TrailP).trail().len();
    ctx.part_mut(SolverStateP).units_simplified = trail_len;
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use occsat_formula::{cnf_formula, lits};

    use crate::clause::Tier;
    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::propagate;

    #[test]
    fn units_scrub_the_database() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1, 2, 3, 4;
            -1, 2, 5, 6;
            -1, 5, 6;
            1, 7;
        ];

        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        load_clause(ctx.borrow(), &lits![1]);
        assert!(propagate(ctx.borrow()).is_ok());

        simplify_if_new_units(ctx.borrow());

        // (1 2 3 4) and (1 7) are satisfied, (-1 2 5 6) loses a literal and becomes ternary,
        // (-1 5 6) becomes binary.
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(WatchlistsP).irred_tri_count(), 1);
        assert_eq!(ctx.part(WatchlistsP).irred_bin_count(), 1);

        // A second call without new units is a no-op.
        simplify_if_new_units(ctx.borrow());
        assert_eq!(ctx.part(WatchlistsP).irred_tri_count(), 1);
    }
}
