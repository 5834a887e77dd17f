//! Model extraction.
use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::proc::extend::extend_model;

/// Compute a complete model over the outer variables.
///
/// The model covers every outer variable the solver or the blocked clause log knows about; the
/// replay of the blocked clause log assigns the eliminated variables and fills in variables the
/// solver never constrained.
pub fn compute_full_model(
    mut ctx: partial!(
        Context,
        mut BlockedClausesP,
        mut SolverStateP,
        AssignmentP,
        ClauseAllocP,
        ClauseDbP,
        ImplGraphP,
        VariablesP,
        WatchlistsP,
    ),
) -> Vec<bool> {
    let mut outer_count = ctx.part(VariablesP).var_count();
    for entry in ctx.part(BlockedClausesP).clauses() {
        for &lit in entry.lits.iter() {
            outer_count = std::cmp::max(outer_count, lit.index() + 1);
        }
    }

    let mut model = vec![true; outer_count];

    extend_model(ctx.borrow(), &mut model);

    ctx.part_mut(SolverStateP).full_model = Some(model.clone());

    model
}
