//! Decision heuristics.
use partial_ref::{partial, PartialRef};

use occsat_formula::Var;

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};

pub mod vsids;

/// Make a decision and enqueue it.
///
/// Picks the unassigned decision variable with the highest VSIDS activity and assigns it to its
/// last value (phase saving).
///
/// Returns `false` if no decision was made because all variables are assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        mut VsidsP,
        VariablesP,
    ),
) -> bool {
    let decision_var = loop {
        match ctx.part_mut(VsidsP).pop() {
            None => return false,
            Some(var) => {
                if ctx.part(AssignmentP).var_value(var).is_none()
                    && ctx.part(VariablesP).is_decision(var)
                {
                    break var;
                }
            }
        }
    };

    let phase = ctx.part(AssignmentP).last_var_value(decision_var);
    let decision = decision_var.lit(!phase);

    ctx.part_mut(TrailP).new_decision_level();

    enqueue_assignment(ctx.borrow(), decision, Reason::Unit);

    true
}

/// Make a variable available for decisions again.
///
/// Called when a variable becomes unassigned during backtracking.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}
