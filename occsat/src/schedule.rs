//! Scheduling of restarts, reductions and simplification.
use log::info;

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::reduce::{reduce_locals, reduce_mids};
use crate::clause::Tier;
use crate::context::{parts::*, Context};
use crate::proc::simplify_round;
use crate::prop::{backtrack, detach_all_longs};
use crate::state::SatState;

mod luby;

use luby::LubySequence;

/// Scheduling of restarts, reductions and simplification.
#[derive(Default)]
pub struct Schedule {
    conflicts: u64,
    next_restart: u64,
    restarts: u64,
    luby: LubySequence,
}

/// Perform one step of the schedule.
///
/// Returns false when the solver is done or should give up: the formula was decided, the
/// conflict budget ran out or an interrupt was requested.
pub fn schedule_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BlockedClausesP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminatorP,
        mut GateFinderP,
        mut ImplGraphP,
        mut ProcP,
        mut ScheduleP,
        mut ScratchP,
        mut SolverStateP,
        mut SubsumerP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> bool {
    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        return false;
    }

    if ctx
        .part(SolverStateP)
        .interrupt
        .load(std::sync::atomic::Ordering::Relaxed)
    {
        return false;
    }

    let config_max_conflicts = ctx.part(SolverConfigP).max_conflicts;
    let conflicts = ctx.part(ScheduleP).conflicts;

    if config_max_conflicts != 0 && conflicts >= config_max_conflicts {
        return false;
    }

    if conflicts > 0 && conflicts % 5000 == 0 {
        let db = ctx.part(ClauseDbP);
        info!(
            "confl: {}k rest: {} vars: {} elimed: {} bin: {} tri: {} irred: {} core: {} mid: {} local: {}",
            conflicts / 1000,
            ctx.part(ScheduleP).restarts,
            ctx.part(AssignmentP).assignment().len()
                - ctx.part(TrailP).top_level_assignment_count(),
            ctx.part(VariablesP).eliminated_count(),
            ctx.part(WatchlistsP).irred_bin_count(),
            ctx.part(WatchlistsP).irred_tri_count(),
            db.count_by_tier(Tier::Irred),
            db.count_by_tier(Tier::Core),
            db.count_by_tier(Tier::Mid),
            db.count_by_tier(Tier::Local)
        );
    }

    if ctx.part(ScheduleP).next_restart == conflicts {
        backtrack(ctx.borrow(), 0);
        let interval_scale = ctx.part(SolverConfigP).luby_restart_interval_scale;
        let schedule = ctx.part_mut(ScheduleP);
        schedule.restarts += 1;
        schedule.next_restart += interval_scale * schedule.luby.advance();
    }

    if conflicts > 0 && conflicts % ctx.part(SolverConfigP).reduce_locals_interval == 0 {
        detach_all_longs(ctx.borrow());
        reduce_locals(ctx.borrow());
    }
    if conflicts > 0 && conflicts % ctx.part(SolverConfigP).reduce_mids_interval == 0 {
        reduce_mids(ctx.borrow());
    }

    if ctx.part(SolverConfigP).inprocessing
        && conflicts % ctx.part(SolverConfigP).simplify_interval == 0
    {
        backtrack(ctx.borrow(), 0);
        if !simplify_round(ctx.borrow()) {
            return false;
        }
    }

    conflict_step(ctx.borrow());
    ctx.part_mut(ScheduleP).conflicts += 1;

    true
}
