//! In-processing simplification.
//!
//! One simplification round detaches the long clauses from the propagation watches, links them
//! into occurrence lists and then runs, in order: OR-gate based rewriting, backward subsumption,
//! self-subsuming resolution, blocked clause elimination and bounded variable elimination. Every
//! phase works against a step budget so a round always terminates in bounded time, leaving a
//! consistent database behind.
pub mod block;
pub mod elim;
pub mod extend;
pub mod gates;
pub mod occur;
pub mod subsume;

use log::info;
use partial_ref::{partial, PartialRef};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clause::consolidate::consolidate_if_needed;
use crate::clause::{db, ClauseRef};
use crate::config::SolverConfig;
use crate::context::{parts::*, Context};
use crate::prop::propagate;
use crate::simplify::simplify;

/// Per-phase step budgets of one simplification round.
///
/// Phases decrement their counter as they work and stop when it goes negative; the driver moves
/// on to the next phase.
pub struct Budgets {
    pub subsume0: i64,
    pub subsume1: i64,
    pub gate_finder: i64,
    pub shorten_gates: i64,
    pub clrem_gates: i64,
    pub elim: i64,
    pub block: i64,
}

impl Default for Budgets {
    fn default() -> Budgets {
        let config = SolverConfig::default();
        Budgets {
            subsume0: config.subsume0_budget,
            subsume1: config.subsume1_budget,
            gate_finder: config.gate_finder_budget,
            shorten_gates: config.shorten_with_gates_budget,
            clrem_gates: config.cl_rem_with_gates_budget,
            elim: config.elim_budget,
            block: config.block_budget,
        }
    }
}

/// Statistics over all simplification rounds.
#[derive(Default)]
pub struct ProcStats {
    pub rounds: u64,
    pub blocked: u64,
}

/// Driver state of the in-processing simplifier.
pub struct Proc {
    /// The long clauses linked into the occurrence lists this round.
    pub clauses: Vec<ClauseRef>,
    pub budgets: Budgets,
    pub stats: ProcStats,
    rng: StdRng,
}

impl Default for Proc {
    fn default() -> Proc {
        Proc {
            clauses: vec![],
            budgets: Budgets::default(),
            stats: ProcStats::default(),
            rng: StdRng::seed_from_u64(SolverConfig::default().rng_seed),
        }
    }
}

impl Proc {
    /// The simplifier's random number generator.
    ///
    /// Seeded from the configuration, so rounds are reproducible.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Reseed the random number generator.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

/// Reset the per-phase budgets from the configuration.
pub fn set_budgets(mut ctx: partial!(Context, mut ProcP, SolverConfigP)) {
    let config = ctx.part(SolverConfigP);
    ctx.part_mut(ProcP).budgets = Budgets {
        subsume0: config.subsume0_budget,
        subsume1: config.subsume1_budget,
        gate_finder: config.gate_finder_budget,
        shorten_gates: config.shorten_with_gates_budget,
        clrem_gates: config.cl_rem_with_gates_budget,
        elim: config.elim_budget,
        block: config.block_budget,
    };
}

fn interrupted(ctx: partial!(Context, SolverStateP)) -> bool {
    ctx.part(SolverStateP)
        .interrupt
        .load(std::sync::atomic::Ordering::Relaxed)
}

/// Run one full simplification round.
///
/// Must be called with no active decisions. Returns false when the formula was proven
/// unsatisfiable. When the round returns, the database is consistent and detached; the next
/// propagation rebuilds the watches.
pub fn simplify_round(
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
    if ctx.part(SolverStateP).is_unsat() {
        return false;
    }

    assert_eq!(ctx.part(TrailP).current_level(), 0);

    // Settle all pending top level propagation before touching the database.
    if propagate(ctx.borrow()).is_err() {
        ctx.part_mut(SolverStateP).sat_state = crate::state::SatState::Unsat;
        return false;
    }

    // Scrub satisfied clauses and false literals, then detach the long watches.
    simplify(ctx.borrow());

    if !occur::link_all(ctx.borrow()) {
        // Memory cap exceeded; skip the round, the database is still consistent.
        return true;
    }

    ctx.part_mut(ProcP).stats.rounds += 1;
    set_budgets(ctx.borrow());

    let mut ok = true;

    if ok && ctx.part(SolverConfigP).gate_finding && !interrupted(ctx.borrow()) {
        gates::find_or_gates(ctx.borrow());
        ok = gates::all_gate_optimisations(ctx.borrow());
    }

    if ok && !interrupted(ctx.borrow()) {
        subsume::perform_subsumption(ctx.borrow());
    }

    if ok && !interrupted(ctx.borrow()) {
        ok = subsume::perform_strengthening(ctx.borrow());
    }

    if ok
        && ctx.part(SolverConfigP).blocked_clause_elimination
        && !interrupted(ctx.borrow())
    {
        block::block_clauses(ctx.borrow());
    }

    if ok && !ctx.part(TrailP).fully_propagated() {
        ok = occur::propagate_and_clean(ctx.borrow());
    }

    if ok && ctx.part(SolverConfigP).variable_elimination && !interrupted(ctx.borrow()) {
        ok = elim::eliminate_vars(ctx.borrow());
    }

    // Back out of occur mode whatever happened; the database must be left consistent.
    occur::unlink_all(ctx.borrow());

    if ok {
        // Clauses that stayed outside the occurrence lists may still contain assigned literals.
        simplify(ctx.borrow());
        db::collect_db_lists(ctx.borrow());
        consolidate_if_needed(ctx.borrow(), false);
    }

    info!(
        "simpl: vars-elimed: {} subsumed: {} strengthened: {} blocked: {} gates: {}",
        ctx.part(EliminatorP).stats.vars_eliminated,
        ctx.part(SubsumerP).stats.subsumed,
        ctx.part(SubsumerP).stats.strengthened,
        ctx.part(ProcP).stats.blocked,
        ctx.part(GateFinderP).stats.gates_found,
    );

    if !ok {
        ctx.part_mut(SolverStateP).sat_state = crate::state::SatState::Unsat;
    }

    ok && !ctx.part(SolverStateP).is_unsat()
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use occsat_formula::{cnf_formula, lits};

    use crate::clause::Tier;
    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::detach_all_longs;
    use crate::variables::Removed;

    fn setup_occur(formula: &occsat_formula::CnfFormula) -> Box<Context> {
        let mut ctx = Box::new(Context::default());
        {
            let mut ctx = ctx.into_partial_ref_mut();
            set_var_count(ctx.borrow(), formula.var_count());
            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }
            detach_all_longs(ctx.borrow());
            assert!(occur::link_all(ctx.borrow()));
            set_budgets(ctx.borrow());
        }
        ctx
    }

    #[test]
    fn subsumption_removes_the_superset_clause() {
        let formula = cnf_formula![
            1, 2, 3, 6;
            1, 2, 3, 4, 6;
        ];

        let mut ctx = setup_occur(&formula);
        let mut ctx = ctx.into_partial_ref_mut();

        let candidate = ctx.part(ProcP).clauses[0];
        assert_eq!(subsume::subsume0(ctx.borrow(), candidate), 1);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        assert!(!ctx.part(ClauseAllocP).header(candidate).freed());
    }

    #[test]
    fn strengthening_drops_the_resolvable_literal() {
        // (1 2 3 6) strengthens (-1 2 3 4 6) to (2 3 4 6)
        let formula = cnf_formula![
            1, 2, 3, 6;
            -1, 2, 3, 4, 6;
        ];

        let mut ctx = setup_occur(&formula);
        let mut ctx = ctx.into_partial_ref_mut();

        let candidate = ctx.part(ProcP).clauses[0];
        let victim = ctx.part(ProcP).clauses[1];
        assert!(subsume::subsume1(ctx.borrow(), candidate));

        assert_eq!(ctx.part(SubsumerP).stats.strengthened, 1);

        let mut expected = lits![2, 3, 4, 6].to_vec();
        expected.sort_unstable();
        assert_eq!(ctx.part(ClauseAllocP).clause(victim).lits(), &expected[..]);
    }

    #[test]
    fn pure_literal_is_eliminated_without_resolvents() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        // Variable 7 appears only positively.
        let formula = cnf_formula![
            7, 1, 2, 3;
            7, -1, 4, 5;
            -2, -4, 3, 5;
            2, 4, -3, -5;
        ];

        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }

        assert!(simplify_round(ctx.borrow()));

        let var7 = lits![7][0].var();
        assert_eq!(ctx.part(VariablesP).removed(var7), Removed::Eliminated);
        assert!(ctx.part(EliminatorP).is_eliminated(var7));
        assert!(ctx.part(AssignmentP).var_value(var7).is_none());
        assert!(ctx.part(BlockedClausesP).len() >= 2);
    }
}
