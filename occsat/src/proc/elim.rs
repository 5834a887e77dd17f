//! Bounded variable elimination.
//!
//! A variable is eliminated by resolving every irredundant clause containing it positively with
//! every irredundant clause containing it negatively and replacing the originals with the
//! non-tautological resolvents. The elimination is committed only when the clause count does not
//! grow. All removed clauses go to the blocked clause log keyed on the eliminated literal so the
//! solution extender can reconstruct a full model.
//!
//! Candidates are ordered by a cheap occurrence based cost estimate kept in a priority queue;
//! ties break by literal count and then variable index, which makes the elimination order a pure
//! function of the input.
use partial_ref::{partial, PartialRef};

use occsat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::load::add_clause_int;
use crate::prop::Watch;
use crate::variables::Removed;

use super::extend::BlockedClause;
use super::occur::{propagate_and_clean, unlink_and_free};
use super::subsume::subsume0;

/// Cost reported by the trial resolution when the variable must not be eliminated.
const ELIM_SKIP: i64 = 1000;
/// Cost of eliminating a pure variable, always worth it.
const ELIM_PURE: i64 = -100;

/// Occurrence counts of one literal, restricted to irredundant clauses.
#[derive(Default, Copy, Clone)]
struct HeuristicData {
    bin: i64,
    tri: i64,
    longer: i64,
    lits: i64,
}

impl HeuristicData {
    fn total_clauses(self) -> i64 {
        self.bin + self.tri + self.longer
    }

    /// Ternary clauses count like long ones for the cost estimate.
    fn total_longer(self) -> i64 {
        self.tri + self.longer
    }
}

/// State of the variable eliminator.
#[derive(Default)]
pub struct Eliminator {
    order: VarElimHeap,
    var_elimed: Vec<bool>,
    /// Resolvents of the last trial resolution, with the glue to give each.
    resolvents: Vec<(Vec<Lit>, usize)>,

    pub stats: ElimStats,
}

#[derive(Default)]
pub struct ElimStats {
    pub vars_eliminated: u64,
    pub clauses_resolved: u64,
    /// Redundant clauses of eliminated variables are dropped without being logged.
    pub redundant_dropped: u64,
    pub tris_subsumed_by_bin: u64,
}

impl Eliminator {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_elimed.resize(count, false);
        self.order.set_var_count(count);
    }

    /// Whether the variable was eliminated by this eliminator.
    pub fn is_eliminated(&self, var: Var) -> bool {
        self.var_elimed[var.index()]
    }

    /// The variable was reintroduced into the solver.
    pub fn set_un_eliminated(&mut self, var: Var) {
        self.var_elimed[var.index()] = false;
    }
}

/// Priority queue of elimination candidates, cheapest first.
///
/// Keys are `(cost, literal cost)` pairs; remaining ties break by variable index so the pop order
/// is deterministic.
#[derive(Default)]
struct VarElimHeap {
    heap: Vec<Var>,
    position: Vec<Option<usize>>,
    cost: Vec<(i64, i64)>,
}

impl VarElimHeap {
    fn set_var_count(&mut self, count: usize) {
        self.position.resize(count, None);
        self.cost.resize(count, (0, 0));
    }

    fn clear(&mut self) {
        for &var in self.heap.iter() {
            self.position[var.index()] = None;
        }
        self.heap.clear();
    }

    fn key(&self, var: Var) -> (i64, i64, usize) {
        let (cost, lit_cost) = self.cost[var.index()];
        (cost, lit_cost, var.index())
    }

    fn in_heap(&self, var: Var) -> bool {
        self.position[var.index()].is_some()
    }

    fn insert(&mut self, var: Var, cost: (i64, i64)) {
        debug_assert!(!self.in_heap(var));
        self.cost[var.index()] = cost;
        let position = self.heap.len();
        self.position[var.index()] = Some(position);
        self.heap.push(var);
        self.sift_up(position);
    }

    fn update(&mut self, var: Var, cost: (i64, i64)) {
        let position = match self.position[var.index()] {
            Some(position) => position,
            None => return,
        };
        self.cost[var.index()] = cost;
        self.sift_up(position);
        let position = self.position[var.index()].unwrap();
        self.sift_down(position);
    }

    fn pop(&mut self) -> Option<Var> {
        let top = *self.heap.first()?;
        self.position[top.index()] = None;

        let last = self.heap.pop().expect("heap is non-empty");
        if !self.heap.is_empty() {
            self.heap[0] = last;
            self.position[last.index()] = Some(0);
            self.sift_down(0);
        }

        Some(top)
    }

    fn sift_up(&mut self, mut position: usize) {
        let var = self.heap[position];
        let key = self.key(var);
        while position > 0 {
            let parent_position = (position - 1) / 2;
            let parent = self.heap[parent_position];
            if self.key(parent) <= key {
                break;
            }
            self.heap[position] = parent;
            self.position[parent.index()] = Some(position);
            position = parent_position;
        }
        self.heap[position] = var;
        self.position[var.index()] = Some(position);
    }

    fn sift_down(&mut self, mut position: usize) {
        let var = self.heap[position];
        let key = self.key(var);
        loop {
            let mut child_position = position * 2 + 1;
            if child_position >= self.heap.len() {
                break;
            }
            let right_position = child_position + 1;
            if right_position < self.heap.len()
                && self.key(self.heap[right_position]) < self.key(self.heap[child_position])
            {
                child_position = right_position;
            }
            let child = self.heap[child_position];
            if key <= self.key(child) {
                break;
            }
            self.heap[position] = child;
            self.position[child.index()] = Some(position);
            position = child_position;
        }
        self.heap[position] = var;
        self.position[var.index()] = Some(position);
    }
}

/// Whether a watch record belongs to a redundant clause.
fn watch_redundant(
    ctx: partial!(Context, ClauseAllocP),
    watch: &Watch,
) -> bool {
    match watch {
        Watch::Binary { redundant, .. } | Watch::Ternary { redundant, .. } => *redundant,
        Watch::Long { cref, .. } => ctx.part(ClauseAllocP).header(*cref).redundant(),
    }
}

/// Occurrence counts of a literal over irredundant, occur-linked clauses.
fn calc_data_for_heuristic(
    mut ctx: partial!(Context, mut ProcP, ClauseAllocP, WatchlistsP),
    lit: Lit,
) -> HeuristicData {
    let mut data = HeuristicData::default();

    let (watchlists, mut ctx) = ctx.split_part(WatchlistsP);
    let list = watchlists.watched_by(lit);
    ctx.part_mut(ProcP).budgets.elim -= list.len() as i64 + 10;

    for watch in list {
        match watch {
            Watch::Binary { redundant, .. } => {
                if !redundant {
                    data.bin += 1;
                    data.lits += 2;
                }
            }
            Watch::Ternary { redundant, .. } => {
                if !redundant {
                    data.tri += 1;
                    data.lits += 3;
                }
            }
            Watch::Long { cref, .. } => {
                let header = ctx.part(ClauseAllocP).header(*cref);
                if !header.freed() && !header.redundant() && header.occur_linked() {
                    data.longer += 1;
                    data.lits += header.len() as i64;
                }
            }
        }
    }

    data
}

/// Occurrence based cost estimate for eliminating a variable.
fn heuristic_elim_score(
    mut ctx: partial!(Context, mut ProcP, ClauseAllocP, WatchlistsP),
    var: Var,
) -> (i64, i64) {
    let pos = calc_data_for_heuristic(ctx.borrow(), var.positive());
    let neg = calc_data_for_heuristic(ctx.borrow(), var.negative());

    if pos.total_clauses() == 0 || neg.total_clauses() == 0 {
        return (ELIM_PURE, 0);
    }

    let cost = pos.total_longer() * neg.total_longer()
        + pos.bin * neg.total_longer() * 2
        + neg.bin * pos.total_longer() * 2
        + pos.bin * neg.bin * 3;

    (cost, pos.lits * neg.lits)
}

/// Fill the elimination queue with all eligible variables.
fn order_vars_for_elim(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminatorP,
        mut ProcP,
        mut ScratchP,
        mut WatchlistsP,
        SolverConfigP,
        VariablesP,
    ),
) {
    ctx.part_mut(EliminatorP).order.clear();

    let var_count = ctx.part(VariablesP).var_count();
    let trial_scoring = ctx.part(SolverConfigP).elim_strategy == 1;

    for index in 0..var_count {
        let var = Var::from_index(index);

        if ctx.part(AssignmentP).var_value(var).is_some()
            || ctx.part(VariablesP).removed(var) != Removed::None
            || !ctx.part(VariablesP).is_decision(var)
        {
            continue;
        }

        let cost = if trial_scoring {
            (test_var_elim(ctx.borrow(), var), 0)
        } else {
            heuristic_elim_score(ctx.borrow(), var)
        };

        ctx.part_mut(EliminatorP).order.insert(var, cost);
    }
}

/// Literals of a watch record's clause without the pivot occurrence.
///
/// The record must come from the pivot literal's own occurrence list, so binary and ternary
/// records already carry exactly the other literals.
fn watch_lits_without(
    ctx: partial!(Context, ClauseAllocP),
    watch: &Watch,
    pivot: Lit,
    out: &mut Vec<Lit>,
) {
    out.clear();
    match watch {
        Watch::Binary { other, .. } => out.push(*other),
        Watch::Ternary { other, .. } => out.extend_from_slice(other),
        Watch::Long { cref, .. } => {
            out.extend(
                ctx.part(ClauseAllocP)
                    .clause(*cref)
                    .lits()
                    .iter()
                    .cloned()
                    .filter(|&lit| lit != pivot),
            );
        }
    }
}

/// Resolve the clauses of two watch records on the pivot variable.
///
/// Returns `None` when the resolvent is tautological. The `seen` scratch bits are cleared before
/// returning.
fn merge(
    mut ctx: partial!(Context, mut ProcP, mut ScratchP, ClauseAllocP),
    pos: &Watch,
    neg: &Watch,
    pivot: Var,
) -> Option<Vec<Lit>> {
    let mut resolvent = vec![];
    let mut side = vec![];

    watch_lits_without(ctx.borrow(), pos, pivot.positive(), &mut side);
    ctx.part_mut(ProcP).budgets.elim -= side.len() as i64 + 1;

    {
        let scratch = ctx.part_mut(ScratchP);
        for &lit in side.iter() {
            scratch.seen.set(lit);
            resolvent.push(lit);
        }
    }

    watch_lits_without(ctx.borrow(), neg, pivot.negative(), &mut side);
    ctx.part_mut(ProcP).budgets.elim -= side.len() as i64 + 1;

    let mut tautological = false;
    {
        let scratch = ctx.part_mut(ScratchP);
        for &lit in side.iter() {
            if scratch.seen.is_set(!lit) {
                tautological = true;
                break;
            }
            if !scratch.seen.is_set(lit) {
                scratch.seen.set(lit);
                resolvent.push(lit);
            }
        }
        scratch.seen.clear();
    }

    if tautological {
        None
    } else {
        Some(resolvent)
    }
}

/// Glue to give a resolvent, carried over from its long parents.
fn resolvent_glue(ctx: partial!(Context, ClauseAllocP), pos: &Watch, neg: &Watch) -> usize {
    let glue_of = |watch: &Watch| match watch {
        Watch::Long { cref, .. } => ctx.part(ClauseAllocP).header(*cref).glue(),
        _ => 0,
    };
    std::cmp::max(glue_of(pos), glue_of(neg))
}

/// Deterministic ordering of a literal's watch records: binaries, then ternaries, then long.
fn sorted_occurrences(
    ctx: partial!(Context, WatchlistsP),
    lit: Lit,
) -> Vec<Watch> {
    fn rank(watch: &Watch) -> usize {
        match watch {
            Watch::Binary { .. } => 0,
            Watch::Ternary { .. } => 1,
            Watch::Long { .. } => 2,
        }
    }

    let mut list = ctx.part(WatchlistsP).watched_by(lit).to_vec();
    list.sort_unstable_by(|a, b| {
        rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
            (Watch::Binary { other: oa, .. }, Watch::Binary { other: ob, .. }) => oa.cmp(ob),
            (Watch::Ternary { other: oa, .. }, Watch::Ternary { other: ob, .. }) => oa.cmp(ob),
            (Watch::Long { cref: ca, .. }, Watch::Long { cref: cb, .. }) => ca.cmp(cb),
            _ => std::cmp::Ordering::Equal,
        })
    });
    list
}

/// Trial resolution of a variable.
///
/// Resolves every irredundant positive occurrence with every irredundant negative occurrence.
/// Returns [`ELIM_SKIP`] when the elimination would grow the clause count or the budget ran out;
/// otherwise the resolvents are cached for [`maybe_eliminate`] and the net cost is returned.
fn test_var_elim(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminatorP,
        mut ProcP,
        mut ScratchP,
        mut WatchlistsP,
        AssignmentP,
        VariablesP,
    ),
    var: Var,
) -> i64 {
    debug_assert!(ctx.part(AssignmentP).var_value(var).is_none());
    debug_assert_eq!(ctx.part(VariablesP).removed(var), Removed::None);

    let pos = calc_data_for_heuristic(ctx.borrow(), var.positive());
    let neg = calc_data_for_heuristic(ctx.borrow(), var.negative());

    if ctx.part(ProcP).budgets.elim < 0 {
        return ELIM_SKIP;
    }

    ctx.part_mut(EliminatorP).resolvents.clear();

    // A pure variable: all its clauses can go, with no resolvents.
    if pos.total_clauses() == 0 || neg.total_clauses() == 0 {
        return ELIM_PURE;
    }

    let poss = sorted_occurrences(ctx.borrow(), var.positive());
    let negs = sorted_occurrences(ctx.borrow(), var.negative());

    let before_clauses = pos.total_clauses() + neg.total_clauses();
    let mut after_bin = 0i64;
    let mut after_tri = 0i64;
    let mut after_long = 0i64;

    for pos_watch in poss.iter() {
        ctx.part_mut(ProcP).budgets.elim -= 3;
        if watch_redundant(ctx.borrow(), pos_watch) {
            continue;
        }
        if let Watch::Long { cref, .. } = pos_watch {
            if ctx.part(ClauseAllocP).header(*cref).freed() {
                continue;
            }
        }

        for neg_watch in negs.iter() {
            ctx.part_mut(ProcP).budgets.elim -= 3;
            if watch_redundant(ctx.borrow(), neg_watch) {
                continue;
            }
            if let Watch::Long { cref, .. } = neg_watch {
                if ctx.part(ClauseAllocP).header(*cref).freed() {
                    continue;
                }
            }

            let resolvent = match merge(ctx.borrow(), pos_watch, neg_watch, var) {
                None => continue,
                Some(resolvent) => resolvent,
            };

            match resolvent.len() {
                0 | 1 => (),
                2 => after_bin += 1,
                3 => after_tri += 1,
                _ => after_long += 1,
            }

            let after_clauses = after_bin + after_tri + after_long;
            if after_clauses > before_clauses || ctx.part(ProcP).budgets.elim < -10_000 {
                return ELIM_SKIP;
            }

            let glue = resolvent_glue(ctx.borrow(), pos_watch, neg_watch);
            ctx.part_mut(EliminatorP).resolvents.push((resolvent, glue));
        }
    }

    after_long + after_tri + after_bin * 3
        - pos.total_longer()
        - neg.total_longer()
        - (pos.bin + neg.bin) * 3
}

/// Log and remove every clause of one polarity of the pivot.
///
/// Irredundant clauses go to the blocked clause log in outer numbering; redundant ones are simply
/// dropped.
fn remove_clauses_of(
    mut ctx: partial!(
        Context,
        mut BlockedClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminatorP,
        mut ScratchP,
        mut WatchlistsP,
        VariablesP,
    ),
    lit: Lit,
) {
    let watches: Vec<Watch> = ctx.part(WatchlistsP).watched_by(lit).to_vec();

    for watch in watches {
        let (lits, redundant): (Vec<Lit>, bool) = match watch {
            Watch::Binary { other, redundant } => {
                if ctx.part_mut(WatchlistsP).remove_binary([lit, other]).is_none() {
                    continue;
                }
                (vec![lit, other], redundant)
            }
            Watch::Ternary { other: [a, b], redundant } => {
                if ctx
                    .part_mut(WatchlistsP)
                    .remove_ternary([lit, a, b])
                    .is_none()
                {
                    continue;
                }
                (vec![lit, a, b], redundant)
            }
            Watch::Long { cref, .. } => {
                let header = ctx.part(ClauseAllocP).header(cref);
                if header.freed() {
                    continue;
                }
                let redundant = header.redundant();
                let lits = ctx.part(ClauseAllocP).clause(cref).lits().to_vec();
                unlink_and_free(ctx.borrow(), cref);
                (lits, redundant)
            }
        };

        for &other_lit in lits.iter() {
            ctx.part_mut(ScratchP).touched_vars.set(other_lit.var());
        }

        if !redundant {
            let variables = ctx.part(VariablesP);
            let outer_lits = lits.iter().map(|&l| variables.lit_to_outer(l)).collect();
            let blocked_on = variables.lit_to_outer(lit);
            ctx.part_mut(BlockedClausesP).push(BlockedClause {
                blocked_on,
                to_remove: false,
                lits: outer_lits,
            });
        } else {
            ctx.part_mut(EliminatorP).stats.redundant_dropped += 1;
        }
    }
}

/// Eliminate a variable if the trial resolution allows it.
///
/// Returns false when a contradiction was derived while adding resolvents.
pub fn maybe_eliminate(
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
        mut ScratchP,
        mut SolverStateP,
        mut SubsumerP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    var: Var,
) -> bool {
    if test_var_elim(ctx.borrow(), var) == ELIM_SKIP {
        return true;
    }

    // Remove all clauses mentioning the variable, logging the irredundant ones.
    remove_clauses_of(ctx.borrow(), var.positive());
    remove_clauses_of(ctx.borrow(), var.negative());

    debug_assert!(ctx.part(WatchlistsP).watched_by(var.positive()).is_empty());
    debug_assert!(ctx.part(WatchlistsP).watched_by(var.negative()).is_empty());

    // Add the cached resolvents.
    let resolvents = std::mem::replace(&mut ctx.part_mut(EliminatorP).resolvents, vec![]);

    for (lits, glue) in resolvents.iter() {
        ctx.part_mut(EliminatorP).stats.clauses_resolved += 1;

        // A new binary can subsume an existing irredundant ternary.
        if lits.len() == 2 {
            subsume_ternaries_with_binary(ctx.borrow(), [lits[0], lits[1]]);
        }

        let cref = add_clause_int(ctx.borrow(), lits, false, *glue, true);

        if ctx.part(SolverStateP).is_unsat() {
            break;
        }

        if let Some(cref) = cref {
            subsume0(ctx.borrow(), cref);
        }

        for &lit in lits.iter() {
            ctx.part_mut(ScratchP).touched_vars.set(lit.var());
        }
    }

    // The variable is gone now, whatever happened above.
    ctx.part_mut(EliminatorP).var_elimed[var.index()] = true;
    ctx.part_mut(EliminatorP).stats.vars_eliminated += 1;
    ctx.part_mut(VariablesP).set_removed(var, Removed::Eliminated);
    ctx.part_mut(VariablesP).set_decision(var, false);

    // Refresh the elimination scores of every variable we touched.
    let touched: Vec<Var> = ctx.part(ScratchP).touched_vars.touched().to_vec();
    ctx.part_mut(ScratchP).touched_vars.clear();

    for touched_var in touched {
        if touched_var == var
            || !ctx.part(EliminatorP).order.in_heap(touched_var)
            || ctx.part(AssignmentP).var_value(touched_var).is_some()
            || ctx.part(VariablesP).removed(touched_var) != Removed::None
        {
            continue;
        }
        let cost = if ctx.part(SolverConfigP).elim_strategy == 1 {
            (test_var_elim(ctx.borrow(), touched_var), 0)
        } else {
            heuristic_elim_score(ctx.borrow(), touched_var)
        };
        ctx.part_mut(EliminatorP).order.update(touched_var, cost);
    }

    !ctx.part(SolverStateP).is_unsat()
}

/// Remove irredundant ternaries subsumed by a newly derived binary.
fn subsume_ternaries_with_binary(
    mut ctx: partial!(Context, mut EliminatorP, mut ScratchP, mut WatchlistsP),
    lits: [Lit; 2],
) {
    loop {
        let found = ctx
            .part(WatchlistsP)
            .watched_by(lits[0])
            .iter()
            .find_map(|watch| match watch {
                Watch::Ternary { other, redundant }
                    if !redundant && (other[0] == lits[1] || other[1] == lits[1]) =>
                {
                    Some(*other)
                }
                _ => None,
            });

        match found {
            None => return,
            Some(other) => {
                ctx.part_mut(WatchlistsP)
                    .remove_ternary([lits[0], other[0], other[1]]);
                ctx.part_mut(ScratchP).touched_vars.set(other[0].var());
                ctx.part_mut(ScratchP).touched_vars.set(other[1].var());
                ctx.part_mut(EliminatorP).stats.tris_subsumed_by_bin += 1;
            }
        }
    }
}

/// Run bounded variable elimination until the queue or the budget is exhausted.
///
/// Returns false when a contradiction was derived.
pub fn eliminate_vars(
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
    order_vars_for_elim(ctx.borrow());

    while let Some(var) = ctx.part_mut(EliminatorP).order.pop() {
        if ctx.part(ProcP).budgets.elim < 0 {
            break;
        }
        if ctx.part(AssignmentP).var_value(var).is_some()
            || ctx.part(VariablesP).removed(var) != Removed::None
        {
            continue;
        }

        if !maybe_eliminate(ctx.borrow(), var) {
            return false;
        }

        if !ctx.part(TrailP).fully_propagated() {
            if !propagate_and_clean(ctx.borrow()) {
                return false;
            }
        }
    }

    true
}
