//! Blocked clause log and solution extension.
//!
//! Clauses removed by blocked clause elimination and bounded variable elimination are not
//! logically implied by the remaining formula, only equisatisfiable with it. Every such clause is
//! appended to a log together with the literal it was blocked on. Replaying the log in reverse
//! insertion order turns any model of the simplified formula into a model of the original
//! formula: whenever a logged clause is unsatisfied, its blocked literal is flipped and the
//! consequences are propagated through a replay-local clause set; flipping cannot unsatisfy an
//! entry replayed earlier, and a propagation conflict would mean the log is inconsistent.
//!
//! The log stores literals in *outer* numbering so it survives renamings of the solver's inner
//! variables.
use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use occsat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::load::add_clause_int;
use crate::prop::Watch;
use crate::variables::Removed;

/// A clause removed by simplification, reconstructible during model extension.
pub struct BlockedClause {
    /// The literal this clause was blocked on, in outer numbering.
    pub blocked_on: Lit,
    /// Entry was re-added to the solver and must be skipped during replay.
    pub to_remove: bool,
    /// The clause's literals, in outer numbering.
    pub lits: Vec<Lit>,
}

/// Append-only log of blocked clauses.
#[derive(Default)]
pub struct BlockedClauses {
    clauses: Vec<BlockedClause>,
    /// Entry indices by blocked-on variable. Rebuilt lazily after new entries are pushed.
    by_var: FxHashMap<Var, Vec<usize>>,
    map_built: bool,
}

impl BlockedClauses {
    /// Append an entry to the log.
    pub fn push(&mut self, clause: BlockedClause) {
        self.map_built = false;
        self.clauses.push(clause);
    }

    /// Number of log entries, including dead ones.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// All entries in insertion order.
    pub fn clauses(&self) -> &[BlockedClause] {
        &self.clauses
    }

    /// Drop entries marked `to_remove`.
    pub fn clean(&mut self) {
        if self.clauses.iter().any(|clause| clause.to_remove) {
            self.clauses.retain(|clause| !clause.to_remove);
            self.map_built = false;
        }
    }

    fn build_map(&mut self) {
        self.by_var.clear();
        for (index, clause) in self.clauses.iter().enumerate() {
            self.by_var
                .entry(clause.blocked_on.var())
                .or_default()
                .push(index);
        }
        self.map_built = true;
    }

    /// Indices of entries blocked on the given outer variable.
    fn entries_for(&mut self, var: Var) -> Vec<usize> {
        if !self.map_built {
            self.build_map();
        }
        self.by_var.get(&var).cloned().unwrap_or_default()
    }
}

/// Replay-local clause set with its own partial assignment and unit propagation queue.
///
/// Rebuilt for every model extension from the remaining irredundant clauses; the blocked log
/// entries join it as they are replayed. Works in outer numbering on a private assignment, so
/// replay flips never touch solver state.
struct Extender {
    values: Vec<Option<bool>>,
    clauses: Vec<Vec<Lit>>,
    /// Clause indices by literal code.
    occur: Vec<Vec<usize>>,
    trail: Vec<Lit>,
    queue_head: usize,
}

impl Extender {
    fn new(var_count: usize) -> Extender {
        Extender {
            values: vec![None; var_count],
            clauses: vec![],
            occur: vec![vec![]; var_count * 2],
            trail: vec![],
            queue_head: 0,
        }
    }

    fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.index()].map(|value| value ^ lit.is_negative())
    }

    fn satisfied(&self, lits: &[Lit]) -> bool {
        lits.iter().any(|&lit| self.lit_value(lit) == Some(true))
    }

    fn unassigned_count(&self, lits: &[Lit]) -> usize {
        lits.iter()
            .filter(|&&lit| self.lit_value(lit).is_none())
            .count()
    }

    /// Assign a literal true, overwriting any previous value, and queue it for propagation.
    fn enqueue(&mut self, lit: Lit) {
        self.values[lit.index()] = Some(lit.is_positive());
        self.trail.push(lit);
    }

    /// Register a clause in the local set without propagating it.
    fn insert(&mut self, lits: &[Lit]) -> usize {
        let index = self.clauses.len();
        for &lit in lits {
            self.occur[lit.code()].push(index);
        }
        self.clauses.push(lits.to_vec());
        index
    }

    /// Add a clause to the local set and propagate its consequences.
    ///
    /// Returns false when propagation derives a conflict.
    fn add_clause(&mut self, lits: &[Lit]) -> bool {
        let index = self.insert(lits);
        self.propagate_clause(index) && self.propagate()
    }

    /// Enqueue the unit consequence of a clause if it has one.
    ///
    /// Returns false when the clause has neither a true nor an unassigned literal.
    fn propagate_clause(&mut self, index: usize) -> bool {
        let mut unassigned = None;
        let mut unassigned_count = 0;
        for position in 0..self.clauses[index].len() {
            let lit = self.clauses[index][position];
            match self.lit_value(lit) {
                Some(true) => return true,
                Some(false) => (),
                None => {
                    unassigned = Some(lit);
                    unassigned_count += 1;
                }
            }
        }
        match unassigned {
            None => false,
            Some(lit) => {
                if unassigned_count == 1 {
                    self.enqueue(lit);
                }
                true
            }
        }
    }

    /// Drain the unit propagation queue.
    ///
    /// Returns false when a clause of the local set became empty.
    fn propagate(&mut self) -> bool {
        while self.queue_head < self.trail.len() {
            let lit = self.trail[self.queue_head];
            self.queue_head += 1;

            for position in 0..self.occur[(!lit).code()].len() {
                let index = self.occur[(!lit).code()][position];
                if !self.propagate_clause(index) {
                    return false;
                }
            }
        }
        true
    }
}

/// Extend the solver's assignment to a complete model over the outer variables.
///
/// `model` determines the outer variable count and is fully overwritten. A replay-local clause
/// set is built from the remaining irredundant long clauses and the irredundant binaries and
/// ternaries in the watchlists; the blocked clause log is then replayed in reverse insertion
/// order. An entry that is unsatisfied with no literal left to assign gets its blocked-on literal
/// flipped, propagating the consequences through the local set with a small unit propagation
/// queue. Replaying in reverse guarantees the flip cannot unsatisfy an entry replayed before it,
/// so replaying twice is equivalent to replaying once; a propagation conflict means the log is
/// inconsistent with the clause database and aborts.
pub fn extend_model(
    mut ctx: partial!(
        Context,
        mut BlockedClausesP,
        AssignmentP,
        ClauseAllocP,
        ClauseDbP,
        ImplGraphP,
        VariablesP,
        WatchlistsP,
    ),
    model: &mut Vec<bool>,
) {
    ctx.part_mut(BlockedClausesP).clean();

    let mut extender = Extender::new(model.len());

    // Start from the solver's assignment, mapped to outer numbering. Eliminated variables are
    // unassigned here.
    {
        let variables = ctx.part(VariablesP);
        let assignment = ctx.part(AssignmentP);
        for index in 0..variables.var_count() {
            let inner = Var::from_index(index);
            if let Some(value) = assignment.var_value(inner) {
                if let Some(outer) = variables.outer_from_inner().get(inner) {
                    extender.values[outer.index()] = Some(value);
                }
            }
        }
    }

    // The replay-only clause set: the remaining irredundant long clauses plus the irredundant
    // binaries and ternaries in the watchlists.
    let mut lits = vec![];
    {
        let variables = ctx.part(VariablesP);
        let alloc = ctx.part(ClauseAllocP);

        for &cref in ctx.part(ClauseDbP).clauses.iter() {
            let clause = alloc.clause(cref);
            if clause.header().freed() || clause.header().redundant() {
                continue;
            }
            lits.clear();
            lits.extend(clause.lits().iter().map(|&lit| variables.lit_to_outer(lit)));
            let ok = extender.add_clause(&lits);
            assert!(ok, "conflict while rebuilding the replay clause set");
        }

        for index in 0..variables.var_count() {
            let var = Var::from_index(index);
            for &lit in [var.positive(), var.negative()].iter() {
                for watch in ctx.part(WatchlistsP).watched_by(lit) {
                    // Each implicit clause is added through its smallest literal only.
                    match *watch {
                        Watch::Binary { other, redundant } if !redundant && lit < other => {
                            lits.clear();
                            lits.push(variables.lit_to_outer(lit));
                            lits.push(variables.lit_to_outer(other));
                        }
                        Watch::Ternary { other: [a, b], redundant }
                            if !redundant && lit < a =>
                        {
                            lits.clear();
                            lits.push(variables.lit_to_outer(lit));
                            lits.push(variables.lit_to_outer(a));
                            lits.push(variables.lit_to_outer(b));
                        }
                        _ => continue,
                    }
                    let ok = extender.add_clause(&lits);
                    assert!(ok, "conflict while rebuilding the replay clause set");
                }
            }
        }
    }

    // Replay the log in reverse insertion order. Every entry joins the local clause set, so the
    // propagation below keeps earlier-replayed entries satisfied.
    let blocked = ctx.part(BlockedClausesP);
    for entry in blocked.clauses().iter().rev() {
        if entry.to_remove {
            continue;
        }

        let index = extender.insert(&entry.lits);

        if extender.satisfied(&entry.lits) {
            continue;
        }

        // With an unassigned literal left the entry can still be satisfied later; it is part of
        // the local set now, so the remaining assignments cannot run past it.
        if extender.unassigned_count(&entry.lits) > 0 {
            let ok = extender.propagate_clause(index) && extender.propagate();
            assert!(ok, "conflict while replaying the blocked clause log");
            continue;
        }

        // All literals are false; the blocked-on literal must be flipped. This can only happen
        // to variables the simplifier removed, never to literals forced at the top level.
        debug_assert_eq!(extender.lit_value(entry.blocked_on), Some(false));
        debug_assert!(
            match ctx.part(VariablesP).lit_from_outer(entry.blocked_on) {
                Some(inner) => ctx.part(AssignmentP).var_value(inner.var()).is_none()
                    || ctx.part(ImplGraphP).level(inner.var()) != 0,
                None => true,
            },
            "blocked clause log entry flips a top level assignment"
        );

        extender.enqueue(entry.blocked_on);
        let ok = extender.propagate();
        assert!(
            ok,
            "conflict after flipping a blocked literal, the log is inconsistent"
        );
    }

    // Variables the replay left unassigned get a value too, with propagation keeping the local
    // set satisfied while they are filled in.
    for index in 0..extender.values.len() {
        if extender.values[index].is_none() {
            extender.enqueue(Var::from_index(index).positive());
            let ok = extender.propagate();
            assert!(ok, "conflict while assigning leftover variables");
        }
    }

    // Every remaining original clause and every replayed entry is satisfied now.
    debug_assert!(extender
        .clauses
        .iter()
        .all(|clause| extender.satisfied(clause)));

    for (index, value) in extender.values.iter().enumerate() {
        model[index] = value.expect("replay left a variable unassigned");
    }
}

/// Reintroduce an eliminated variable into the solver.
///
/// Every log entry blocked on the variable is re-added as a regular clause and marked dead in the
/// log. Entries can mention further eliminated variables, which are reintroduced recursively.
/// Afterwards the variables take part in search again. Requires no active decisions. Does nothing
/// for variables that are not eliminated, so repeated calls are idempotent.
pub fn un_eliminate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BlockedClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut EliminatorP,
        mut ImplGraphP,
        mut ProcP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    outer_var: Var,
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    // Clear the removal status before touching the log so recursive calls terminate.
    match ctx.part(VariablesP).inner_from_outer().get(outer_var) {
        Some(inner) if ctx.part(VariablesP).removed(inner) == Removed::Eliminated => {
            ctx.part_mut(VariablesP).set_removed(inner, Removed::None);
            ctx.part_mut(VariablesP).set_decision(inner, true);
            ctx.part_mut(EliminatorP).set_un_eliminated(inner);
            ctx.part_mut(VsidsP).make_available(inner);
        }
        _ => return,
    }

    let entries = ctx.part_mut(BlockedClausesP).entries_for(outer_var);

    let mut outer_lits = vec![];

    for index in entries {
        {
            let entry = &mut ctx.part_mut(BlockedClausesP).clauses[index];
            if entry.to_remove {
                continue;
            }
            entry.to_remove = true;
            outer_lits.clear();
            outer_lits.extend_from_slice(&entry.lits);
        }

        // A logged clause can mention variables that were eliminated after it was logged.
        for index in 0..outer_lits.len() {
            let outer_lit = outer_lits[index];
            let eliminated = ctx
                .part(VariablesP)
                .lit_from_outer(outer_lit)
                .map(|inner| ctx.part(VariablesP).removed(inner.var()) == Removed::Eliminated)
                .unwrap_or(false);
            if eliminated {
                un_eliminate(ctx.borrow(), outer_lit.var());
            }
        }

        let inner_lits: Vec<Lit> = outer_lits
            .iter()
            .map(|&lit| {
                ctx.part(VariablesP)
                    .lit_from_outer(lit)
                    .expect("blocked clause over unknown outer variable")
            })
            .collect();

        add_clause_int(ctx.borrow(), &inner_lits, false, 0, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use occsat_formula::{lit, lits};

    use crate::prop::{enqueue_assignment, Reason};

    #[test]
    fn reverse_replay_satisfies_the_log() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        crate::context::set_var_count(ctx.borrow(), 3);

        // Log as produced by eliminating variable 1 from {(1 2), (-1 3)}
        ctx.part_mut(BlockedClausesP).push(BlockedClause {
            blocked_on: lit!(1),
            to_remove: false,
            lits: lits![1, 2].to_vec(),
        });
        ctx.part_mut(BlockedClausesP).push(BlockedClause {
            blocked_on: lit!(-1),
            to_remove: false,
            lits: lits![-1, 3].to_vec(),
        });

        // Residual assignment satisfying the resolvent (2 3): 2 true, 3 false. Variable 1 was
        // eliminated and is unassigned.
        enqueue_assignment(ctx.borrow(), lit!(2), Reason::Unit);
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Unit);

        let mut model = vec![true; 3];
        extend_model(ctx.borrow(), &mut model);

        // Reverse replay visits (-1 3) first; with 3 false it forces variable 1 to false
        // through the local propagation queue. (1 2) stays satisfied through 2.
        assert_eq!(model, vec![false, true, false]);

        // Replaying twice is equivalent to replaying once.
        let snapshot = model.clone();
        extend_model(ctx.borrow(), &mut model);
        assert_eq!(model, snapshot);
    }

    #[test]
    fn flip_propagates_through_the_replay_set() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        crate::context::set_var_count(ctx.borrow(), 2);

        // (1 2) is blocked on 1 against the remaining clause (-1 -2): their resolvent on
        // variable 1 is tautological.
        ctx.part_mut(WatchlistsP).add_binary(lits![-1, -2], false);
        ctx.part_mut(BlockedClausesP).push(BlockedClause {
            blocked_on: lit!(1),
            to_remove: false,
            lits: lits![1, 2].to_vec(),
        });

        // The search later assigned both variables false; the removed clause is unsatisfied.
        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Unit);
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Unit);

        let mut model = vec![true; 2];
        extend_model(ctx.borrow(), &mut model);

        // The entry has all literals false, so variable 1 flips to true. The flip propagates
        // through the replay set, where (-1 -2) stays satisfied through -2.
        assert_eq!(model, vec![true, false]);

        let snapshot = model.clone();
        extend_model(ctx.borrow(), &mut model);
        assert_eq!(model, snapshot);
    }
}
