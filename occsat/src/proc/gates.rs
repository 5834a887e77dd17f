//! OR-gate discovery and gate based rewriting.
//!
//! A clause `(¬e ∨ l1 ∨ … ∨ lk)` together with the binaries `(e ∨ ¬l1) … (e ∨ ¬lk)` encodes the
//! gate `e ≡ l1 ∨ … ∨ lk`. Discovered gates are used three ways:
//!
//!   * clauses containing the whole left hand side are rewritten to use `e` instead, removing
//!     k−1 literals per clause,
//!   * through AND-gate duality, pairs of clauses `(X ∨ ¬l1)`, `(X ∨ ¬l2)` for a two-input gate
//!     contract to the single clause `(X ∨ ¬e)`,
//!   * two gates with identical left hand sides but different right hand variables witness an
//!     equivalence between their right hand literals.
//!
//! Gates discovered through redundant clauses may only drive redundant simplifications.
use log::debug;
use partial_ref::{partial, PartialRef};

use occsat_formula::Lit;

use crate::clause::{clause_abstraction, ClauseRef};
use crate::context::{parts::*, Context};
use crate::load::add_clause_int;
use crate::prop::Watch;

use super::occur::unlink_and_free;

/// A discovered OR-gate `rhs ≡ lhs[0] ∨ … ∨ lhs[k-1]`.
#[derive(Clone, Debug)]
pub struct OrGate {
    /// Left hand side literals, sorted ascending.
    pub lhs: Vec<Lit>,
    /// Right hand side literal.
    pub rhs: Lit,
    /// Some participating clause was redundant.
    pub from_redundant: bool,
    /// The gate's defining clause was removed; the gate may no longer be used.
    pub removed: bool,
}

/// Gate finder state, valid for one simplification round.
#[derive(Default)]
pub struct GateFinder {
    gates: Vec<OrGate>,
    /// Gate indices by left hand side literal.
    gate_occ: Vec<Vec<u32>>,
    /// Gate indices by right hand side literal.
    gate_occ_eq: Vec<Vec<u32>>,

    pub stats: GateStats,
}

#[derive(Default)]
pub struct GateStats {
    pub gates_found: u64,
    pub clauses_shortened: u64,
    pub clauses_removed: u64,
    pub and_contracted: u64,
    pub equivalences: u64,
}

impl GateFinder {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.gate_occ.resize(count * 2, vec![]);
        self.gate_occ_eq.resize(count * 2, vec![]);
    }

    /// The discovered gates.
    pub fn gates(&self) -> &[OrGate] {
        &self.gates
    }

    /// Drop all gates and their indices.
    pub fn clear(&mut self) {
        self.gates.clear();
        for list in self.gate_occ.iter_mut() {
            list.clear();
        }
        for list in self.gate_occ_eq.iter_mut() {
            list.clear();
        }
    }

    fn push_gate(&mut self, gate: OrGate) {
        let index = self.gates.len() as u32;
        for &lit in gate.lhs.iter() {
            self.gate_occ[lit.code()].push(index);
        }
        self.gate_occ_eq[gate.rhs.code()].push(index);
        self.gates.push(gate);
        self.stats.gates_found += 1;
    }
}

/// Discover OR-gates among the occur-linked irredundant clauses.
pub fn find_or_gates(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut GateFinderP,
        mut ProcP,
        mut ScratchP,
        WatchlistsP,
        SolverConfigP,
    ),
) {
    let max_gate_size = ctx.part(SolverConfigP).max_gate_size;

    for index in 0..ctx.part(ProcP).clauses.len() {
        if ctx.part(ProcP).budgets.gate_finder < 0 {
            break;
        }

        let cref = ctx.part(ProcP).clauses[index];
        {
            let header = ctx.part(ClauseAllocP).header(cref);
            if header.freed() || header.len() > max_gate_size {
                continue;
            }
        }

        find_or_gate(ctx.borrow(), cref);
    }

    debug!(
        "gate finder: {} gates",
        ctx.part(GateFinderP).stats.gates_found
    );
}

/// Try each literal of the clause as the defining output of an OR-gate.
fn find_or_gate(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut GateFinderP,
        mut ProcP,
        mut ScratchP,
        WatchlistsP,
    ),
    cref: ClauseRef,
) {
    let len = ctx.part(ClauseAllocP).header(cref).len();
    let clause_redundant = ctx.part(ClauseAllocP).header(cref).redundant();

    'candidates: for position in 0..len {
        let neg_rhs = ctx.part(ClauseAllocP).clause(cref).lits()[position];
        let rhs = !neg_rhs;

        // Mark every literal reachable from rhs over a single binary: seen for irredundant
        // binaries, seen2 for redundant ones.
        {
            let (scratch, mut ctx) = ctx.split_part_mut(ScratchP);
            let (watchlists, mut ctx) = ctx.split_part(WatchlistsP);
            let list = watchlists.watched_by(rhs);
            ctx.part_mut(ProcP).budgets.gate_finder -= list.len() as i64 + 1;

            for watch in list {
                if let Watch::Binary { other, redundant } = watch {
                    if *redundant {
                        scratch.seen2.set(*other);
                    } else {
                        scratch.seen.set(*other);
                    }
                }
            }
        }

        // Check that every other literal li has a binary (rhs ∨ ¬li).
        let mut from_redundant = clause_redundant;
        let mut all_present = true;

        for other_position in 0..len {
            if other_position == position {
                continue;
            }
            let li = ctx.part(ClauseAllocP).clause(cref).lits()[other_position];
            let scratch = ctx.part(ScratchP);
            if scratch.seen.is_set(!li) {
                continue;
            }
            if scratch.seen2.is_set(!li) {
                from_redundant = true;
                continue;
            }
            all_present = false;
            break;
        }

        {
            let scratch = ctx.part_mut(ScratchP);
            scratch.seen.clear();
            scratch.seen2.clear();
        }

        if !all_present {
            continue 'candidates;
        }

        let mut lhs: Vec<Lit> = ctx
            .part(ClauseAllocP)
            .clause(cref)
            .lits()
            .iter()
            .cloned()
            .filter(|&lit| lit != neg_rhs)
            .collect();
        lhs.sort_unstable();

        ctx.part_mut(ClauseAllocP).header_mut(cref).set_or_gate(true);
        ctx.part_mut(GateFinderP).push_gate(OrGate {
            lhs,
            rhs,
            from_redundant,
            removed: false,
        });

        // One gate per clause is enough.
        return;
    }
}

/// Detect equivalent literals from gates sharing a left hand side.
///
/// An equivalence `rhs1 ≡ rhs2` is recorded as the two implication binaries, which preserves
/// equisatisfiability and lets the subsumer and eliminator exploit it.
pub fn find_eq_gates(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut GateFinderP,
        mut ImplGraphP,
        mut ProcP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
    ),
) {
    let mut order: Vec<usize> = (0..ctx.part(GateFinderP).gates.len()).collect();
    {
        let gates = &ctx.part(GateFinderP).gates;
        order.sort_unstable_by(|&a, &b| {
            gates[a]
                .lhs
                .cmp(&gates[b].lhs)
                .then(gates[a].rhs.cmp(&gates[b].rhs))
        });
    }

    for pair in order.windows(2) {
        let (rhs1, rhs2, redundant) = {
            let gates = &ctx.part(GateFinderP).gates;
            let gate1 = &gates[pair[0]];
            let gate2 = &gates[pair[1]];
            if gate1.removed || gate2.removed || gate1.lhs != gate2.lhs {
                continue;
            }
            if gate1.rhs.var() == gate2.rhs.var() {
                continue;
            }
            (gate1.rhs, gate2.rhs, gate1.from_redundant || gate2.from_redundant)
        };

        // Both gates define the same disjunction, so rhs1 ≡ rhs2.
        if ctx.part(WatchlistsP).find_binary([!rhs1, rhs2]).is_none() {
            add_clause_int(ctx.borrow(), &[!rhs1, rhs2], redundant, 0, true);
        }
        if ctx.part(WatchlistsP).find_binary([rhs1, !rhs2]).is_none() {
            add_clause_int(ctx.borrow(), &[rhs1, !rhs2], redundant, 0, true);
        }
        ctx.part_mut(GateFinderP).stats.equivalences += 1;
    }
}

/// Rewrite clauses through the discovered gates.
///
/// Returns false when a contradiction was derived.
pub fn all_gate_optimisations(
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
        mut WatchlistsP,
        VariablesP,
    ),
) -> bool {
    find_eq_gates(ctx.borrow());

    for gate_index in 0..ctx.part(GateFinderP).gates.len() {
        if ctx.part(SolverStateP).is_unsat() {
            return false;
        }
        if ctx.part(ProcP).budgets.shorten_gates >= 0 {
            if !shorten_with_gate(ctx.borrow(), gate_index) {
                return false;
            }
        }
        if ctx.part(ProcP).budgets.clrem_gates >= 0 {
            if !contract_with_gate(ctx.borrow(), gate_index) {
                return false;
            }
        }
        if !ctx.part(TrailP).fully_propagated() {
            if !super::occur::propagate_and_clean(ctx.borrow()) {
                return false;
            }
        }
    }

    true
}

/// Shorten every clause containing the gate's whole left hand side.
fn shorten_with_gate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut GateFinderP,
        mut ImplGraphP,
        mut ProcP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
    ),
    gate_index: usize,
) -> bool {
    let (lhs, rhs, from_redundant) = {
        let gate = &ctx.part(GateFinderP).gates[gate_index];
        if gate.removed {
            return true;
        }
        (gate.lhs.clone(), gate.rhs, gate.from_redundant)
    };

    let lhs_abst = clause_abstraction(&lhs);

    // Enumerate candidates through the shortest occur list among the lhs literals.
    let search_lit = *lhs
        .iter()
        .min_by_key(|&&lit| ctx.part(WatchlistsP).watched_by(lit).len())
        .unwrap();

    let candidates: Vec<ClauseRef> = ctx
        .part(WatchlistsP)
        .watched_by(search_lit)
        .iter()
        .filter_map(|watch| match watch {
            Watch::Long { cref, abst } if lhs_abst & !*abst == 0 => Some(*cref),
            _ => None,
        })
        .collect();

    let list_len = ctx.part(WatchlistsP).watched_by(search_lit).len() as i64;
    ctx.part_mut(ProcP).budgets.shorten_gates -= list_len;

    for cref in candidates {
        {
            let header = ctx.part(ClauseAllocP).header(cref);
            // Gate definitions themselves must not be rewritten through the gate.
            if header.freed() || header.or_gate() {
                continue;
            }
            if from_redundant && !header.redundant() {
                continue;
            }
        }

        let clause_len = ctx.part(ClauseAllocP).header(cref).len() as i64;
        ctx.part_mut(ProcP).budgets.shorten_gates -= clause_len;

        let (contains_lhs, contains_rhs, contains_neg_rhs) = {
            let lits = ctx.part(ClauseAllocP).clause(cref).lits();
            (
                super::subsume::clause_subsumes(&lhs, lits),
                lits.contains(&rhs),
                lits.contains(&!rhs),
            )
        };

        if !contains_lhs {
            continue;
        }

        if contains_rhs {
            // Implied by the gate's defining clause together with the rewrite below, leave it to
            // subsumption.
            continue;
        }

        if contains_neg_rhs {
            // (¬rhs ∨ lhs ∨ X) is subsumed by the gate's defining clause.
            unlink_and_free(ctx.borrow(), cref);
            ctx.part_mut(GateFinderP).stats.clauses_removed += 1;
            continue;
        }

        // Rewrite to (X ∨ rhs).
        let (new_lits, redundant, glue) = {
            let header = ctx.part(ClauseAllocP).header(cref);
            let glue = header.glue();
            let redundant = header.redundant();
            let mut new_lits: Vec<Lit> = ctx
                .part(ClauseAllocP)
                .clause(cref)
                .lits()
                .iter()
                .cloned()
                .filter(|lit| !lhs.contains(lit))
                .collect();
            new_lits.push(rhs);
            (new_lits, redundant, glue)
        };

        unlink_and_free(ctx.borrow(), cref);

        // A shortened clause that collapses onto an existing binary is simply dropped.
        if new_lits.len() == 2
            && ctx
                .part(WatchlistsP)
                .find_binary([new_lits[0], new_lits[1]])
                .is_some()
        {
            ctx.part_mut(GateFinderP).stats.clauses_removed += 1;
            continue;
        }

        add_clause_int(ctx.borrow(), &new_lits, redundant, glue, true);
        ctx.part_mut(GateFinderP).stats.clauses_shortened += 1;

        if ctx.part(SolverStateP).is_unsat() {
            return false;
        }
    }

    true
}

/// Contract clause pairs through the AND-gate dual of a two-input OR-gate.
///
/// For `e ≡ a ∨ b`, every pair `(X ∨ ¬a)`, `(X ∨ ¬b)` with identical `X` is replaced by
/// `(X ∨ ¬e)`.
fn contract_with_gate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut GateFinderP,
        mut ImplGraphP,
        mut ProcP,
        mut ScratchP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
    ),
    gate_index: usize,
) -> bool {
    let (lit_a, lit_b, rhs, from_redundant) = {
        let gate = &ctx.part(GateFinderP).gates[gate_index];
        if gate.removed || gate.lhs.len() != 2 {
            return true;
        }
        (gate.lhs[0], gate.lhs[1], gate.rhs, gate.from_redundant)
    };

    let candidates_a: Vec<ClauseRef> = ctx
        .part(WatchlistsP)
        .watched_by(!lit_a)
        .iter()
        .filter_map(|watch| match watch {
            Watch::Long { cref, .. } => Some(*cref),
            _ => None,
        })
        .collect();

    ctx.part_mut(ProcP).budgets.clrem_gates -= candidates_a.len() as i64;

    'outer: for cref_a in candidates_a {
        {
            let header = ctx.part(ClauseAllocP).header(cref_a);
            if header.freed() || header.or_gate() {
                continue;
            }
            if from_redundant && !header.redundant() {
                continue;
            }
        }

        let (len_a, redundant_a, glue_a) = {
            let header = ctx.part(ClauseAllocP).header(cref_a);
            (header.len(), header.redundant(), header.glue())
        };

        // Mark X = lits(A) \ {¬a} in the scratch bitset.
        let mut shared_abst = 0;
        {
            let (scratch, ctx) = ctx.split_part_mut(ScratchP);
            for &lit in ctx.part(ClauseAllocP).clause(cref_a).lits() {
                if lit != !lit_a {
                    scratch.seen.set(lit);
                    shared_abst |= 1 << (lit.index() % 32);
                }
            }
        }

        // A clause containing ¬e or the other gate input cannot participate.
        if ctx.part(ScratchP).seen.is_set(!lit_b) || ctx.part(ScratchP).seen.is_set(!rhs) {
            ctx.part_mut(ScratchP).seen.clear();
            continue;
        }

        let candidates_b: Vec<ClauseRef> = ctx
            .part(WatchlistsP)
            .watched_by(!lit_b)
            .iter()
            .filter_map(|watch| match watch {
                Watch::Long { cref, abst } if shared_abst & !*abst == 0 => Some(*cref),
                _ => None,
            })
            .collect();

        ctx.part_mut(ProcP).budgets.clrem_gates -= candidates_b.len() as i64;

        for cref_b in candidates_b {
            let matches = {
                let header = ctx.part(ClauseAllocP).header(cref_b);
                if header.freed()
                    || header.or_gate()
                    || header.len() != len_a
                    || cref_b == cref_a
                {
                    false
                } else {
                    let scratch = ctx.part(ScratchP);
                    ctx.part(ClauseAllocP)
                        .clause(cref_b)
                        .lits()
                        .iter()
                        .all(|&lit| lit == !lit_b || scratch.seen.is_set(lit))
                }
            };

            if !matches {
                continue;
            }

            let redundant_b = ctx.part(ClauseAllocP).header(cref_b).redundant();

            let mut new_lits: Vec<Lit> = ctx
                .part(ClauseAllocP)
                .clause(cref_a)
                .lits()
                .iter()
                .cloned()
                .filter(|&lit| lit != !lit_a)
                .collect();
            new_lits.push(!rhs);

            ctx.part_mut(ScratchP).seen.clear();

            unlink_and_free(ctx.borrow(), cref_a);
            unlink_and_free(ctx.borrow(), cref_b);

            let redundant = redundant_a || redundant_b || from_redundant;
            let glue = std::cmp::max(glue_a, 1);
            add_clause_int(ctx.borrow(), &new_lits, redundant, glue, true);
            ctx.part_mut(GateFinderP).stats.and_contracted += 1;

            if ctx.part(SolverStateP).is_unsat() {
                return false;
            }

            continue 'outer;
        }

        ctx.part_mut(ScratchP).seen.clear();
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use occsat_formula::{cnf_formula, lits};

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::proc::occur;
    use crate::prop::detach_all_longs;

    fn setup(formula: &occsat_formula::CnfFormula) -> Box<Context> {
        let mut ctx = Box::new(Context::default());
        {
            let mut ctx = ctx.into_partial_ref_mut();
            set_var_count(ctx.borrow(), formula.var_count());
            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }
            detach_all_longs(ctx.borrow());
            assert!(occur::link_all(ctx.borrow()));
            crate::proc::set_budgets(ctx.borrow());
        }
        ctx
    }

    #[test]
    fn finds_a_simple_or_gate() {
        // 4 ≡ 1 ∨ 2 ∨ 3
        let formula = cnf_formula![
            -4, 1, 2, 3;
            4, -1;
            4, -2;
            4, -3;
        ];

        let mut ctx = setup(&formula);
        let mut ctx = ctx.into_partial_ref_mut();

        find_or_gates(ctx.borrow());

        let gates = ctx.part(GateFinderP).gates();
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].rhs, lits![4][0]);
        let mut expected = lits![1, 2, 3].to_vec();
        expected.sort_unstable();
        assert_eq!(gates[0].lhs, expected);
        assert!(!gates[0].from_redundant);
    }

    #[test]
    fn shortens_clauses_through_the_gate() {
        // Gate 4 ≡ 1 ∨ 2 ∨ 3 plus a clause containing the whole lhs
        let formula = cnf_formula![
            -4, 1, 2, 3;
            4, -1;
            4, -2;
            4, -3;
            1, 2, 3, 5;
        ];

        let mut ctx = setup(&formula);
        let mut ctx = ctx.into_partial_ref_mut();

        find_or_gates(ctx.borrow());
        assert!(all_gate_optimisations(ctx.borrow()));

        // (1 2 3 5) became (4 5), a binary
        assert_eq!(ctx.part(GateFinderP).stats.clauses_shortened, 1);
        assert!(ctx
            .part(WatchlistsP)
            .find_binary([lits![4][0], lits![5][0]])
            .is_some());
    }
}
