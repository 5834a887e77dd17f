//! Watchlists over binary, ternary and long clauses.
//!
//! The watchlist of a literal `l` holds one record for every binary and ternary clause containing
//! `l` and, depending on the current [`LongWatchMode`], records for long clauses. Binary and
//! ternary clauses exist *only* as watch records: a binary clause is represented by two `Binary`
//! records, a ternary clause by three `Ternary` records. When a literal `l` is assigned true, the
//! watchlist of `!l` is scanned to find clauses that became unit or empty.
//!
//! In propagation mode each long clause is watched by its first two literals. When one of them is
//! assigned false, the literals of the clause are permuted so that a non-false literal takes its
//! place and the watch record moves to that literal's list. When no replacement exists the clause
//! is unit or empty. There is no need to update watchlists on backtracking, as unassigning
//! variables cannot invalidate this invariant. See [Section 4.5.1 of the "Handbook of
//! Satisfiability"][handbook-ch4] for details.
//!
//! During simplification the same lists serve as occurrence lists: each long clause contributes
//! one `Long` record per literal. The record caches the clause's abstraction so most subsumption
//! candidates can be rejected without touching the clause arena.
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf

use partial_ref::{partial, PartialRef};

use occsat_formula::Lit;

use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};

/// A watch record.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Watch {
    /// A binary clause consisting of the referring literal and `other`.
    Binary { other: Lit, redundant: bool },
    /// A ternary clause consisting of the referring literal and `other`, with
    /// `other[0] < other[1]`.
    Ternary { other: [Lit; 2], redundant: bool },
    /// A long clause containing the referring literal, with its cached abstraction.
    Long { cref: ClauseRef, abst: u32 },
}

/// How long clauses are currently represented in the watchlists.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LongWatchMode {
    /// No long clause records are present.
    Detached,
    /// Each long clause is watched by its first two literals.
    Propagation,
    /// Each long clause has a record in the list of every literal it contains.
    Occur,
}

impl Default for LongWatchMode {
    fn default() -> LongWatchMode {
        LongWatchMode::Detached
    }
}

/// Watchlists doubling as occurrence lists.
#[derive(Default)]
pub struct Watchlists {
    watches: Vec<Vec<Watch>>,
    mode: LongWatchMode,

    irred_bin: usize,
    red_bin: usize,
    irred_tri: usize,
    red_tri: usize,
}

fn sort2(mut lits: [Lit; 2]) -> [Lit; 2] {
    if lits[0] > lits[1] {
        lits.swap(0, 1);
    }
    lits
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Current long clause representation.
    pub fn mode(&self) -> LongWatchMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: LongWatchMode) {
        self.mode = mode;
    }

    /// Records of clauses containing the given literal.
    pub fn watched_by(&self, lit: Lit) -> &[Watch] {
        &self.watches[lit.code()]
    }

    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watch> {
        &mut self.watches[lit.code()]
    }

    /// Add a record to a literal's list.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch)
    }

    /// Add a binary clause.
    pub fn add_binary(&mut self, lits: [Lit; 2], redundant: bool) {
        debug_assert_ne!(lits[0].var(), lits[1].var());
        for i in 0..2 {
            self.watches[lits[i].code()].push(Watch::Binary {
                other: lits[i ^ 1],
                redundant,
            });
        }
        if redundant {
            self.red_bin += 1;
        } else {
            self.irred_bin += 1;
        }
    }

    /// Remove a binary clause, returning its redundancy flag.
    ///
    /// Returns `None` if the clause is not present.
    pub fn remove_binary(&mut self, lits: [Lit; 2]) -> Option<bool> {
        let mut redundant = None;
        for i in 0..2 {
            let list = &mut self.watches[lits[i].code()];
            let position = list.iter().position(
                |watch| matches!(watch, Watch::Binary { other, .. } if *other == lits[i ^ 1]),
            )?;
            if let Watch::Binary { redundant: r, .. } = list.swap_remove(position) {
                redundant = Some(r);
            }
        }
        match redundant {
            Some(true) => self.red_bin -= 1,
            Some(false) => self.irred_bin -= 1,
            None => (),
        }
        redundant
    }

    /// Whether a binary clause is present, returning its redundancy flag.
    pub fn find_binary(&self, lits: [Lit; 2]) -> Option<bool> {
        self.watches[lits[0].code()].iter().find_map(|watch| match watch {
            Watch::Binary { other, redundant } if *other == lits[1] => Some(*redundant),
            _ => None,
        })
    }

    /// Add a ternary clause.
    pub fn add_ternary(&mut self, lits: [Lit; 3], redundant: bool) {
        for i in 0..3 {
            let other = sort2([lits[(i + 1) % 3], lits[(i + 2) % 3]]);
            self.watches[lits[i].code()].push(Watch::Ternary { other, redundant });
        }
        if redundant {
            self.red_tri += 1;
        } else {
            self.irred_tri += 1;
        }
    }

    /// Remove a ternary clause, returning its redundancy flag.
    ///
    /// Returns `None` if the clause is not present.
    pub fn remove_ternary(&mut self, lits: [Lit; 3]) -> Option<bool> {
        let mut redundant = None;
        for i in 0..3 {
            let other = sort2([lits[(i + 1) % 3], lits[(i + 2) % 3]]);
            let list = &mut self.watches[lits[i].code()];
            let position = list.iter().position(
                |watch| matches!(watch, Watch::Ternary { other: o, .. } if *o == other),
            )?;
            if let Watch::Ternary { redundant: r, .. } = list.swap_remove(position) {
                redundant = Some(r);
            }
        }
        match redundant {
            Some(true) => self.red_tri -= 1,
            Some(false) => self.irred_tri -= 1,
            None => (),
        }
        redundant
    }

    /// Start watching a long clause for propagation.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_long_clause(&mut self, cref: ClauseRef, lits: [Lit; 2], abst: u32) {
        debug_assert_eq!(self.mode, LongWatchMode::Propagation);
        for &lit in lits.iter() {
            self.watches[lit.code()].push(Watch::Long { cref, abst });
        }
    }

    /// Remove every long clause record, keeping binary and ternary records.
    pub fn clear_long_watches(&mut self) {
        for list in self.watches.iter_mut() {
            list.retain(|watch| !matches!(watch, Watch::Long { .. }));
        }
        self.mode = LongWatchMode::Detached;
    }

    /// Remove a long clause record from a literal's list.
    ///
    /// Returns whether a record was present.
    pub fn remove_long_watch(&mut self, lit: Lit, cref: ClauseRef) -> bool {
        let list = &mut self.watches[lit.code()];
        match list
            .iter()
            .position(|watch| matches!(watch, Watch::Long { cref: c, .. } if *c == cref))
        {
            Some(position) => {
                list.swap_remove(position);
                true
            }
            None => false,
        }
    }

    /// Whether a literal's list contains a record for the given clause. Used by consistency
    /// checks.
    pub fn find_long_watch(&self, lit: Lit, cref: ClauseRef) -> bool {
        self.watches[lit.code()]
            .iter()
            .any(|watch| matches!(watch, Watch::Long { cref: c, .. } if *c == cref))
    }

    /// Drop implicit clauses satisfied by top level assignments.
    ///
    /// Requires full propagation at decision level 0: every binary touching an assigned variable
    /// is then satisfied, and a ternary with an assigned literal is either satisfied or contains
    /// exactly one false literal. The latter are demoted to binaries, pushed to `demoted` once
    /// each; the caller re-adds them after the scan.
    pub fn scrub_assigned(
        &mut self,
        value: impl Fn(Lit) -> Option<bool>,
        demoted: &mut Vec<([Lit; 2], bool)>,
    ) {
        for code in 0..self.watches.len() {
            let lit = Lit::from_code(code);
            let lit_value = value(lit);
            self.watches[code].retain(|watch| match *watch {
                Watch::Binary { other, .. } => lit_value.is_none() && value(other).is_none(),
                Watch::Ternary { other: [a, b], redundant } => {
                    let keep =
                        lit_value.is_none() && value(a).is_none() && value(b).is_none();
                    // The record of the single false literal is the one that demotes.
                    if !keep
                        && lit_value == Some(false)
                        && value(a).is_none()
                        && value(b).is_none()
                    {
                        demoted.push(([a, b], redundant));
                    }
                    keep
                }
                Watch::Long { .. } => true,
            });
        }

        self.recount_implicit();
    }

    /// Recompute the implicit clause counts from the lists.
    fn recount_implicit(&mut self) {
        let mut bin = [0usize; 2];
        let mut tri = [0usize; 2];
        for list in self.watches.iter() {
            for watch in list.iter() {
                match *watch {
                    Watch::Binary { redundant, .. } => bin[redundant as usize] += 1,
                    Watch::Ternary { redundant, .. } => tri[redundant as usize] += 1,
                    Watch::Long { .. } => (),
                }
            }
        }
        debug_assert_eq!(bin[0] % 2, 0);
        debug_assert_eq!(bin[1] % 2, 0);
        debug_assert_eq!(tri[0] % 3, 0);
        debug_assert_eq!(tri[1] % 3, 0);
        self.irred_bin = bin[0] / 2;
        self.red_bin = bin[1] / 2;
        self.irred_tri = tri[0] / 3;
        self.red_tri = tri[1] / 3;
    }

    /// Number of irredundant binary clauses.
    pub fn irred_bin_count(&self) -> usize {
        self.irred_bin
    }

    /// Number of redundant binary clauses.
    pub fn red_bin_count(&self) -> usize {
        self.red_bin
    }

    /// Number of irredundant ternary clauses.
    pub fn irred_tri_count(&self) -> usize {
        self.irred_tri
    }

    /// Number of redundant ternary clauses.
    pub fn red_tri_count(&self) -> usize {
        self.red_tri
    }
}

/// Rebuild the propagation watches for all long clauses.
///
/// Requires long watches to be detached. Watches are placed on the first two literals of each
/// clause, which must be a valid watched pair for the current assignment.
pub fn attach_all_longs(
    mut ctx: partial!(Context, mut WatchlistsP, ClauseAllocP, ClauseDbP),
) {
    assert_eq!(ctx.part(WatchlistsP).mode(), LongWatchMode::Detached);
    ctx.part_mut(WatchlistsP)
        .set_mode(LongWatchMode::Propagation);

    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (alloc, ctx) = ctx.split_part(ClauseAllocP);

    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        let clause = alloc.clause(cref);
        let header = clause.header();
        if header.freed() {
            continue;
        }
        let lits = clause.lits();
        watchlists.watch_long_clause(cref, [lits[0], lits[1]], header.abstraction());
    }
}

/// Remove every long clause record from the watchlists.
pub fn detach_all_longs(mut ctx: partial!(Context, mut WatchlistsP)) {
    ctx.part_mut(WatchlistsP).clear_long_watches();
}

#[cfg(test)]
mod tests {
    use super::*;

    use occsat_formula::lits;

    #[test]
    fn binary_records_mirror_each_other() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let [a, b] = lits![1, -2];

        watchlists.add_binary([a, b], false);
        watchlists.add_binary([a, !b], true);

        assert_eq!(watchlists.find_binary([a, b]), Some(false));
        assert_eq!(watchlists.find_binary([b, a]), Some(false));
        assert_eq!(watchlists.find_binary([!b, a]), Some(true));
        assert_eq!(watchlists.find_binary([a, !a]), None);

        assert_eq!(watchlists.irred_bin_count(), 1);
        assert_eq!(watchlists.red_bin_count(), 1);

        assert_eq!(watchlists.remove_binary([b, a]), Some(false));
        assert_eq!(watchlists.find_binary([a, b]), None);
        assert_eq!(watchlists.irred_bin_count(), 0);
    }

    #[test]
    fn ternary_records_in_all_three_lists() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(4);

        let [a, b, c] = lits![1, 2, -3];

        watchlists.add_ternary([a, b, c], false);
        assert_eq!(watchlists.irred_tri_count(), 1);

        for &lit in [a, b, c].iter() {
            assert_eq!(watchlists.watched_by(lit).len(), 1);
        }

        // The record stores the two other literals in sorted order
        match watchlists.watched_by(c)[0] {
            Watch::Ternary { other, redundant } => {
                assert_eq!(other, sort2([a, b]));
                assert!(!redundant);
            }
            _ => panic!("expected ternary record"),
        }

        assert_eq!(watchlists.remove_ternary([c, a, b]), Some(false));
        assert_eq!(watchlists.irred_tri_count(), 0);
        for &lit in [a, b, c].iter() {
            assert!(watchlists.watched_by(lit).is_empty());
        }
    }

    #[test]
    fn attaching_and_detaching_restores_the_lists() {
        use partial_ref::IntoPartialRefMut;

        use occsat_formula::cnf_formula;

        use crate::clause::{db, ClauseHeader};
        use crate::context::set_var_count;

        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1, 2, 3, 4;
            -1, -2, 5, 6;
        ];

        set_var_count(ctx.borrow(), formula.var_count());
        ctx.part_mut(WatchlistsP).add_binary(lits![1, 2], false);

        let mut crefs = vec![];
        for clause in formula.iter() {
            crefs.push(db::add_clause(ctx.borrow(), ClauseHeader::new(), clause));
        }

        attach_all_longs(ctx.borrow());

        for (&cref, clause) in crefs.iter().zip(formula.iter()) {
            assert!(ctx.part(WatchlistsP).find_long_watch(clause[0], cref));
            assert!(ctx.part(WatchlistsP).find_long_watch(clause[1], cref));
            assert!(!ctx.part(WatchlistsP).find_long_watch(clause[2], cref));
        }

        detach_all_longs(ctx.borrow());

        for (&cref, clause) in crefs.iter().zip(formula.iter()) {
            assert!(!ctx.part(WatchlistsP).find_long_watch(clause[0], cref));
        }

        // Binary records survive the detach.
        assert_eq!(ctx.part(WatchlistsP).irred_bin_count(), 1);
        assert_eq!(ctx.part(WatchlistsP).mode(), LongWatchMode::Detached);
    }
}
