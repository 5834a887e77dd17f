//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use super::{ClauseHeader, ClauseRef};

use crate::context::{parts::*, Context};
use crate::prop::Reason;

use occsat_formula::Lit;

use std::mem::transmute;

/// Partitions of the clause database.
///
/// The long clauses are partitioned into 4 [`Tier`]s. This follows the approach described by
/// Chanseok Oh in ["Between SAT and UNSAT: The Fundamental Difference in CDCL
/// SAT"](https://doi.org/10.1007/978-3-319-24318-4_23), section 4.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Tier {
    Irred = 0,
    Core = 1,
    Mid = 2,
    Local = 3,
}

impl Tier {
    /// Total number of tiers.
    pub const fn count() -> usize {
        4
    }

    /// Cast an index into the corresponding tier.
    pub unsafe fn from_index(index: usize) -> Tier {
        debug_assert!(index < Tier::count());
        transmute(index as u8)
    }
}

/// Database for long clauses.
///
/// Removal of clauses from the `clauses` and the `by_tier` fields can be delayed. The clause
/// header's freed and tier fields need to be checked when iterating over these. `by_tier` may
/// also contain duplicate entries.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain freed clauses, see above
    pub(crate) clauses: Vec<ClauseRef>,
    /// May contain freed and moved clauses, see above
    pub(crate) by_tier: [Vec<ClauseRef>; Tier::count()],
    /// These counts should always be up to date
    pub(crate) count_by_tier: [usize; Tier::count()],
}

impl ClauseDb {
    /// The number of long clauses of a given tier.
    pub fn count_by_tier(&self, tier: Tier) -> usize {
        self.count_by_tier[tier as usize]
    }
}

/// Add a long clause to the database.
///
/// This only allocates and registers the clause, attaching it to the watchlists is up to the
/// caller.
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let tier = header.tier();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    let db = ctx.part_mut(ClauseDbP);

    db.clauses.push(cref);
    db.by_tier[tier as usize].push(cref);
    db.count_by_tier[tier as usize] += 1;

    cref
}

/// Change the tier of a long clause.
///
/// This is a noop for a clause already of the specified tier.
pub fn set_clause_tier(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    cref: ClauseRef,
    tier: Tier,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let old_tier = alloc.header(cref).tier();
    if old_tier != tier {
        db.count_by_tier[old_tier as usize] -= 1;
        db.count_by_tier[tier as usize] += 1;

        alloc.header_mut(cref).set_tier(tier);
        db.by_tier[tier as usize].push(cref);
    }
}

/// Delete a long clause from the database.
///
/// The watchlists are not touched; long watches must be detached or unlinked by the caller
/// beforehand.
pub fn delete_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    cref: ClauseRef,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let tier = alloc.header(cref).tier();

    debug_assert!(
        !alloc.header(cref).freed(),
        "delete_clause for already freed clause"
    );

    alloc.free_clause(cref);

    db.count_by_tier[tier as usize] -= 1;
}

/// Delete a long clause unless it is the reason for a current assignment.
///
/// Returns true if the clause was deleted.
pub fn try_delete_clause(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        AssignmentP,
        ImplGraphP
    ),
    cref: ClauseRef,
) -> bool {
    let propagating = {
        let lits = ctx.part(ClauseAllocP).clause(cref).lits();
        let asserted = lits[0];
        ctx.part(AssignmentP).lit_is_true(asserted)
            && ctx.part(ImplGraphP).reason(asserted.var()) == &Reason::Long(cref)
    };

    if !propagating {
        delete_clause(ctx.borrow(), cref);
    }

    !propagating
}

/// Invoke a callback for each live long clause, deleting clauses for which it returns false.
///
/// The callback may shrink the clause it is called for in place. Long watches must be detached
/// while this runs.
pub fn filter_clauses(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    mut filter: impl FnMut(&mut super::ClauseAlloc, ClauseRef) -> bool,
) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let alloc = ctx.part_mut(ClauseAllocP);

    let mut count_by_tier = db.count_by_tier;

    db.clauses.retain(|&cref| {
        if alloc.header(cref).freed() {
            false
        } else if filter(alloc, cref) {
            true
        } else {
            let tier = alloc.header(cref).tier();
            alloc.free_clause(cref);
            count_by_tier[tier as usize] -= 1;
            false
        }
    });

    db.count_by_tier = count_by_tier;
}

/// Iterator over all live long clauses.
pub fn live_clauses(
    db: &ClauseDb,
    alloc: &super::ClauseAlloc,
) -> Vec<ClauseRef> {
    db.clauses
        .iter()
        .cloned()
        .filter(|&cref| !alloc.header(cref).freed())
        .collect()
}

/// Remove freed and duplicate entries from the clause lists.
pub fn collect_db_lists(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP)) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let alloc = ctx.part_mut(ClauseAllocP);

    db.clauses.retain(|&cref| !alloc.header(cref).freed());

    for tier_index in 0..Tier::count() {
        let tier = unsafe { Tier::from_index(tier_index) };
        db.by_tier[tier_index].retain(|&cref| {
            let header = alloc.header(cref);
            let retain = !header.freed() && header.tier() == tier && !header.mark();
            if retain {
                alloc.header_mut(cref).set_mark(true);
            }
            retain
        });
        for &cref in db.by_tier[tier_index].iter() {
            alloc.header_mut(cref).set_mark(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use occsat_formula::cnf_formula;

    #[test]
    fn set_tiers_and_deletes() {
        let mut ctx = Context::default();

        let mut ctx = ctx.into_partial_ref_mut();

        let clauses = cnf_formula![
            1, 2, 3, 9;
            4, -5, 6, 8;
            -2, 3, -4, 5;
            -3, 5, 2, 7, 5;
        ];

        let tiers = vec![Tier::Irred, Tier::Core, Tier::Mid, Tier::Local];
        let new_tiers = vec![Tier::Irred, Tier::Local, Tier::Local, Tier::Core];

        let mut crefs = vec![];

        for (clause, &tier) in clauses.iter().zip(tiers.iter()) {
            let mut header = ClauseHeader::new();
            header.set_tier(tier);
            let cref = add_clause(ctx.borrow(), header, clause);
            crefs.push(cref);
        }

        for (&cref, &tier) in crefs.iter().rev().zip(new_tiers.iter().rev()) {
            set_clause_tier(ctx.borrow(), cref, tier);
        }

        // We only check presence, as deletion from these lists is delayed
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Irred as usize].contains(&crefs[0]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Core as usize].contains(&crefs[3]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Local as usize].contains(&crefs[1]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Local as usize].contains(&crefs[2]));

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 2);

        delete_clause(ctx.borrow(), crefs[0]);
        delete_clause(ctx.borrow(), crefs[2]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 1);

        collect_db_lists(ctx.borrow());
        assert_eq!(ctx.part(ClauseDbP).clauses.len(), 2);
    }

    #[test]
    fn filtering_frees_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let clauses = cnf_formula![
            1, 2, 3, 4;
            2, 3, 4, 5;
            3, 4, 5, 6;
        ];

        for clause in clauses.iter() {
            add_clause(ctx.borrow(), ClauseHeader::new(), clause);
        }

        let keep = occsat_formula::lits![2, 3, 4, 5];

        filter_clauses(ctx.borrow(), |alloc, cref| {
            alloc.clause(cref).lits() == &keep[..]
        });

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        assert_eq!(ctx.part(ClauseDbP).clauses.len(), 1);
    }
}
