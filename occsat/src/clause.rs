//! Clause storage.
use std::slice;

use occsat_formula::{Lit, Var};

pub mod activity;
pub mod alloc;
pub mod assess;
pub mod consolidate;
pub mod db;
pub mod header;
pub mod reduce;

pub use activity::{bump_clause_activity, decay_clause_activities, ClauseActivity};
pub use alloc::{ClauseAlloc, ClauseRef};
pub use assess::assess_learned_clause;
pub use db::{ClauseDb, Tier};
pub use header::ClauseHeader;

use header::HEADER_LEN;
use occsat_formula::lit::LitIdx;

/// Compute the subsumption abstraction of a set of literals.
///
/// The abstraction has bit `var mod 32` set for every literal. If clause A subsumes clause B then
/// `abstraction(A) & !abstraction(B) == 0`. The converse does not hold, so the abstraction can
/// only be used as a prefilter.
pub fn clause_abstraction(lits: &[Lit]) -> u32 {
    let mut abstraction = 0;
    for &lit in lits {
        abstraction |= 1 << (lit.index() % 32);
    }
    abstraction
}

/// A clause.
///
/// This is stored in a [`ClauseAlloc`] and thus must have a representation compatible with a slice
/// of [`LitIdx`] values.
///
/// It would be nicer to use a DST struct with two members and `repr(C)`, but while that can be
/// declared in stable rust, it's almost impossible to work with.
#[repr(transparent)]
pub struct Clause {
    data: [LitIdx],
}

impl Clause {
    /// The clause's header
    pub fn header(&self) -> &ClauseHeader {
        unsafe {
            let header_ptr = self.data.as_ptr() as *const ClauseHeader;
            &*header_ptr
        }
    }

    /// Mutable reference to the clause's header
    pub fn header_mut(&mut self) -> &mut ClauseHeader {
        unsafe {
            let header_ptr = self.data.as_mut_ptr() as *mut ClauseHeader;
            &mut *header_ptr
        }
    }

    /// The clause's literals
    pub fn lits(&self) -> &[Lit] {
        unsafe {
            let lit_ptr = self.data.as_ptr().add(HEADER_LEN) as *const Lit;
            slice::from_raw_parts(lit_ptr, self.data.len() - HEADER_LEN)
        }
    }

    /// Mutable slice of the clause's literals
    pub fn lits_mut(&mut self) -> &mut [Lit] {
        unsafe {
            let lit_ptr = self.data.as_mut_ptr().add(HEADER_LEN) as *mut Lit;
            slice::from_raw_parts_mut(lit_ptr, self.data.len() - HEADER_LEN)
        }
    }

    /// Remove a literal, keeping the remaining literals in order.
    ///
    /// The header length and abstraction are updated. The slot keeps its original size in the
    /// arena, the freed words are reclaimed by the next consolidation.
    pub fn strengthen(&mut self, remove: Lit) {
        let position = self
            .lits()
            .iter()
            .position(|&lit| lit == remove)
            .expect("strengthened literal not in clause");

        let len = self.lits().len();
        self.lits_mut().copy_within(position + 1..len, position);
        self.header_mut().set_len(len - 1);

        let abstraction = clause_abstraction(self.lits());
        self.header_mut().set_abstraction(abstraction);
        self.header_mut().set_strengthened(true);
    }
}

/// Assert that all literals of a clause are in bounds for the given variable count.
pub fn check_clause_bounds(lits: &[Lit], var_count: usize) -> bool {
    debug_assert!(var_count <= Var::max_count());
    lits.iter().all(|lit| lit.index() < var_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    use occsat_formula::lit;

    #[test]
    fn abstraction_is_a_subset_filter() {
        let sub = [lit!(1), lit!(3)];
        let sup = [lit!(1), lit!(2), lit!(3), lit!(70)];

        let abst_sub = clause_abstraction(&sub);
        let abst_sup = clause_abstraction(&sup);

        assert_eq!(abst_sub & !abst_sup, 0);

        // var 70 aliases var 6 mod 32, a false positive is fine, a false negative is not
        let other = [lit!(1), lit!(4)];
        assert_ne!(clause_abstraction(&other) & !abst_sub, 0);
    }
}
