//! Shared scratch bitsets with touched-list clearing.
//!
//! Several simplifier routines need a bit per literal or per variable that is set for the
//! duration of one operation. Instead of zeroing the whole bitset afterwards, every index that was
//! set is remembered in a touched list and only those entries are cleared.
use occsat_formula::{Lit, Var};

/// A bit per literal plus the list of literals whose bit is set.
#[derive(Default)]
pub struct LitTags {
    tags: Vec<bool>,
    touched: Vec<Lit>,
}

impl LitTags {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.tags.resize(count * 2, false);
    }

    pub fn is_set(&self, lit: Lit) -> bool {
        self.tags[lit.code()]
    }

    /// Set the bit for a literal, remembering it for [`clear`](LitTags::clear).
    pub fn set(&mut self, lit: Lit) {
        if !self.tags[lit.code()] {
            self.tags[lit.code()] = true;
            self.touched.push(lit);
        }
    }

    /// Clear exactly the bits that were set since the last clear.
    pub fn clear(&mut self) {
        for lit in self.touched.drain(..) {
            self.tags[lit.code()] = false;
        }
    }

    /// Number of set bits.
    pub fn len(&self) -> usize {
        self.touched.len()
    }
}

/// A bit per variable plus the list of variables whose bit is set.
#[derive(Default)]
pub struct VarTags {
    tags: Vec<bool>,
    touched: Vec<Var>,
}

impl VarTags {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.tags.resize(count, false);
    }

    pub fn is_set(&self, var: Var) -> bool {
        self.tags[var.index()]
    }

    pub fn set(&mut self, var: Var) {
        if !self.tags[var.index()] {
            self.tags[var.index()] = true;
            self.touched.push(var);
        }
    }

    pub fn touched(&self) -> &[Var] {
        &self.touched
    }

    pub fn clear(&mut self) {
        for var in self.touched.drain(..) {
            self.tags[var.index()] = false;
        }
    }
}

/// Scratch bitsets shared by the simplifier routines.
///
/// Every routine that sets bits clears them again before returning, so consecutive users never
/// observe stale bits.
#[derive(Default)]
pub struct Scratch {
    pub seen: LitTags,
    pub seen2: LitTags,
    pub touched_vars: VarTags,
}

impl Scratch {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.seen.set_var_count(count);
        self.seen2.set_var_count(count);
        self.touched_vars.set_var_count(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_restores_all_bits() {
        let mut tags = LitTags::default();
        tags.set_var_count(4);

        let a = Lit::from_dimacs(1);
        let b = Lit::from_dimacs(-3);

        tags.set(a);
        tags.set(b);
        tags.set(a);

        assert!(tags.is_set(a));
        assert!(tags.is_set(b));
        assert!(!tags.is_set(!a));
        assert_eq!(tags.len(), 2);

        tags.clear();

        assert!(!tags.is_set(a));
        assert!(!tags.is_set(b));
        assert_eq!(tags.len(), 0);
    }
}
