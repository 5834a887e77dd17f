//! Variable mapping and metadata.
use occsat_formula::{Lit, Var};

pub mod data;
pub mod var_map;

pub use data::{Removed, VarData};
pub use var_map::{VarBiMap, VarMap};

/// Variable mapping and metadata.
///
/// The solver works on a contiguous range of *inner* variables while the user facing API and the
/// blocked clause log use *outer* variables. The two are related by a bidirectional renaming
/// table. The mapping starts as the identity and stays the identity unless an external variable
/// compactor rewrites it; everything that stores outer literals goes through these tables so such
/// a rewrite stays possible.
pub struct Variables {
    /// Bidirectional mapping from inner variables to outer variables.
    outer_from_inner: VarBiMap,
    /// Variable metadata, indexed by inner variable index.
    var_data: Vec<VarData>,
}

impl Default for Variables {
    fn default() -> Variables {
        Variables {
            outer_from_inner: VarBiMap::identity(),
            var_data: vec![],
        }
    }
}

impl Variables {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_data.resize(count, VarData::default());
    }

    /// Number of inner variables.
    pub fn var_count(&self) -> usize {
        self.var_data.len()
    }

    /// The inner to outer mapping.
    pub fn outer_from_inner(&self) -> &VarMap {
        self.outer_from_inner.fwd()
    }

    /// The outer to inner mapping.
    pub fn inner_from_outer(&self) -> &VarMap {
        self.outer_from_inner.bwd()
    }

    /// Map an inner literal to outer numbering.
    pub fn lit_to_outer(&self, lit: Lit) -> Lit {
        let var = self
            .outer_from_inner()
            .get(lit.var())
            .expect("inner variable without outer name");
        var.lit(lit.is_negative())
    }

    /// Map an outer literal to inner numbering.
    ///
    /// Returns `None` for outer variables not currently present in the solver.
    pub fn lit_from_outer(&self, lit: Lit) -> Option<Lit> {
        let var = self.inner_from_outer().get(lit.var())?;
        Some(var.lit(lit.is_negative()))
    }

    /// Removal status of a variable.
    pub fn removed(&self, var: Var) -> Removed {
        self.var_data[var.index()].removed
    }

    pub fn set_removed(&mut self, var: Var, removed: Removed) {
        self.var_data[var.index()].removed = removed;
    }

    /// Whether the variable may be used for decisions.
    pub fn is_decision(&self, var: Var) -> bool {
        self.var_data[var.index()].is_decision
    }

    pub fn set_decision(&mut self, var: Var, is_decision: bool) {
        self.var_data[var.index()].is_decision = is_decision;
    }

    /// Number of variables eliminated by the simplifier.
    pub fn eliminated_count(&self) -> usize {
        self.var_data
            .iter()
            .filter(|data| data.removed == Removed::Eliminated)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use occsat_formula::lit;

    #[test]
    fn mapping_is_identity_by_default() {
        let mut variables = Variables::default();
        variables.set_var_count(10);

        assert_eq!(variables.lit_to_outer(lit!(-7)), lit!(-7));
        assert_eq!(variables.lit_from_outer(lit!(3)), Some(lit!(3)));

        assert_eq!(variables.removed(lit!(3).var()), Removed::None);
        assert!(variables.is_decision(lit!(3).var()));

        variables.set_removed(lit!(3).var(), Removed::Eliminated);
        variables.set_decision(lit!(3).var(), false);

        assert_eq!(variables.removed(lit!(3).var()), Removed::Eliminated);
        assert!(!variables.is_decision(lit!(3).var()));
        assert_eq!(variables.eliminated_count(), 1);
    }
}
