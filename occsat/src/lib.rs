//! Occsat is a CDCL based SAT solver with extensive in-processing simplification.
//!
//! The solver combines a conflict driven clause learning search loop with an occurrence-list
//! based simplifier that performs backward subsumption, self-subsuming resolution, OR-gate based
//! rewriting, blocked clause elimination and bounded variable elimination between restarts.

pub mod config;
pub mod solver;

mod analyze_conflict;
mod cdcl;
mod clause;
mod context;
mod decision;
mod glue;
mod load;
mod model;
mod proc;
mod prop;
mod schedule;
mod scratch;
mod simplify;
mod state;
mod tmp;
mod variables;

#[cfg(test)]
mod test;

pub use occsat_formula::{cnf, lit, CnfFormula, ExtendFormula, Lit, Var};

pub use solver::{Solver, SolverError};

pub use occsat_dimacs as dimacs;
