//! Miscellaneous solver state.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Satisfiability state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub sat_state: SatState,
    /// Number of top-level assignments already used to scrub the clause database.
    pub units_simplified: usize,
    /// Complete model over the outer variables, present after a satisfiable solve.
    pub full_model: Option<Vec<bool>>,
    /// Polled between major phases, set by [`Solver::interrupt_handle`](crate::solver::Solver).
    pub interrupt: Arc<AtomicBool>,
}

impl SolverState {
    /// Whether unsatisfiability was proven at the top level.
    ///
    /// This is the inverse of the solver's sticky `ok` flag. Once it turns true every further
    /// solve returns unsat.
    pub fn is_unsat(&self) -> bool {
        self.sat_state == SatState::Unsat
    }
}
