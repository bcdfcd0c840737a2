//! Analyses that find anomalies of a feature-model formula: void models, core and dead features,
//! atomic sets, false-optional features and anomalous constraints.

pub mod atomic_sets;
pub mod constraints;
pub mod core;
pub mod false_optional;
pub mod sat;

pub use self::core::{core_dead_analysis, CoreDeadAnalysis};
pub use atomic_sets::AtomicSetAnalysis;
pub use constraints::{ConstraintAnalysis, ConstraintAnalysisKind};
pub use false_optional::FalseOptionalAnalysis;
pub use sat::HasSolutionAnalysis;

use crate::error::SolverError;
use crate::job::Monitor;
use crate::solver::SatSolver;
use migsat_cnf::Cnf;
use std::time::Duration;

/// A solver over `cnf` observing the monitor and bounded per call by `timeout`.
/// `None` if the clauses are already contradictory.
pub(crate) fn solver<T>(
    cnf: &Cnf,
    monitor: &Monitor<T>,
    timeout: Option<Duration>,
) -> Result<Option<SatSolver>, SolverError> {
    match SatSolver::new(cnf) {
        Ok(mut solver) => {
            solver.set_interrupt(monitor.interrupt());
            solver.set_timeout(timeout);
            Ok(Some(solver))
        }
        Err(SolverError::Contradiction) => Ok(None),
        Err(err) => Err(err),
    }
}
