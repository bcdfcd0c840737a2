//! The execution harness every analysis runs under.

pub mod executor;
pub mod monitor;

pub use executor::{InlineExecutor, StoppableExecutor, DEFAULT_CANCELING_TIME};
pub use monitor::{CancelToken, Interrupt, Monitor};

use crate::error::{AnalysisError, SolverError};
use log::{debug, error, info};
use std::time::Duration;

/// A computation that may take long and therefore has to observe its [Monitor].
pub trait LongRunningMethod: Send {
    type Output: Send + 'static;
    /// The facts streamed through [Monitor::report_partial] while running.
    type Partial: Send + 'static;

    fn execute(&mut self, monitor: &Monitor<Self::Partial>) -> Result<Self::Output, AnalysisError>;
}

/// Runs `method` and swallows every failure.
///
/// Without a timeout the method runs inline, otherwise on a [StoppableExecutor].
/// `None` means timeout, cancellation or an internal error, which callers treat alike.
pub fn get_result<M>(
    method: M,
    monitor: &Monitor<M::Partial>,
    timeout: Option<Duration>,
) -> Option<M::Output>
where
    M: LongRunningMethod + 'static,
{
    run_with(
        method,
        monitor,
        &StoppableExecutor::default().with_timeout(timeout),
    )
}

/// Like [get_result] with an explicitly configured executor.
pub(crate) fn run_with<M>(
    mut method: M,
    monitor: &Monitor<M::Partial>,
    executor: &StoppableExecutor,
) -> Option<M::Output>
where
    M: LongRunningMethod + 'static,
{
    let result = if executor.has_timeout() {
        executor.run(method, monitor)
    } else {
        InlineExecutor.run(&mut method, monitor)
    };

    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log_failure(&err);
            None
        }
    }
}

fn log_failure(err: &AnalysisError) {
    match err {
        AnalysisError::Cancelled => debug!("analysis cancelled"),
        AnalysisError::Timeout => info!("analysis timed out"),
        AnalysisError::Solver(SolverError::Contradiction) => {
            debug!("analysis stopped on a contradictory formula")
        }
        err => error!("analysis failed: {err}"),
    }
}
