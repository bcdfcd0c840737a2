use crate::job::{StoppableExecutor, DEFAULT_CANCELING_TIME};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs shared by all analyses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bound of every single solver call in milliseconds. Zero or absent means unbounded.
    pub solver_timeout_ms: Option<u64>,
    /// How long a cancelled worker may take to stop before it is detached.
    pub canceling_time_ms: u64,
    /// Seed of the solver shuffles.
    pub seed: u64,
    /// Whether the MIG builders test added clauses for redundancy.
    pub check_redundancy: bool,
    /// Whether the MIG builders search for implicit strong edges.
    pub detect_strong: bool,
    /// Number of sample models used to pre-filter atomic set candidates.
    pub sample_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            solver_timeout_ms: None,
            canceling_time_ms: DEFAULT_CANCELING_TIME.as_millis() as u64,
            seed: 112358,
            check_redundancy: true,
            detect_strong: true,
            sample_size: 64,
        }
    }
}

impl AnalysisConfig {
    pub fn solver_timeout(&self) -> Option<Duration> {
        self.solver_timeout_ms
            .filter(|&millis| millis > 0)
            .map(Duration::from_millis)
    }

    pub fn canceling_time(&self) -> Duration {
        Duration::from_millis(self.canceling_time_ms)
    }

    /// An executor bounded by `timeout` with the configured canceling time.
    pub fn executor(&self, name: &str, timeout: Option<Duration>) -> StoppableExecutor {
        StoppableExecutor::new(name)
            .with_timeout(timeout)
            .with_canceling_time(self.canceling_time())
    }
}
