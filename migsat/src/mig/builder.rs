use super::incremental::{BuildOptions, IncrementalMigBuilder};
use super::ModalImplicationGraph;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::job::{get_result, LongRunningMethod, Monitor};
use migsat_cnf::Cnf;
use std::time::Duration;

/// Builds the modal implication graph of a formula from scratch.
///
/// This is an incremental build whose predecessor is the empty graph over the same variables,
/// so every clause counts as added and every literal pair is probed for implicit strong edges.
#[derive(Debug)]
pub struct MigBuilder {
    cnf: Option<Cnf>,
    options: BuildOptions,
    timeouts: usize,
}

impl MigBuilder {
    pub fn new(cnf: Cnf) -> Self {
        Self {
            cnf: Some(cnf),
            options: BuildOptions::default(),
            timeouts: 0,
        }
    }

    pub fn with_config(mut self, config: &AnalysisConfig) -> Self {
        self.options = BuildOptions::from(config);
        self
    }

    /// Whether long clauses entailed by the others are kept out of the graph.
    pub fn check_redundancy(mut self, check_redundancy: bool) -> Self {
        self.options.check_redundancy = check_redundancy;
        self
    }

    /// Whether entailed binary clauses that are not part of the formula become strong edges.
    pub fn detect_strong(mut self, detect_strong: bool) -> Self {
        self.options.detect_strong = detect_strong;
        self
    }

    pub fn with_solver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.solver_timeout = timeout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    pub fn timeouts(&self) -> usize {
        self.timeouts
    }
}

impl LongRunningMethod for MigBuilder {
    type Output = ModalImplicationGraph;
    type Partial = ();

    fn execute(&mut self, monitor: &Monitor<()>) -> Result<ModalImplicationGraph, AnalysisError> {
        let cnf = self.cnf.take().ok_or(AnalysisError::AlreadyExecuted)?;
        let empty = ModalImplicationGraph::empty(cnf.variables().clone());

        let mut builder = IncrementalMigBuilder::new(empty, cnf).with_options(self.options.clone());
        let result = builder.execute(monitor);
        self.timeouts = builder.timeouts();
        result
    }
}

/// Builds the graph of `cnf` with the default options. `None` on timeout, cancellation or failure.
pub fn build_mig(
    cnf: &Cnf,
    monitor: &Monitor<()>,
    timeout: Option<Duration>,
) -> Option<ModalImplicationGraph> {
    get_result(MigBuilder::new(cnf.clone()), monitor, timeout)
}
