use migsat_cnf::CnfError;
use std::io;
use thiserror::Error;

/// Failures of the solver wrapper.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolverError {
    /// The clauses are unsatisfiable at decision level 0 or falsified by the standing assumptions.
    #[error("the formula is contradictory")]
    Contradiction,
    #[error("internal solver failure: {0}")]
    Internal(String),
}

/// Failures while reading a DIMACS file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unable to read the input: {0}")]
    Io(#[from] io::Error),
    #[error("malformed line {line}: '{content}'")]
    Malformed { line: usize, content: String },
    #[error("missing 'p cnf' header")]
    MissingHeader,
    #[error(transparent)]
    Cnf(#[from] CnfError),
}

/// Why a long-running analysis did not produce a result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("the analysis was cancelled")]
    Cancelled,
    #[error("the analysis timed out")]
    Timeout,
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Cnf(#[from] CnfError),
    #[error("the worker thread panicked")]
    WorkerPanicked,
    #[error("unable to spawn a worker thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("the method has already been executed")]
    AlreadyExecuted,
}
