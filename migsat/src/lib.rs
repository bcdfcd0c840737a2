//#![warn(missing_docs)]
#![warn(unused_qualifications)]
//#![deny(unreachable_pub)]
#![deny(deprecated)]
#![deny(missing_copy_implementations)]
#![warn(clippy::disallowed_types)]

pub mod analyzer;
pub mod anomalies;
pub mod config;
pub mod error;
pub mod job;
pub mod mig;
pub mod parser;
pub mod solver;
pub mod util;

pub use crate::analyzer::{AnalysisCache, Constraint, FeatureModelFormula, FormulaAnalyzer};
pub use crate::anomalies::core_dead_analysis;
pub use crate::config::AnalysisConfig;
pub use crate::error::{AnalysisError, ParseError, SolverError};
pub use crate::job::{get_result, LongRunningMethod, Monitor};
pub use crate::mig::{builder::build_mig, IncrementalMigBuilder, MigBuilder, ModalImplicationGraph};
pub use crate::parser::cnf_lexer;
