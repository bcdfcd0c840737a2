use crate::anomalies::ConstraintAnalysisKind;
use migsat_cnf::{LiteralSet, Variable};
use std::collections::HashMap;

/// Identifies one state of a formula. Every edit of a formula has to produce a new version.
pub type FormulaVersion = u64;

/// Finished analysis results of one formula version.
///
/// The cache is owned by the caller and handed to every [FormulaAnalyzer](super::FormulaAnalyzer)
/// call. As soon as it is used with a formula of another version, all stored results are dropped.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    version: Option<FormulaVersion>,
    pub(super) valid: Option<bool>,
    pub(super) core_dead: Option<LiteralSet>,
    pub(super) atomic_sets: Option<Vec<LiteralSet>>,
    pub(super) false_optional: Option<Vec<Variable>>,
    pub(super) constraints: HashMap<ConstraintAnalysisKind, Vec<usize>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The formula version the stored results belong to.
    pub fn version(&self) -> Option<FormulaVersion> {
        self.version
    }

    /// Drops every stored result.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_none()
            && self.core_dead.is_none()
            && self.atomic_sets.is_none()
            && self.false_optional.is_none()
            && self.constraints.is_empty()
    }

    /// Makes the cache belong to `version`, dropping the results of any other version.
    pub(super) fn validate(&mut self, version: FormulaVersion) {
        if self.version != Some(version) {
            *self = Self {
                version: Some(version),
                ..Self::default()
            };
        }
    }
}
