//! Timeout-bounded access to all analyses of a feature-model formula, backed by a caller-owned cache.

pub mod cache;

pub use cache::{AnalysisCache, FormulaVersion};

use crate::anomalies::{
    AtomicSetAnalysis, ConstraintAnalysis, ConstraintAnalysisKind, CoreDeadAnalysis,
    FalseOptionalAnalysis, HasSolutionAnalysis,
};
use crate::config::AnalysisConfig;
use crate::job::{run_with, Monitor};
use log::debug;
use migsat_cnf::{Cnf, CnfError, Literal, LiteralSet, Variable, Variables};
use std::io::Write;
use std::time::{Duration, Instant};

/// A named cross-tree constraint in conjunctive normal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub name: String,
    pub cnf: Cnf,
}

impl Constraint {
    pub fn new(name: impl Into<String>, cnf: Cnf) -> Self {
        Self {
            name: name.into(),
            cnf,
        }
    }
}

/// The formula of one feature-model version: the tree, its cross-tree constraints and
/// the optional features with their parents.
///
/// All parts are adapted to one common variable universe.
#[derive(Debug, Clone)]
pub struct FeatureModelFormula {
    version: FormulaVersion,
    tree: Cnf,
    constraints: Vec<Constraint>,
    optional: Vec<(Variable, Variable)>,
    cnf: Cnf,
}

impl FeatureModelFormula {
    pub fn new(
        version: FormulaVersion,
        tree: Cnf,
        constraints: Vec<Constraint>,
    ) -> Result<Self, CnfError> {
        let universe = constraints
            .iter()
            .fold(tree.variables().clone(), |universe, constraint| {
                universe.merge(constraint.cnf.variables())
            });

        let tree = tree.adapt(&universe)?;
        let constraints = constraints
            .into_iter()
            .map(|constraint| {
                Ok(Constraint {
                    cnf: constraint.cnf.adapt(&universe)?,
                    name: constraint.name,
                })
            })
            .collect::<Result<Vec<_>, CnfError>>()?;

        let mut cnf = tree.clone();
        for constraint in &constraints {
            cnf.extend(&constraint.cnf)?;
        }

        Ok(Self {
            version,
            tree,
            constraints,
            optional: Vec::new(),
            cnf,
        })
    }

    /// Declares optional features by name, each paired with the name of its parent.
    pub fn with_optional_features<S: AsRef<str>>(
        mut self,
        optional: &[(S, S)],
    ) -> Result<Self, CnfError> {
        let variables = self.cnf.variables();
        let resolve = |name: &str| {
            variables
                .variable(name)
                .ok_or_else(|| CnfError::UnknownVariable {
                    name: name.to_string(),
                })
        };

        self.optional = optional
            .iter()
            .map(|(child, parent)| Ok((resolve(child.as_ref())?, resolve(parent.as_ref())?)))
            .collect::<Result<_, CnfError>>()?;
        Ok(self)
    }

    pub fn version(&self) -> FormulaVersion {
        self.version
    }

    pub fn variables(&self) -> &Variables {
        self.cnf.variables()
    }

    pub fn tree(&self) -> &Cnf {
        &self.tree
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn optional_features(&self) -> &[(Variable, Variable)] {
        &self.optional
    }

    /// The tree conjoined with all constraints.
    pub fn cnf(&self) -> &Cnf {
        &self.cnf
    }
}

/// Runs the analyses of one formula. Every call returns `None` on timeout, cancellation
/// or failure, and finished results are stored in the given [AnalysisCache].
#[derive(Debug, Clone)]
pub struct FormulaAnalyzer {
    formula: FeatureModelFormula,
    config: AnalysisConfig,
}

impl FormulaAnalyzer {
    pub fn new(formula: FeatureModelFormula) -> Self {
        Self {
            formula,
            config: AnalysisConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn formula(&self) -> &FeatureModelFormula {
        &self.formula
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Core variables as positive, dead variables as negative literals.
    pub fn core_dead_analysis(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<Literal>,
        timeout: Option<Duration>,
    ) -> Option<LiteralSet> {
        cache.validate(self.formula.version);
        if let Some(core_dead) = &cache.core_dead {
            return Some(core_dead.clone());
        }

        let analysis = CoreDeadAnalysis::new(self.formula.cnf.clone())
            .with_solver_timeout(self.config.solver_timeout())
            .with_seed(self.config.seed);
        let core_dead = run_with(
            analysis,
            monitor,
            &self.config.executor("core-dead", timeout),
        )?;

        cache.core_dead = Some(core_dead.clone());
        Some(core_dead)
    }

    /// Whether the formula has a model at all.
    pub fn is_valid(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<()>,
        timeout: Option<Duration>,
    ) -> Option<bool> {
        cache.validate(self.formula.version);
        if let Some(valid) = cache.valid {
            return Some(valid);
        }

        let analysis = HasSolutionAnalysis::new(self.formula.cnf.clone())
            .with_solver_timeout(self.config.solver_timeout());
        let valid = run_with(analysis, monitor, &self.config.executor("valid", timeout))?;

        cache.valid = Some(valid);
        Some(valid)
    }

    pub fn get_core_features(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<Literal>,
        timeout: Option<Duration>,
    ) -> Option<Vec<Variable>> {
        let core_dead = self.core_dead_analysis(cache, monitor, timeout)?;
        Some(
            core_dead
                .iter()
                .filter(|&literal| literal > 0)
                .map(Literal::unsigned_abs)
                .collect(),
        )
    }

    pub fn get_dead_features(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<Literal>,
        timeout: Option<Duration>,
    ) -> Option<Vec<Variable>> {
        let core_dead = self.core_dead_analysis(cache, monitor, timeout)?;
        Some(
            core_dead
                .iter()
                .filter(|&literal| literal < 0)
                .map(Literal::unsigned_abs)
                .collect(),
        )
    }

    /// Variables that are neither core nor dead.
    pub fn get_common_features(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<Literal>,
        timeout: Option<Duration>,
    ) -> Option<Vec<Variable>> {
        let core_dead = self.core_dead_analysis(cache, monitor, timeout)?;
        Some(
            (1..=self.formula.cnf.num_variables())
                .filter(|&variable| !core_dead.contains_variable(variable))
                .collect(),
        )
    }

    /// See [AtomicSetAnalysis]: the first set holds the core and dead literals.
    pub fn get_atomic_sets(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<()>,
        timeout: Option<Duration>,
    ) -> Option<Vec<LiteralSet>> {
        cache.validate(self.formula.version);
        if let Some(atomic_sets) = &cache.atomic_sets {
            return Some(atomic_sets.clone());
        }

        let analysis = AtomicSetAnalysis::new(self.formula.cnf.clone())
            .with_solver_timeout(self.config.solver_timeout())
            .with_seed(self.config.seed)
            .with_sample_size(self.config.sample_size);
        let atomic_sets = run_with(
            analysis,
            monitor,
            &self.config.executor("atomic-sets", timeout),
        )?;

        cache.atomic_sets = Some(atomic_sets.clone());
        Some(atomic_sets)
    }

    pub fn get_false_optional_features(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<Variable>,
        timeout: Option<Duration>,
    ) -> Option<Vec<Variable>> {
        cache.validate(self.formula.version);
        if let Some(false_optional) = &cache.false_optional {
            return Some(false_optional.clone());
        }

        let analysis =
            FalseOptionalAnalysis::new(self.formula.cnf.clone(), self.formula.optional.clone())
                .with_solver_timeout(self.config.solver_timeout());
        let false_optional = run_with(
            analysis,
            monitor,
            &self.config.executor("false-optional", timeout),
        )?;

        cache.false_optional = Some(false_optional.clone());
        Some(false_optional)
    }

    /// Indices of the constraints that make the formula void.
    pub fn get_void_constraints(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<usize>,
        timeout: Option<Duration>,
    ) -> Option<Vec<usize>> {
        self.constraint_analysis(cache, ConstraintAnalysisKind::Void, None, monitor, timeout)
    }

    /// Indices of the constraints entailed by the tree and all other constraints.
    pub fn get_redundant_constraints(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<usize>,
        timeout: Option<Duration>,
    ) -> Option<Vec<usize>> {
        self.constraint_analysis(
            cache,
            ConstraintAnalysisKind::Redundant,
            None,
            monitor,
            timeout,
        )
    }

    /// Indices of the void constraints that have no model on their own.
    pub fn get_contradictory_constraints(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<usize>,
        timeout: Option<Duration>,
    ) -> Option<Vec<usize>> {
        let start = Instant::now();
        let void = self.get_void_constraints(cache, &monitor.sub_task(1), timeout)?;
        self.constraint_analysis(
            cache,
            ConstraintAnalysisKind::Contradiction,
            Some(void),
            monitor,
            remaining(timeout, start)?,
        )
    }

    /// Indices of the redundant constraints that are always satisfied.
    pub fn get_tautology_constraints(
        &self,
        cache: &mut AnalysisCache,
        monitor: &Monitor<usize>,
        timeout: Option<Duration>,
    ) -> Option<Vec<usize>> {
        let start = Instant::now();
        let redundant = self.get_redundant_constraints(cache, &monitor.sub_task(1), timeout)?;
        self.constraint_analysis(
            cache,
            ConstraintAnalysisKind::Tautology,
            Some(redundant),
            monitor,
            remaining(timeout, start)?,
        )
    }

    fn constraint_analysis(
        &self,
        cache: &mut AnalysisCache,
        kind: ConstraintAnalysisKind,
        candidates: Option<Vec<usize>>,
        monitor: &Monitor<usize>,
        timeout: Option<Duration>,
    ) -> Option<Vec<usize>> {
        cache.validate(self.formula.version);
        if let Some(indices) = cache.constraints.get(&kind) {
            return Some(indices.clone());
        }

        let constraints = self
            .formula
            .constraints
            .iter()
            .map(|constraint| constraint.cnf.clone())
            .collect();
        let mut analysis = ConstraintAnalysis::new(self.formula.tree.clone(), constraints, kind)
            .with_solver_timeout(self.config.solver_timeout());
        if let Some(candidates) = candidates {
            analysis = analysis.with_candidates(candidates);
        }

        let indices = run_with(
            analysis,
            monitor,
            &self.config.executor("constraints", timeout),
        )?;

        debug!("{kind:?} constraints: {indices:?}");
        cache.constraints.insert(kind, indices.clone());
        Some(indices)
    }

    /// Writes a report of all anomalies, one line per analysis. Analyses that did not finish
    /// within `timeout` are reported as unknown.
    pub fn write_anomalies(
        &self,
        cache: &mut AnalysisCache,
        mut output: impl Write,
        timeout: Option<Duration>,
    ) -> std::io::Result<()> {
        let variables = self.formula.variables();
        let names = |features: Vec<Variable>| {
            features
                .into_iter()
                .filter_map(|variable| variables.name(variable))
                .collect::<Vec<_>>()
        };
        let constraint_names = |indices: Vec<usize>| {
            indices
                .into_iter()
                .map(|index| self.formula.constraints[index].name.as_str())
                .collect::<Vec<_>>()
        };

        writeln!(
            output,
            "valid: {}",
            format_result(self.is_valid(cache, &Monitor::new(), timeout))
        )?;

        // core/dead features
        let core = self
            .get_core_features(cache, &Monitor::new(), timeout)
            .map(names);
        writeln!(output, "core: {}", format_result(core))?;
        let dead = self
            .get_dead_features(cache, &Monitor::new(), timeout)
            .map(names);
        writeln!(output, "dead: {}", format_result(dead))?;

        // false-optionals
        let false_optional = self
            .get_false_optional_features(cache, &Monitor::new(), timeout)
            .map(names);
        writeln!(output, "false-optional: {}", format_result(false_optional))?;

        // atomic sets
        let atomic_sets = self
            .get_atomic_sets(cache, &Monitor::new(), timeout)
            .map(|sets| {
                sets.iter()
                    .skip(1)
                    .map(|set| variables.to_names(set))
                    .collect::<Vec<_>>()
            });
        writeln!(output, "atomic sets: {}", format_result(atomic_sets))?;

        // constraints
        let monitor = Monitor::new();
        let void = self
            .get_void_constraints(cache, &monitor, timeout)
            .map(constraint_names);
        writeln!(output, "void constraints: {}", format_result(void))?;
        let contradictory = self
            .get_contradictory_constraints(cache, &monitor, timeout)
            .map(constraint_names);
        writeln!(
            output,
            "contradictory constraints: {}",
            format_result(contradictory)
        )?;
        let redundant = self
            .get_redundant_constraints(cache, &monitor, timeout)
            .map(constraint_names);
        writeln!(output, "redundant constraints: {}", format_result(redundant))?;
        let tautology = self
            .get_tautology_constraints(cache, &monitor, timeout)
            .map(constraint_names);
        writeln!(output, "tautology constraints: {}", format_result(tautology))?;

        Ok(())
    }
}

fn format_result<T: std::fmt::Debug>(result: Option<T>) -> String {
    match result {
        Some(result) => format!("{result:?}"),
        None => String::from("unknown"),
    }
}

/// What is left of `timeout` since `start`, `None` once it has run out.
fn remaining(timeout: Option<Duration>, start: Instant) -> Option<Option<Duration>> {
    match timeout {
        None => Some(None),
        Some(timeout) => timeout
            .checked_sub(start.elapsed())
            .filter(|left| !left.is_zero())
            .map(Some),
    }
}
