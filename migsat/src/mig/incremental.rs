use super::{closure, EdgeKind, ModalImplicationGraph};
use crate::anomalies::core::core_dead;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, SolverError};
use crate::job::{LongRunningMethod, Monitor};
use crate::solver::{SatResult, SatSolver};
use crate::util::seeded_rng;
use log::{debug, info};
use migsat_cnf::{Cnf, Literal, LiteralSet, Order, Variable};
use petgraph::unionfind::UnionFind;
use rand_pcg::Pcg32;
use std::collections::HashSet;
use std::time::Duration;

/// Knobs shared by the full and the incremental builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BuildOptions {
    pub check_redundancy: bool,
    pub detect_strong: bool,
    pub solver_timeout: Option<Duration>,
    pub seed: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for BuildOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            check_redundancy: config.check_redundancy,
            detect_strong: config.detect_strong,
            solver_timeout: config.solver_timeout(),
            seed: config.seed,
        }
    }
}

/// Derives the graph of an edited formula from the graph of its predecessor.
///
/// Only clauses that differ between both cleaned formulas are inserted or removed, redundancy is
/// re-tested where the edit can flip it, and implicit strong edges are searched for in the
/// variables connected to the edit only. The result equals a from-scratch build of the new formula
/// in its strong edges and its core and dead flags.
///
/// The builder owns the predecessor and can run exactly once. A successful run retires the
/// predecessor, any other outcome leaves it untouched for [IncrementalMigBuilder::take_previous].
#[derive(Debug)]
pub struct IncrementalMigBuilder {
    previous: Option<ModalImplicationGraph>,
    cnf: Option<Cnf>,
    options: BuildOptions,
    timeouts: usize,
}

impl IncrementalMigBuilder {
    pub fn new(previous: ModalImplicationGraph, cnf: Cnf) -> Self {
        Self {
            previous: Some(previous),
            cnf: Some(cnf),
            options: BuildOptions::default(),
            timeouts: 0,
        }
    }

    pub fn with_config(mut self, config: &AnalysisConfig) -> Self {
        self.options = BuildOptions::from(config);
        self
    }

    pub fn check_redundancy(mut self, check_redundancy: bool) -> Self {
        self.options.check_redundancy = check_redundancy;
        self
    }

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

    pub(crate) fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// How many solver probes of the run were cut off by the solver timeout.
    pub fn timeouts(&self) -> usize {
        self.timeouts
    }

    /// Hands back the predecessor of a run that timed out, was cancelled or failed.
    /// `None` once a run succeeded.
    pub fn take_previous(&mut self) -> Option<ModalImplicationGraph> {
        self.previous.take()
    }
}

impl LongRunningMethod for IncrementalMigBuilder {
    type Output = ModalImplicationGraph;
    type Partial = ();

    fn execute(&mut self, monitor: &Monitor<()>) -> Result<ModalImplicationGraph, AnalysisError> {
        let previous = self
            .previous
            .as_ref()
            .ok_or(AnalysisError::AlreadyExecuted)?
            .clone();
        let cnf = self.cnf.take().ok_or(AnalysisError::AlreadyExecuted)?;
        monitor.set_remaining_work(5);

        let mut state = BuildState::new(previous, cnf, &self.options)?;
        let result = state.run(monitor);
        self.timeouts = state.timeouts;
        result?;
        self.previous = None;

        info!(
            "built implication graph: {} strong edges, {} complex clauses, {} redundant clauses, {} timeouts",
            state.mig.strong_edge_set().len(),
            state.mig.complex_clauses().count(),
            state.mig.redundant_clauses().len(),
            state.timeouts
        );
        Ok(state.mig)
    }
}

/// Everything one rebuild carries from phase to phase.
struct BuildState<'a> {
    mig: ModalImplicationGraph,
    cnf: Cnf,
    options: &'a BuildOptions,
    rng: Pcg32,
    facts: HashSet<Literal>,
    clean: HashSet<LiteralSet>,
    added: Vec<LiteralSet>,
    removed: Vec<LiteralSet>,
    changed: HashSet<Variable>,
    previous_implicit: Vec<LiteralSet>,
    timeouts: usize,
}

impl<'a> BuildState<'a> {
    fn new(
        mut mig: ModalImplicationGraph,
        cnf: Cnf,
        options: &'a BuildOptions,
    ) -> Result<Self, AnalysisError> {
        let universe = mig.variables().merge(cnf.variables());
        let cnf = cnf.adapt(&universe)?;
        mig.resize(universe);

        Ok(Self {
            mig,
            cnf,
            options,
            rng: seeded_rng(options.seed),
            facts: HashSet::new(),
            clean: HashSet::new(),
            added: Vec::new(),
            removed: Vec::new(),
            changed: HashSet::new(),
            previous_implicit: Vec::new(),
            timeouts: 0,
        })
    }

    fn run(&mut self, monitor: &Monitor<()>) -> Result<(), AnalysisError> {
        // derived edges never survive a rebuild, implicit ones are re-validated below
        self.mig.clear_transitive();
        self.previous_implicit = self.mig.take_implicit();

        if !self.find_facts(monitor)? {
            debug!("formula is void, every variable is dead");
            self.mig.set_void();
            return Ok(());
        }

        match self.build(monitor) {
            // only reachable if the facts timed out on a formula without models
            Err(AnalysisError::Solver(SolverError::Contradiction)) => {
                debug!("formula is void, every variable is dead");
                self.mig.set_void();
                Ok(())
            }
            result => result,
        }
    }

    fn build(&mut self, monitor: &Monitor<()>) -> Result<(), AnalysisError> {
        self.clean();
        self.diff();
        self.remove_clauses();
        monitor.worked(1);

        if self.options.check_redundancy {
            self.restore_redundant(monitor)?;
            self.add_clauses(monitor)?;
            self.find_redundant(monitor)?;
        } else {
            self.add_all();
        }
        monitor.worked(1);

        let detected = if self.options.detect_strong {
            self.detect_strong(monitor)?
        } else {
            false
        };
        monitor.worked(1);

        monitor.check_cancel()?;
        for edge in closure::transitive_strong_edges(&self.mig) {
            self.mig.add_strong_edge(&edge, EdgeKind::Transitive);
        }
        if self.options.detect_strong {
            monitor.check_cancel()?;
            let weak = closure::transitive_weak_edges(&self.mig);
            self.mig.set_transitive_weak_edges(weak);
        }
        monitor.worked(1);

        self.mig.set_clean_clauses(std::mem::take(&mut self.clean));
        self.mig.set_strong_detected(detected);
        Ok(())
    }

    /// Core and dead variables of the new formula, computed from scratch. `false` if it is void.
    ///
    /// If the solver timeout cuts off the first models, the build goes on without facts.
    fn find_facts(&mut self, monitor: &Monitor<()>) -> Result<bool, AnalysisError> {
        let mut solver = match SatSolver::new(&self.cnf) {
            Ok(solver) => solver,
            Err(SolverError::Contradiction) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        solver.set_interrupt(monitor.interrupt());
        solver.set_timeout(self.options.solver_timeout);

        let sub_task = monitor.sub_task::<()>(1);
        let outcome = match core_dead(&mut solver, None, &sub_task, &mut self.rng, |_| ()) {
            Ok(outcome) => outcome,
            Err(AnalysisError::Timeout) if self.options.solver_timeout.is_some() => {
                monitor.check_cancel()?;
                debug!("core and dead variables are unknown, the first models timed out");
                self.timeouts += 1;
                sub_task.done();
                return Ok(true);
            }
            Err(err) => return Err(err),
        };
        self.timeouts += outcome.timeouts;
        sub_task.done();

        match outcome.facts {
            Some(facts) => {
                self.facts = facts.iter().collect();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Simplifies every clause by the facts. Clauses that shrink to a single literal
    /// contribute that literal as a fact, which can enable further simplifications.
    fn clean(&mut self) {
        loop {
            let mut units = Vec::new();
            self.clean = self
                .cnf
                .clauses()
                .iter()
                .filter_map(|clause| {
                    let clause = clean_clause(clause, &self.facts)?;
                    if clause.len() == 1 {
                        units.extend(clause.iter());
                        None
                    } else {
                        Some(clause)
                    }
                })
                .collect();

            if units.is_empty() {
                break;
            }
            self.facts.extend(units);
        }

        let facts = LiteralSet::with_order(self.facts.iter().copied().collect(), Order::Natural);
        self.mig.set_facts(&facts);
    }

    fn diff(&mut self) {
        let previous = self.mig.clean_clauses();
        self.removed = previous.difference(&self.clean).cloned().collect();
        self.added = self.clean.difference(previous).cloned().collect();
        self.removed.sort_unstable();
        self.added.sort_unstable();

        self.changed = self
            .removed
            .iter()
            .chain(self.added.iter())
            .flat_map(|clause| clause.iter().map(Literal::unsigned_abs))
            .collect();

        debug!(
            "{} clauses added, {} removed, {} variables changed",
            self.added.len(),
            self.removed.len(),
            self.changed.len()
        );
    }

    fn remove_clauses(&mut self) {
        for clause in &self.removed {
            if !self.mig.unmark_redundant(clause) {
                self.mig.remove_clause(clause);
            }
        }
    }

    /// Clauses of the new formula that stayed and are part of the graph.
    fn kept(&self) -> Vec<LiteralSet> {
        let added: HashSet<&LiteralSet> = self.added.iter().collect();
        let mut kept: Vec<LiteralSet> = self
            .clean
            .iter()
            .filter(|clause| !added.contains(clause) && !self.mig.is_redundant(clause))
            .cloned()
            .collect();
        kept.sort_unstable();
        kept
    }

    /// Puts redundant clauses back into the graph once the removal of other clauses
    /// stopped them from being entailed.
    fn restore_redundant(&mut self, monitor: &Monitor<()>) -> Result<(), AnalysisError> {
        if self.removed.is_empty() || self.mig.redundant_clauses().is_empty() {
            return Ok(());
        }

        let mut solver = self.solver(self.kept().iter(), monitor)?;
        let mut redundant: Vec<LiteralSet> = self.mig.redundant_clauses().iter().cloned().collect();
        redundant.sort_unstable();

        let mut restored = 0;
        for clause in redundant {
            monitor.check_cancel()?;
            if !self.entails(&mut solver, &clause, monitor)? {
                self.mig.unmark_redundant(&clause);
                self.mig.add_clause(&clause);
                solver.add_clause(&clause)?;
                restored += 1;
            }
        }

        debug!("{restored} clauses are no longer redundant");
        Ok(())
    }

    /// Inserts the added clauses, shortest first, skipping those the graph already entails.
    fn add_clauses(&mut self, monitor: &Monitor<()>) -> Result<(), AnalysisError> {
        if self.added.is_empty() {
            return Ok(());
        }

        let mut solver = self.solver(self.kept().iter(), monitor)?;
        let added = std::mem::take(&mut self.added);
        let mut redundant = 0;

        for clause in &added {
            monitor.check_cancel()?;
            if clause.len() > 2 && self.entails(&mut solver, clause, monitor)? {
                self.mig.mark_redundant(clause.clone());
                redundant += 1;
            } else {
                self.mig.add_clause(clause);
                solver.add_clause(clause)?;
            }
        }

        self.added = added;

        debug!("{redundant} added clauses are redundant");
        Ok(())
    }

    /// Re-tests the long clauses next to the edit, which added or restored clauses may have made redundant.
    fn find_redundant(&mut self, monitor: &Monitor<()>) -> Result<(), AnalysisError> {
        if self.added.is_empty() && self.removed.is_empty() {
            return Ok(());
        }

        let (candidates, others): (Vec<LiteralSet>, Vec<LiteralSet>) =
            self.kept().into_iter().partition(|clause| {
                clause.len() > 2
                    && clause
                        .iter()
                        .any(|literal| self.changed.contains(&literal.unsigned_abs()))
            });
        if candidates.is_empty() {
            return Ok(());
        }

        let added: Vec<LiteralSet> = self
            .added
            .iter()
            .filter(|clause| !self.mig.is_redundant(clause))
            .cloned()
            .collect();
        let mut solver = self.solver(others.iter().chain(added.iter()), monitor)?;

        let mut redundant = 0;
        for clause in candidates {
            monitor.check_cancel()?;
            if self.entails(&mut solver, &clause, monitor)? {
                self.mig.mark_redundant(clause);
                redundant += 1;
            } else {
                solver.add_clause(&clause)?;
            }
        }

        debug!("{redundant} kept clauses became redundant");
        Ok(())
    }

    /// Without redundancy checks every clause of the cleaned formula is part of the graph.
    fn add_all(&mut self) {
        let redundant: Vec<LiteralSet> = self.mig.redundant_clauses().iter().cloned().collect();
        for clause in redundant {
            self.mig.unmark_redundant(&clause);
            self.mig.add_clause(&clause);
        }
        for clause in &self.added {
            self.mig.add_clause(clause);
        }
    }

    /// Finds binary clauses entailed by the formula among the literal pairs of its long clauses.
    ///
    /// Edges of the predecessor are kept if they are still entailed. New pairs are only probed in
    /// the part of the formula connected to the edit, everything else was probed before.
    /// Returns whether the search was complete.
    fn detect_strong(&mut self, monitor: &Monitor<()>) -> Result<bool, AnalysisError> {
        let mut candidates: Vec<LiteralSet> = self
            .clean
            .iter()
            .filter(|clause| clause.len() > 2)
            .flat_map(candidate_pairs)
            .filter(|pair| !self.mig.explicit_strong_edges().contains(pair))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        candidates.sort_unstable();
        let candidate_set: HashSet<&LiteralSet> = candidates.iter().collect();

        let affected = self.affected_region();
        let mut solver = self.solver(self.clean.iter(), monitor)?;
        let timeouts = self.timeouts;
        let mut probed = HashSet::new();

        let previous = std::mem::take(&mut self.previous_implicit);
        for edge in previous.iter().filter(|edge| candidate_set.contains(edge)) {
            monitor.check_cancel()?;
            probed.insert(edge.clone());
            self.probe_edge(&mut solver, edge, monitor)?;
        }

        for pair in candidates.iter() {
            let first = pair.literals()[0].unsigned_abs();
            let in_region = affected
                .as_ref()
                .map_or(true, |region| region.contains(&first));
            if probed.contains(pair) || !in_region {
                continue;
            }
            monitor.check_cancel()?;
            self.probe_edge(&mut solver, pair, monitor)?;
        }

        debug!(
            "{} implicit strong edges among {} candidate pairs",
            self.mig.implicit_strong_edges().len(),
            candidates.len()
        );
        Ok(self.timeouts == timeouts)
    }

    fn probe_edge(
        &mut self,
        solver: &mut SatSolver,
        edge: &LiteralSet,
        monitor: &Monitor<()>,
    ) -> Result<(), AnalysisError> {
        if self.entails(solver, edge, monitor)? {
            self.mig.add_strong_edge(edge, EdgeKind::Implicit);
            solver.add_clause(edge)?;
        }
        Ok(())
    }

    /// The variables connected to a changed variable through clauses of the new formula,
    /// `None` if the whole formula has to be searched.
    fn affected_region(&self) -> Option<HashSet<Variable>> {
        if !self.mig.strong_detected() {
            return None;
        }

        let mut components = UnionFind::<usize>::new(self.cnf.num_variables() as usize + 1);
        for clause in &self.clean {
            let mut variables = clause.iter().map(|literal| literal.unsigned_abs() as usize);
            if let Some(first) = variables.next() {
                variables.for_each(|other| {
                    components.union(first, other);
                });
            }
        }

        let roots: HashSet<usize> = self
            .changed
            .iter()
            .map(|&variable| components.find(variable as usize))
            .collect();

        Some(
            (1..=self.cnf.num_variables())
                .filter(|&variable| roots.contains(&components.find(variable as usize)))
                .collect(),
        )
    }

    fn solver<'c>(
        &self,
        clauses: impl Iterator<Item = &'c LiteralSet>,
        monitor: &Monitor<()>,
    ) -> Result<SatSolver, AnalysisError> {
        let cnf = Cnf::with_clauses(self.cnf.variables().clone(), clauses.cloned().collect())?;
        let mut solver = SatSolver::new(&cnf)?;
        solver.set_interrupt(monitor.interrupt());
        solver.set_timeout(self.options.solver_timeout);
        Ok(solver)
    }

    /// Whether the clauses of `solver` entail `clause`. An undecided probe counts as not entailed.
    fn entails(
        &mut self,
        solver: &mut SatSolver,
        clause: &LiteralSet,
        monitor: &Monitor<()>,
    ) -> Result<bool, AnalysisError> {
        let negation: Vec<Literal> = clause.iter().map(|literal| -literal).collect();
        match solver.has_solution_with(&negation) {
            SatResult::False => Ok(true),
            SatResult::True => Ok(false),
            SatResult::Timeout => {
                monitor.check_cancel()?;
                self.timeouts += 1;
                Ok(false)
            }
        }
    }
}

/// Drops clauses satisfied by the facts and literals falsified by them.
/// `None` if nothing of the clause remains to be represented.
fn clean_clause(clause: &LiteralSet, facts: &HashSet<Literal>) -> Option<LiteralSet> {
    if clause.iter().any(|literal| facts.contains(&literal)) {
        return None;
    }

    let clause = LiteralSet::with_order(
        clause
            .iter()
            .filter(|literal| !facts.contains(&-literal))
            .collect(),
        Order::Natural,
    );

    if clause.is_empty() || clause.has_conflicts() {
        None
    } else {
        Some(clause)
    }
}

/// The binary clauses that may be entailed among the literals of a clause:
/// `a | b` shortens the clause and `-a | -b` excludes two of its literals.
fn candidate_pairs(clause: &LiteralSet) -> Vec<LiteralSet> {
    let literals = clause.literals();
    let mut pairs = Vec::with_capacity(literals.len() * (literals.len() - 1));

    for (position, &first) in literals.iter().enumerate() {
        for &second in &literals[position + 1..] {
            pairs.push(LiteralSet::with_order(vec![first, second], Order::Natural));
            pairs.push(LiteralSet::with_order(vec![-first, -second], Order::Natural));
        }
    }

    pairs
}
