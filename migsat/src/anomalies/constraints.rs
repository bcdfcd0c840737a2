use super::solver;
use crate::error::AnalysisError;
use crate::job::{LongRunningMethod, Monitor};
use crate::solver::{SatResult, SatSolver};
use log::debug;
use migsat_cnf::{Cnf, Literal};
use std::time::Duration;

/// The anomalies a cross-tree constraint can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintAnalysisKind {
    /// The constraint together with the tree has no model.
    Void,
    /// The tree and all other constraints already entail the constraint.
    Redundant,
    /// The constraint has no model on its own.
    Contradiction,
    /// Every clause of the constraint is always satisfied.
    Tautology,
}

/// Checks every constraint of a formula for one kind of anomaly.
///
/// The tree and all constraints have to share one variable universe.
#[derive(Debug, Clone)]
pub struct ConstraintAnalysis {
    tree: Cnf,
    constraints: Vec<Cnf>,
    kind: ConstraintAnalysisKind,
    candidates: Option<Vec<usize>>,
    solver_timeout: Option<Duration>,
}

impl ConstraintAnalysis {
    pub fn new(tree: Cnf, constraints: Vec<Cnf>, kind: ConstraintAnalysisKind) -> Self {
        Self {
            tree,
            constraints,
            kind,
            candidates: None,
            solver_timeout: None,
        }
    }

    /// Only checks the constraints at the given indices. Reported indices still refer to all
    /// constraints.
    pub fn with_candidates(mut self, candidates: Vec<usize>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn with_solver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.solver_timeout = timeout;
        self
    }

    pub fn kind(&self) -> ConstraintAnalysisKind {
        self.kind
    }

    fn check(&self, index: usize, monitor: &Monitor<usize>) -> Result<bool, AnalysisError> {
        let constraint = &self.constraints[index];

        match self.kind {
            ConstraintAnalysisKind::Void => {
                let mut cnf = self.tree.clone();
                cnf.extend(constraint)?;
                unsatisfiable(solver(&cnf, monitor, self.solver_timeout)?, monitor)
            }
            ConstraintAnalysisKind::Contradiction => {
                unsatisfiable(solver(constraint, monitor, self.solver_timeout)?, monitor)
            }
            ConstraintAnalysisKind::Redundant => {
                let mut cnf = self.tree.clone();
                for (other, clauses) in self.constraints.iter().enumerate() {
                    if other != index {
                        cnf.extend(clauses)?;
                    }
                }

                // a contradictory remainder entails everything
                let mut solver = match solver(&cnf, monitor, self.solver_timeout)? {
                    Some(solver) => solver,
                    None => return Ok(true),
                };

                for clause in constraint.clauses() {
                    let negation: Vec<Literal> = clause.iter().map(|literal| -literal).collect();
                    match solver.has_solution_with(&negation) {
                        SatResult::False => (),
                        SatResult::True => return Ok(false),
                        SatResult::Timeout => {
                            monitor.check_cancel()?;
                            return Err(AnalysisError::Timeout);
                        }
                    }
                }
                Ok(true)
            }
            ConstraintAnalysisKind::Tautology => Ok(constraint
                .clauses()
                .iter()
                .all(|clause| clause.has_conflicts())),
        }
    }
}

impl LongRunningMethod for ConstraintAnalysis {
    /// The indices of the constraints with the anomaly.
    type Output = Vec<usize>;
    type Partial = usize;

    fn execute(&mut self, monitor: &Monitor<usize>) -> Result<Vec<usize>, AnalysisError> {
        let candidates: Vec<usize> = match &self.candidates {
            Some(candidates) => candidates
                .iter()
                .copied()
                .filter(|&index| index < self.constraints.len())
                .collect(),
            None => (0..self.constraints.len()).collect(),
        };

        monitor.set_remaining_work(candidates.len() as u64);
        let mut anomalous = Vec::new();
        let mut undecided = 0;

        for index in candidates.iter().copied() {
            monitor.check_cancel()?;
            monitor.worked(1);

            match self.check(index, monitor) {
                Ok(true) => {
                    anomalous.push(index);
                    monitor.report_partial(index);
                }
                Ok(false) => (),
                // a constraint the solver cannot decide in time is reported as unremarkable
                Err(AnalysisError::Timeout) if !monitor.is_cancelled() => undecided += 1,
                Err(err) => return Err(err),
            }
        }

        debug!(
            "{:?}: {} of {} constraints, {undecided} undecided",
            self.kind,
            anomalous.len(),
            candidates.len()
        );
        Ok(anomalous)
    }
}

/// Whether the clauses of `solver` have no model. `None` stands for a solver that could not
/// even be built because its clauses are contradictory.
fn unsatisfiable(
    solver: Option<SatSolver>,
    monitor: &Monitor<usize>,
) -> Result<bool, AnalysisError> {
    let mut solver = match solver {
        Some(solver) => solver,
        None => return Ok(true),
    };

    match solver.has_solution() {
        SatResult::True => Ok(false),
        SatResult::False => Ok(true),
        SatResult::Timeout => {
            monitor.check_cancel()?;
            Err(AnalysisError::Timeout)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::InlineExecutor;
    use migsat_cnf::{LiteralSet, Variables};

    fn cnf(clauses: Vec<Vec<Literal>>) -> Cnf {
        Cnf::with_clauses(
            Variables::with_count(4),
            clauses.into_iter().map(LiteralSet::new).collect(),
        )
        .unwrap()
    }

    fn analyze(kind: ConstraintAnalysisKind, constraints: Vec<Vec<Vec<Literal>>>) -> Vec<usize> {
        // root 1 with optional children 2, 3 and 4
        let tree = cnf(vec![vec![1], vec![-2, 1], vec![-3, 1], vec![-4, 1]]);
        let constraints = constraints.into_iter().map(cnf).collect();

        InlineExecutor
            .run(
                &mut ConstraintAnalysis::new(tree, constraints, kind),
                &Monitor::new(),
            )
            .unwrap()
    }

    #[test]
    fn void_constraints() {
        let constraints = vec![vec![vec![-1]], vec![vec![-2, 3]], vec![vec![2], vec![-2]]];
        assert_eq!(analyze(ConstraintAnalysisKind::Void, constraints), vec![0, 2]);
    }

    #[test]
    fn redundant_constraints() {
        // 2 -> 3 and 3 -> 4 entail 2 -> 4, and every feature implies the root
        let constraints = vec![
            vec![vec![-2, 3]],
            vec![vec![-3, 4]],
            vec![vec![-2, 4]],
            vec![vec![-4, 1]],
        ];
        assert_eq!(
            analyze(ConstraintAnalysisKind::Redundant, constraints),
            vec![2, 3]
        );
    }

    #[test]
    fn contradictory_constraints() {
        let constraints = vec![vec![vec![-1]], vec![vec![2], vec![-2]]];
        assert_eq!(
            analyze(ConstraintAnalysisKind::Contradiction, constraints),
            vec![1]
        );
    }

    #[test]
    fn tautology_constraints() {
        let constraints = vec![vec![vec![2, -2]], vec![vec![2, -2], vec![3]], vec![]];
        assert_eq!(
            analyze(ConstraintAnalysisKind::Tautology, constraints),
            vec![0, 2]
        );
    }

    #[test]
    fn only_candidates_are_checked() {
        let tree = cnf(vec![vec![1]]);
        let constraints = vec![
            cnf(vec![vec![-1]]),
            cnf(vec![vec![2]]),
            cnf(vec![vec![-1, 2], vec![-2]]),
        ];

        let void = InlineExecutor
            .run(
                &mut ConstraintAnalysis::new(tree, constraints, ConstraintAnalysisKind::Void)
                    .with_candidates(vec![1, 2, 7]),
                &Monitor::new(),
            )
            .unwrap();
        assert_eq!(void, vec![2]);
    }

    #[test]
    fn cancellation_is_not_swallowed() {
        let monitor = Monitor::new();
        monitor.cancel();

        let mut analysis = ConstraintAnalysis::new(
            cnf(vec![vec![1]]),
            vec![cnf(vec![vec![2]])],
            ConstraintAnalysisKind::Void,
        );
        assert!(matches!(
            analysis.execute(&monitor),
            Err(AnalysisError::Cancelled)
        ));
    }
}
