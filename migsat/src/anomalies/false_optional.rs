use super::solver;
use crate::error::AnalysisError;
use crate::job::{LongRunningMethod, Monitor};
use crate::solver::SatResult;
use log::debug;
use migsat_cnf::{Cnf, Literal, Variable};
use std::time::Duration;

/// Finds optional features that are selected whenever their parent is.
///
/// A feature `f` with parent `p` is false-optional iff `p` can be selected at all
/// and `p & !f` has no model.
#[derive(Debug, Clone)]
pub struct FalseOptionalAnalysis {
    cnf: Cnf,
    /// Pairs of optional features and their parents.
    optional: Vec<(Variable, Variable)>,
    solver_timeout: Option<Duration>,
}

impl FalseOptionalAnalysis {
    pub fn new(cnf: Cnf, optional: Vec<(Variable, Variable)>) -> Self {
        Self {
            cnf,
            optional,
            solver_timeout: None,
        }
    }

    pub fn with_solver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.solver_timeout = timeout;
        self
    }
}

impl LongRunningMethod for FalseOptionalAnalysis {
    /// The false-optional features in the order they were given.
    type Output = Vec<Variable>;
    type Partial = Variable;

    fn execute(&mut self, monitor: &Monitor<Variable>) -> Result<Vec<Variable>, AnalysisError> {
        let mut solver = match solver(&self.cnf, monitor, self.solver_timeout)? {
            Some(solver) => solver,
            None => return Ok(Vec::new()),
        };

        monitor.set_remaining_work(self.optional.len() as u64);
        let mut false_optional = Vec::new();
        let mut timeouts = 0;

        for &(feature, parent) in &self.optional {
            monitor.check_cancel()?;
            monitor.worked(1);

            // the parent has to be selectable, but never without the feature
            let (child, selected) = (feature as Literal, parent as Literal);
            let decided = match solver.has_solution_with(&[selected, -child]) {
                SatResult::False => solver.has_solution_with(&[selected]),
                SatResult::True => SatResult::False,
                SatResult::Timeout => SatResult::Timeout,
            };

            match decided {
                SatResult::True => {
                    false_optional.push(feature);
                    monitor.report_partial(feature);
                }
                SatResult::False => (),
                SatResult::Timeout => {
                    monitor.check_cancel()?;
                    timeouts += 1;
                }
            }
        }

        debug!(
            "{} of {} optional features are false-optional, {timeouts} timeouts",
            false_optional.len(),
            self.optional.len()
        );
        Ok(false_optional)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::InlineExecutor;

    fn false_optional(
        clauses: Vec<Vec<Literal>>,
        optional: Vec<(Variable, Variable)>,
    ) -> Vec<Variable> {
        InlineExecutor
            .run(
                &mut FalseOptionalAnalysis::new(Cnf::from(clauses), optional),
                &Monitor::new(),
            )
            .unwrap()
    }

    #[test]
    fn constraints_can_force_optional_features() {
        // root 1 with optional children 2 and 3, cross-tree constraint 1 -> 3
        let clauses = vec![vec![1], vec![-2, 1], vec![-3, 1], vec![-1, 3]];
        assert_eq!(false_optional(clauses, vec![(2, 1), (3, 1)]), vec![3]);
    }

    #[test]
    fn children_of_dead_parents_are_not_false_optional() {
        // 2 is dead, its child 3 is dead as well
        let clauses = vec![vec![1], vec![-2, 1], vec![-3, 2], vec![-2], vec![-2, 3]];
        assert!(false_optional(clauses, vec![(3, 2)]).is_empty());
    }

    #[test]
    fn void_formulas_have_no_false_optional_features() {
        assert!(false_optional(vec![vec![1], vec![-1]], vec![(1, 1)]).is_empty());
    }
}
