use super::solver;
use crate::error::AnalysisError;
use crate::job::{LongRunningMethod, Monitor};
use crate::solver::SatResult;
use migsat_cnf::{Cnf, Literal};
use std::time::Duration;

/// Decides whether a formula has a model, optionally under assumptions.
#[derive(Debug, Clone)]
pub struct HasSolutionAnalysis {
    cnf: Cnf,
    assumptions: Vec<Literal>,
    solver_timeout: Option<Duration>,
}

impl HasSolutionAnalysis {
    pub fn new(cnf: Cnf) -> Self {
        Self {
            cnf,
            assumptions: Vec::new(),
            solver_timeout: None,
        }
    }

    pub fn with_assumptions(mut self, assumptions: Vec<Literal>) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn with_solver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.solver_timeout = timeout;
        self
    }
}

impl LongRunningMethod for HasSolutionAnalysis {
    type Output = bool;
    type Partial = ();

    fn execute(&mut self, monitor: &Monitor<()>) -> Result<bool, AnalysisError> {
        let mut solver = match solver(&self.cnf, monitor, self.solver_timeout)? {
            Some(solver) => solver,
            None => return Ok(false),
        };

        match solver.has_solution_with(&self.assumptions) {
            SatResult::True => Ok(true),
            SatResult::False => Ok(false),
            SatResult::Timeout => {
                monitor.check_cancel()?;
                Err(AnalysisError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::InlineExecutor;

    fn valid(mut analysis: HasSolutionAnalysis) -> bool {
        InlineExecutor.run(&mut analysis, &Monitor::new()).unwrap()
    }

    #[test]
    fn satisfiable_formulas() {
        assert!(valid(HasSolutionAnalysis::new(Cnf::from(vec![vec![1, 2], vec![-1]]))));
        assert!(valid(HasSolutionAnalysis::new(Cnf::tautology())));
    }

    #[test]
    fn unsatisfiable_formulas() {
        assert!(!valid(HasSolutionAnalysis::new(Cnf::from(vec![vec![1], vec![-1]]))));
        assert!(!valid(HasSolutionAnalysis::new(Cnf::from(vec![
            vec![1, 2],
            vec![-1, 2],
            vec![1, -2],
            vec![-1, -2]
        ]))));
    }

    #[test]
    fn assumptions_restrict_the_models() {
        let cnf = Cnf::from(vec![vec![-1, 2]]);
        assert!(valid(
            HasSolutionAnalysis::new(cnf.clone()).with_assumptions(vec![1])
        ));
        assert!(!valid(
            HasSolutionAnalysis::new(cnf).with_assumptions(vec![1, -2])
        ));
    }
}
