use crate::error::{AnalysisError, SolverError};
use crate::job::{get_result, LongRunningMethod, Monitor};
use crate::solver::{SatResult, SatSolver, SelectionStrategy};
use crate::util::seeded_rng;
use log::debug;
use migsat_cnf::{Cnf, Literal, LiteralSet, Order};
use rand::Rng;
use std::time::Duration;

/// Finds all core and dead variables of a formula.
///
/// Core variables are reported as positive, dead ones as negative literals.
#[derive(Debug, Clone)]
pub struct CoreDeadAnalysis {
    cnf: Cnf,
    variables: Option<LiteralSet>,
    assumptions: Vec<Literal>,
    solver_timeout: Option<Duration>,
    seed: u64,
    timeouts: usize,
}

impl CoreDeadAnalysis {
    pub fn new(cnf: Cnf) -> Self {
        Self {
            cnf,
            variables: None,
            assumptions: Vec::new(),
            solver_timeout: None,
            seed: 112358,
            timeouts: 0,
        }
    }

    /// Only decides the given variables.
    pub fn with_variables(mut self, variables: LiteralSet) -> Self {
        self.variables = Some(variables.variables());
        self
    }

    /// Decides core and dead variables under the given assumptions.
    /// The assumptions themselves are not reported, zeros are ignored.
    pub fn with_assumptions(mut self, assumptions: Vec<Literal>) -> Self {
        self.assumptions = assumptions
            .into_iter()
            .filter(|&literal| literal != 0)
            .collect();
        self
    }

    pub fn with_solver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.solver_timeout = timeout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// How many probes of the last run were left undecided.
    pub fn timeouts(&self) -> usize {
        self.timeouts
    }
}

impl LongRunningMethod for CoreDeadAnalysis {
    type Output = LiteralSet;
    type Partial = Literal;

    fn execute(&mut self, monitor: &Monitor<Literal>) -> Result<LiteralSet, AnalysisError> {
        let mut solver = match SatSolver::new(&self.cnf) {
            Ok(solver) => solver,
            Err(SolverError::Contradiction) => {
                return Ok(all_dead(&self.cnf, self.variables.as_ref(), monitor))
            }
            Err(err) => return Err(err.into()),
        };

        solver.set_interrupt(monitor.interrupt());
        solver.set_timeout(self.solver_timeout);
        self.assumptions
            .iter()
            .for_each(|&literal| solver.push(literal));

        let mut rng = seeded_rng(self.seed);
        let outcome = core_dead(&mut solver, self.variables.as_ref(), monitor, &mut rng, |literal| {
            monitor.report_partial(literal)
        })?;

        self.timeouts = outcome.timeouts;
        match outcome.facts {
            Some(facts) => Ok(facts),
            None => Ok(all_dead(&self.cnf, self.variables.as_ref(), monitor)),
        }
    }
}

/// The result of probing one solver.
#[derive(Debug, Clone, Default)]
pub(crate) struct CoreDead {
    /// The core and dead literals in discovery order, `None` if the formula is void.
    pub facts: Option<LiteralSet>,
    /// Probes that hit the solver timeout.
    pub timeouts: usize,
}

/// Probes every candidate variable of `solver`.
///
/// The literals pushed onto the solver before the call are treated as fixed and never reported.
/// Every confirmed literal stays pushed onto the solver afterwards.
pub(crate) fn core_dead<T, R: Rng>(
    solver: &mut SatSolver,
    variables: Option<&LiteralSet>,
    monitor: &Monitor<T>,
    rng: &mut R,
    mut report: impl FnMut(Literal),
) -> Result<CoreDead, AnalysisError> {
    let initial = solver.assumption_count();

    solver.set_selection_strategy(SelectionStrategy::Positive);
    monitor.check_cancel()?;
    let mut model1 = match solve_model(solver, monitor)? {
        Some(model) => model,
        None => return Ok(CoreDead::default()),
    };

    solver.set_selection_strategy(SelectionStrategy::Negative);
    monitor.check_cancel()?;
    let model2 = match solve_model(solver, monitor)? {
        Some(model) => model,
        None => return Ok(CoreDead::default()),
    };

    monitor.check_cancel()?;

    if let Some(variables) = variables {
        model1
            .iter_mut()
            .filter(|literal| !variables.contains_variable(literal.unsigned_abs()))
            .for_each(|literal| *literal = 0);
    }

    for literal in &solver.assumptions()[..initial] {
        let slot = (literal.unsigned_abs() as usize)
            .checked_sub(1)
            .and_then(|index| model1.get_mut(index));
        if let Some(slot) = slot {
            *slot = 0;
        }
    }

    LiteralSet::reset_conflicts(&mut model1, &model2);

    // Branch against every candidate so each satisfiable probe eliminates as many as possible.
    // Variables without a candidate follow the polarity the two initial models mostly agree on.
    let negatives = LiteralSet::from_model(model1.clone()).count_negative()
        + LiteralSet::from_model(model2.clone()).count_negative();
    let prefer_negative = negatives > model1.len();
    let bias = model1
        .iter()
        .enumerate()
        .map(|(index, &literal)| match literal {
            0 if prefer_negative => -(index as Literal + 1),
            0 => index as Literal + 1,
            literal => -literal,
        })
        .collect();
    solver.set_selection_strategy(SelectionStrategy::Fixed(bias));

    let candidates = model1.iter().filter(|&&literal| literal != 0).count();
    monitor.set_remaining_work(candidates as u64);
    let mut timeouts = 0;

    for index in 0..model1.len() {
        monitor.check_cancel()?;

        let literal = model1[index];
        if literal == 0 {
            continue;
        }

        solver.push(-literal);
        match solver.has_solution() {
            SatResult::False => {
                solver.replace_last(literal);
                report(literal);
            }
            SatResult::Timeout => {
                solver.pop();
                timeouts += 1;
            }
            SatResult::True => {
                solver.pop();
                if let Some(solution) = solver.get_solution() {
                    LiteralSet::reset_conflicts(&mut model1, solution);
                }
                solver.shuffle(rng);
            }
        }

        monitor.worked(1);
    }

    debug!(
        "core/dead: {} facts after {} solver calls, {timeouts} timeouts",
        solver.assumption_count() - initial,
        solver.solve_calls()
    );

    Ok(CoreDead {
        facts: Some(LiteralSet::with_order(
            solver.assumptions()[initial..].to_vec(),
            Order::Unordered,
        )),
        timeouts,
    })
}

// A model, `None` if unsatisfiable, or an error if the solve was interrupted.
fn solve_model<T>(
    solver: &mut SatSolver,
    monitor: &Monitor<T>,
) -> Result<Option<Vec<Literal>>, AnalysisError> {
    match solver.has_solution() {
        SatResult::True => Ok(solver.get_solution().map(<[Literal]>::to_vec)),
        SatResult::False => Ok(None),
        SatResult::Timeout => {
            monitor.check_cancel()?;
            Err(AnalysisError::Timeout)
        }
    }
}

/// A void formula makes every variable dead.
fn all_dead(cnf: &Cnf, variables: Option<&LiteralSet>, monitor: &Monitor<Literal>) -> LiteralSet {
    let dead: Vec<Literal> = (1..=cnf.num_variables())
        .filter(|&variable| {
            variables.map_or(true, |variables| variables.contains_variable(variable))
        })
        .map(|variable| -(variable as Literal))
        .collect();

    dead.iter().for_each(|&literal| monitor.report_partial(literal));
    LiteralSet::new(dead)
}

/// Runs [CoreDeadAnalysis] without any cache. `None` on timeout, cancellation or failure.
pub fn core_dead_analysis(
    cnf: &Cnf,
    monitor: &Monitor<Literal>,
    timeout: Option<Duration>,
) -> Option<LiteralSet> {
    get_result(CoreDeadAnalysis::new(cnf.clone()), monitor, timeout)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::InlineExecutor;
    use std::sync::{Arc, Mutex};

    fn analyze(clauses: Vec<Vec<Literal>>) -> LiteralSet {
        InlineExecutor
            .run(&mut CoreDeadAnalysis::new(Cnf::from(clauses)), &Monitor::new())
            .unwrap()
    }

    #[test]
    fn single_unit_is_core() {
        assert_eq!(analyze(vec![vec![1]]), LiteralSet::new(vec![1]));
    }

    #[test]
    fn contradiction_makes_everything_dead() {
        let cnf = Cnf::from(vec![vec![1], vec![-1], vec![2, 3]]);
        assert_eq!(
            core_dead_analysis(&cnf, &Monitor::new(), None),
            Some(LiteralSet::new(vec![-1, -2, -3]))
        );
    }

    #[test]
    fn unsatisfiable_without_units_makes_everything_dead() {
        let facts = analyze(vec![vec![1, 2], vec![-1, 2], vec![1, -2], vec![-1, -2]]);
        assert_eq!(facts, LiteralSet::new(vec![-1, -2]));
    }

    #[test]
    fn implied_core_and_dead() {
        // 1 is core, 1 -> 2, 2 -> -3, 4 is free
        let facts = analyze(vec![vec![1], vec![-1, 2], vec![-2, -3], vec![4, -4, 1]]);
        assert_eq!(facts, LiteralSet::new(vec![1, 2, -3]));
    }

    #[test]
    fn free_formula_has_no_facts() {
        assert!(analyze(vec![vec![1, 2], vec![-1, -2]]).is_empty());
    }

    #[test]
    fn restricted_to_variables() {
        let facts = InlineExecutor
            .run(
                &mut CoreDeadAnalysis::new(Cnf::from(vec![vec![1], vec![-2]]))
                    .with_variables(LiteralSet::new(vec![2])),
                &Monitor::new(),
            )
            .unwrap();
        assert_eq!(facts, LiteralSet::new(vec![-2]));
    }

    #[test]
    fn assumptions_are_not_reported() {
        let facts = InlineExecutor
            .run(
                &mut CoreDeadAnalysis::new(Cnf::from(vec![vec![-1, 2], vec![-2, 3]]))
                    .with_assumptions(vec![1]),
                &Monitor::new(),
            )
            .unwrap();
        assert_eq!(facts, LiteralSet::new(vec![2, 3]));
    }

    #[test]
    fn zero_assumptions_are_ignored() {
        let cnf = Cnf::from(vec![vec![-1, 2], vec![-2, 3]]);
        let facts = InlineExecutor
            .run(
                &mut CoreDeadAnalysis::new(cnf.clone()).with_assumptions(vec![0, 1, 0]),
                &Monitor::new(),
            )
            .unwrap();
        assert_eq!(facts, LiteralSet::new(vec![2, 3]));

        // pushed onto the solver directly, a zero must not disturb the candidate mask either
        let mut solver = SatSolver::new(&cnf).unwrap();
        solver.push(0);
        solver.push(1);
        let outcome = core_dead(
            &mut solver,
            None,
            &Monitor::<()>::new(),
            &mut seeded_rng(1),
            |_| (),
        )
        .unwrap();
        assert_eq!(outcome.facts, Some(LiteralSet::new(vec![2, 3])));
    }

    #[test]
    fn partial_results_match_the_result() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let monitor = Monitor::with_listener(move |literal| sink.lock().unwrap().push(literal));

        let facts = core_dead_analysis(
            &Cnf::from(vec![vec![1], vec![-1, 2], vec![-3, -2]]),
            &monitor,
            None,
        )
        .unwrap();

        assert_eq!(facts, LiteralSet::new(reported.lock().unwrap().clone()));
        assert_eq!(facts.len(), 3);
    }

    #[test]
    fn cancelled_runs_have_no_result() {
        let monitor = Monitor::new();
        monitor.cancel();
        assert_eq!(
            core_dead_analysis(&Cnf::from(vec![vec![1]]), &monitor, None),
            None
        );
    }
}
