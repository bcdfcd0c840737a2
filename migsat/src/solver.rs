//! An incremental SAT solver over a [Cnf] with an assumption stack, backed by `batsat`.

mod callbacks;

use crate::error::SolverError;
use crate::job::Interrupt;
use batsat::{lbool, Lit, Solver, SolverInterface, SolverOpts, Var};
use callbacks::InterruptCallbacks;
use log::trace;
use migsat_cnf::{Cnf, Literal, LiteralSet, Variable};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::{Duration, Instant};

/// The outcome of a single satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatResult {
    True,
    False,
    /// The solve was interrupted by a timeout or a cancellation.
    Timeout,
}

/// Which polarity the solver tries first when branching on a variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Whatever the solver picks.
    #[default]
    Default,
    Positive,
    Negative,
    /// Try the literal at position `v - 1` first for variable `v`. Zero leaves the choice to the solver.
    Fixed(Vec<Literal>),
}

impl SelectionStrategy {
    /// The literal of `variable` to try first, `None` if the solver decides.
    fn preference(&self, variable: Variable) -> Option<Literal> {
        let literal = variable as Literal;
        match self {
            SelectionStrategy::Default => None,
            SelectionStrategy::Positive => Some(literal),
            SelectionStrategy::Negative => Some(-literal),
            SelectionStrategy::Fixed(model) => match model.get(variable as usize - 1) {
                Some(&preferred) if preferred > 0 => Some(literal),
                Some(&preferred) if preferred < 0 => Some(-literal),
                _ => None,
            },
        }
    }
}

struct Backend {
    solver: Solver<InterruptCallbacks>,
    vars: Vec<Var>,
}

/// A solver instance owned by exactly one analysis.
///
/// One `batsat` instance lives as long as the solver, so learned clauses and variable activities
/// carry over from solve to solve. A selection strategy is applied by first solving with the
/// preferred literals as additional assumptions, taken in branch order. If that fails, the
/// preferences assigned before the conflict stay behind as saved phases for the actual solve.
/// The clause store only serves to rebuild the backend after a rejected clause left it unusable.
pub struct SatSolver {
    num_variables: u32,
    clauses: Vec<LiteralSet>,
    assumptions: Vec<Literal>,
    strategy: SelectionStrategy,
    order: Vec<Variable>,
    callbacks: InterruptCallbacks,
    interrupt: Interrupt,
    timeout: Option<Duration>,
    backend: Option<Backend>,
    builds: usize,
    solution: Option<Vec<Literal>>,
    solve_calls: usize,
}

impl SatSolver {
    /// Loads `cnf` into a fresh solver.
    ///
    /// Fails with [SolverError::Contradiction] if the clauses are already unsatisfiable without search.
    pub fn new(cnf: &Cnf) -> Result<Self, SolverError> {
        let num_variables = cnf.num_variables();
        let interrupt = Interrupt::default();

        let mut solver = Self {
            num_variables,
            clauses: cnf.clauses().to_vec(),
            assumptions: Vec::new(),
            strategy: SelectionStrategy::Default,
            order: (1..=num_variables).collect(),
            callbacks: InterruptCallbacks::new(interrupt.token.clone()),
            interrupt,
            timeout: None,
            backend: None,
            builds: 0,
            solution: None,
            solve_calls: 0,
        };

        solver.backend()?;
        Ok(solver)
    }

    /// Makes every following solve observe `interrupt`.
    pub fn set_interrupt(&mut self, interrupt: Interrupt) {
        self.callbacks.set_token(interrupt.token.clone());
        if let Some(backend) = self.backend.as_mut() {
            backend.solver.cb_mut().set_token(interrupt.token.clone());
        }
        self.interrupt = interrupt;
    }

    /// Bounds every single solve. A zero duration times out every solve.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    pub fn clauses(&self) -> &[LiteralSet] {
        &self.clauses
    }

    pub fn solve_calls(&self) -> usize {
        self.solve_calls
    }

    /// Adds a clause permanently.
    ///
    /// A clause that is falsified by the current assumptions or that makes the formula
    /// unsatisfiable at decision level 0 is rejected with [SolverError::Contradiction]
    /// and leaves the solver unchanged.
    pub fn add_clause(&mut self, clause: &LiteralSet) -> Result<(), SolverError> {
        if let Some(literal) = clause
            .iter()
            .find(|literal| literal.unsigned_abs() > self.num_variables)
        {
            return Err(SolverError::Internal(format!(
                "literal {literal} exceeds {} variables",
                self.num_variables
            )));
        }

        if clause
            .iter()
            .all(|literal| self.assumptions.contains(&-literal))
        {
            return Err(SolverError::Contradiction);
        }

        self.clauses.push(clause.clone());

        if let Some(backend) = self.backend.as_mut() {
            let mut lits = to_lits(&backend.vars, clause.iter());
            if !backend.solver.add_clause_reuse(&mut lits) {
                self.clauses.pop();
                self.backend = None;
                return Err(SolverError::Contradiction);
            }
        }

        Ok(())
    }

    pub fn assumptions(&self) -> &[Literal] {
        &self.assumptions
    }

    pub fn assumption_count(&self) -> usize {
        self.assumptions.len()
    }

    pub fn push(&mut self, literal: Literal) {
        self.assumptions.push(literal);
    }

    pub fn pop(&mut self) -> Option<Literal> {
        self.assumptions.pop()
    }

    /// Swaps the most recent assumption for `literal`.
    pub fn replace_last(&mut self, literal: Literal) {
        match self.assumptions.last_mut() {
            Some(last) => *last = literal,
            None => self.assumptions.push(literal),
        }
    }

    pub fn set_selection_strategy(&mut self, strategy: SelectionStrategy) {
        self.strategy = strategy;
    }

    /// Randomizes the order in which the preferred literals are branched on.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }

    /// Checks satisfiability under the current assumptions.
    pub fn has_solution(&mut self) -> SatResult {
        self.solve(&[])
    }

    /// Checks satisfiability under the current assumptions and the additional `literals`,
    /// without changing the assumption stack.
    pub fn has_solution_with(&mut self, literals: &[Literal]) -> SatResult {
        self.solve(literals)
    }

    /// A full index-ordered model under the current assumptions, if one exists.
    pub fn find_solution(&mut self) -> Option<Vec<Literal>> {
        match self.has_solution() {
            SatResult::True => self.solution.clone(),
            _ => None,
        }
    }

    /// The model of the last satisfiable solve.
    pub fn get_solution(&self) -> Option<&[Literal]> {
        self.solution.as_deref()
    }

    fn solve(&mut self, extra: &[Literal]) -> SatResult {
        self.solution = None;
        self.solve_calls += 1;

        let per_call = self.timeout.map(|timeout| Instant::now() + timeout);
        let deadline = self.interrupt.bounded(per_call).deadline;

        if self.interrupt.token.is_cancelled()
            || deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            return SatResult::Timeout;
        }

        let num_variables = self.num_variables;
        let assumptions: Vec<Literal> = self
            .assumptions
            .iter()
            .chain(extra.iter())
            .copied()
            .filter(|literal| *literal != 0 && literal.unsigned_abs() <= num_variables)
            .collect();

        let preferred = self.preferred(&assumptions);

        // the backend owns a clone of the callbacks sharing the same deadline
        self.callbacks.set_deadline(deadline);
        let callbacks = self.callbacks.clone();

        let backend = match self.backend() {
            Ok(backend) => backend,
            Err(_) => return SatResult::False,
        };

        let lits = to_lits(&backend.vars, assumptions.into_iter());
        let mut result = lbool::FALSE;
        if !preferred.is_empty() {
            let mut primed = lits.clone();
            primed.extend(to_lits(&backend.vars, preferred.into_iter()));
            result = backend.solver.solve_limited(&primed);
        }
        if result == lbool::FALSE {
            result = backend.solver.solve_limited(&lits);
        }
        callbacks.set_deadline(None);

        if result == lbool::TRUE {
            let model = (1..=num_variables)
                .map(|variable| {
                    let literal = variable as Literal;
                    if backend.solver.value_var(backend.vars[variable as usize - 1]) == lbool::TRUE
                    {
                        literal
                    } else {
                        -literal
                    }
                })
                .collect();
            self.solution = Some(model);
            SatResult::True
        } else if result == lbool::FALSE {
            SatResult::False
        } else {
            trace!("solve interrupted after {} calls", self.solve_calls);
            SatResult::Timeout
        }
    }

    // The strategy's literals in branch order, leaving out assumed variables.
    fn preferred(&self, assumptions: &[Literal]) -> Vec<Literal> {
        if self.strategy == SelectionStrategy::Default {
            return Vec::new();
        }

        let mut assumed = vec![false; self.num_variables as usize + 1];
        for literal in assumptions {
            assumed[literal.unsigned_abs() as usize] = true;
        }

        self.order
            .iter()
            .filter(|&&variable| !assumed[variable as usize])
            .filter_map(|&variable| self.strategy.preference(variable))
            .collect()
    }

    // Builds the backend from the clause store if there is none yet or the last one was
    // left unsatisfiable by a rejected clause.
    fn backend(&mut self) -> Result<&mut Backend, SolverError> {
        if self.backend.is_none() {
            // full phase saving carries the polarity of each solve over to the next one
            let opts = SolverOpts {
                phase_saving: 2,
                ..SolverOpts::default()
            };
            let mut solver = Solver::new(opts, self.callbacks.clone());
            let vars: Vec<Var> = (0..self.num_variables)
                .map(|_| solver.new_var(lbool::UNDEF, true))
                .collect();

            for clause in &self.clauses {
                let mut lits = to_lits(&vars, clause.iter());
                if !solver.add_clause_reuse(&mut lits) {
                    return Err(SolverError::Contradiction);
                }
            }

            if !solver.is_ok() {
                return Err(SolverError::Contradiction);
            }

            self.builds += 1;
            trace!("solver backend built, {} builds so far", self.builds);
            self.backend = Some(Backend { solver, vars });
        }

        self.backend
            .as_mut()
            .ok_or_else(|| SolverError::Internal("solver backend is missing".to_string()))
    }
}

fn to_lits(vars: &[Var], literals: impl Iterator<Item = Literal>) -> Vec<Lit> {
    literals
        .map(|literal| Lit::new(vars[literal.unsigned_abs() as usize - 1], literal > 0))
        .collect()
}
