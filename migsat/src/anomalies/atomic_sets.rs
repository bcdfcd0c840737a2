use super::core::core_dead;
use super::solver;
use crate::error::AnalysisError;
use crate::job::{LongRunningMethod, Monitor};
use crate::solver::{SatResult, SatSolver, SelectionStrategy};
use crate::util::seeded_rng;
use bitvec::prelude::*;
use itertools::Itertools;
use log::debug;
use migsat_cnf::{Cnf, Literal, LiteralSet, Order, Variable};
use petgraph::unionfind::UnionFind;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;

/// Computes all atomic sets: groups of variables that take the same value in every model.
///
/// The first group always holds the core and dead variables as literals (core positive, dead
/// negative), since each of them has a fixed value. Every other variable ends up in exactly
/// one group of positive literals, possibly on its own.
#[derive(Debug, Clone)]
pub struct AtomicSetAnalysis {
    cnf: Cnf,
    variables: Option<LiteralSet>,
    solver_timeout: Option<Duration>,
    seed: u64,
    sample_size: usize,
}

impl AtomicSetAnalysis {
    pub fn new(cnf: Cnf) -> Self {
        Self {
            cnf,
            variables: None,
            solver_timeout: None,
            seed: 112358,
            sample_size: 64,
        }
    }

    /// Only groups the given variables.
    pub fn with_variables(mut self, variables: LiteralSet) -> Self {
        self.variables = Some(variables.variables());
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

    /// The amount of random models used to rule out pairs without a solver call.
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }
}

impl LongRunningMethod for AtomicSetAnalysis {
    type Output = Vec<LiteralSet>;
    type Partial = ();

    fn execute(&mut self, monitor: &Monitor<()>) -> Result<Vec<LiteralSet>, AnalysisError> {
        let mut solver = match solver(&self.cnf, monitor, self.solver_timeout)? {
            Some(solver) => solver,
            None => return Ok(Vec::new()),
        };

        let mut rng = seeded_rng(self.seed);
        let facts = match core_dead(
            &mut solver,
            self.variables.as_ref(),
            &monitor.sub_task::<()>(1),
            &mut rng,
            |_| (),
        )?
        .facts
        {
            Some(facts) => facts,
            None => return Ok(Vec::new()),
        };

        let candidates: Vec<Variable> = (1..=self.cnf.num_variables())
            .filter(|&variable| {
                self.variables
                    .as_ref()
                    .map_or(true, |variables| variables.contains_variable(variable))
            })
            .filter(|&variable| !facts.contains_variable(variable))
            .collect();

        let mut signs = sample_signs(&mut solver, monitor, self.sample_size, &mut rng)?;
        let mut atomic_sets = UnionFind::<usize>::new(self.cnf.num_variables() as usize + 1);
        monitor.set_remaining_work((candidates.len() * candidates.len().saturating_sub(1) / 2) as u64);

        let mut probes = 0;
        for (x, y) in candidates.iter().copied().tuple_combinations() {
            monitor.check_cancel()?;
            monitor.worked(1);

            if atomic_sets.equiv(x as usize, y as usize) {
                continue;
            }

            // a single model with different values rules the pair out
            if signs[x as usize - 1] != signs[y as usize - 1] {
                continue;
            }

            probes += 1;
            if equivalent(&mut solver, x as Literal, y as Literal, &mut signs, monitor)? {
                atomic_sets.union(x as usize, y as usize);
            }
        }

        debug!(
            "atomic sets: {} candidates, {probes} probed pairs",
            candidates.len()
        );

        let mut groups: BTreeMap<usize, Vec<Literal>> = BTreeMap::new();
        for &variable in &candidates {
            groups
                .entry(atomic_sets.find(variable as usize))
                .or_default()
                .push(variable as Literal);
        }

        let mut result = vec![LiteralSet::with_order(
            facts.into_literals(),
            Order::Natural,
        )];
        let mut sets: Vec<LiteralSet> = groups
            .into_values()
            .map(|group| LiteralSet::with_order(group, Order::Natural))
            .collect();
        sets.sort_unstable_by_key(|set| set.literals()[0]);
        result.extend(sets);

        Ok(result)
    }
}

/// The value of every variable in random models, one bit per model.
fn sample_signs<R: Rng>(
    solver: &mut SatSolver,
    monitor: &Monitor<()>,
    sample_size: usize,
    rng: &mut R,
) -> Result<Vec<BitVec>, AnalysisError> {
    let num_variables = solver.num_variables() as usize;
    let mut signs = vec![BitVec::with_capacity(sample_size); num_variables];

    for _ in 0..sample_size {
        monitor.check_cancel()?;

        let polarity = (1..=num_variables as Literal)
            .map(|variable| if rng.gen_bool(0.5) { variable } else { -variable })
            .collect();
        solver.set_selection_strategy(SelectionStrategy::Fixed(polarity));

        match solver.has_solution() {
            SatResult::True => record(solver, &mut signs),
            SatResult::False => break,
            // fewer samples only mean more solver calls later
            SatResult::Timeout => {
                monitor.check_cancel()?;
                break;
            }
        }
    }

    solver.set_selection_strategy(SelectionStrategy::Default);
    Ok(signs)
}

fn record(solver: &SatSolver, signs: &mut [BitVec]) {
    if let Some(model) = solver.get_solution() {
        signs
            .iter_mut()
            .zip(model)
            .for_each(|(bits, &literal)| bits.push(literal > 0));
    }
}

/// Whether `x` and `y` have the same value in every model. Models found on the way are
/// recorded so that later pairs can be ruled out without a solver call.
fn equivalent(
    solver: &mut SatSolver,
    x: Literal,
    y: Literal,
    signs: &mut [BitVec],
    monitor: &Monitor<()>,
) -> Result<bool, AnalysisError> {
    for probe in [[x, -y], [-x, y]] {
        match solver.has_solution_with(&probe) {
            SatResult::False => (),
            SatResult::True => {
                record(solver, signs);
                return Ok(false);
            }
            SatResult::Timeout => {
                monitor.check_cancel()?;
                return Ok(false);
            }
        }
    }

    Ok(true)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::InlineExecutor;

    fn atomic_sets(clauses: Vec<Vec<Literal>>) -> Vec<LiteralSet> {
        InlineExecutor
            .run(&mut AtomicSetAnalysis::new(Cnf::from(clauses)), &Monitor::new())
            .unwrap()
    }

    #[test]
    fn equivalent_variables_are_grouped() {
        // 1 <-> 2, 3 free, 4 core
        let sets = atomic_sets(vec![vec![-1, 2], vec![1, -2], vec![3, -3, 4], vec![4]]);

        assert_eq!(
            sets,
            vec![
                LiteralSet::new(vec![4]),
                LiteralSet::new(vec![1, 2]),
                LiteralSet::new(vec![3]),
            ]
        );
    }

    #[test]
    fn implications_in_one_direction_are_not_enough() {
        let sets = atomic_sets(vec![vec![-1, 2], vec![-2, 3], vec![-3, 1], vec![-3, 4]]);

        assert_eq!(sets[0], LiteralSet::default());
        assert!(sets.contains(&LiteralSet::new(vec![1, 2, 3])));
        assert!(sets.contains(&LiteralSet::new(vec![4])));
        assert_eq!(sets.len(), 3);
    }

    #[test]
    fn dead_variables_are_facts() {
        let sets = atomic_sets(vec![vec![-1], vec![1, 2], vec![-3, 2]]);
        assert_eq!(sets[0], LiteralSet::new(vec![-1, 2]));
        assert_eq!(sets[1..], [LiteralSet::new(vec![3])]);
    }

    #[test]
    fn void_formulas_have_no_atomic_sets() {
        assert!(atomic_sets(vec![vec![1], vec![-1]]).is_empty());
    }

    #[test]
    fn restricted_to_variables() {
        let sets = InlineExecutor
            .run(
                &mut AtomicSetAnalysis::new(Cnf::from(vec![vec![-1, 2], vec![1, -2], vec![3]]))
                    .with_variables(LiteralSet::new(vec![1, 2])),
                &Monitor::new(),
            )
            .unwrap();

        assert_eq!(sets, vec![LiteralSet::default(), LiteralSet::new(vec![1, 2])]);
    }
}
