#![allow(dead_code)]

use migsat::solver::{SatResult, SatSolver};
use migsat_cnf::{Cnf, Literal, LiteralSet, Variables};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

pub fn rng(seed: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed)
}

/// A clause over distinct variables with `min..=max` literals.
pub fn random_clause<R: Rng>(rng: &mut R, variables: u32, min: usize, max: usize) -> LiteralSet {
    let mut ids: Vec<Literal> = (1..=variables as Literal).collect();
    ids.shuffle(rng);

    let length = rng.gen_range(min..=max);
    ids.into_iter()
        .take(length)
        .map(|id| if rng.gen_bool(0.5) { id } else { -id })
        .collect()
}

pub fn random_cnf<R: Rng>(
    rng: &mut R,
    variables: u32,
    clauses: usize,
    min: usize,
    max: usize,
) -> Cnf {
    Cnf::with_clauses(
        Variables::with_count(variables),
        (0..clauses)
            .map(|_| random_clause(rng, variables, min, max))
            .collect(),
    )
    .unwrap()
}

/// Whether the clauses entail `clause`, decided by a fresh solver.
pub fn entails(cnf: &Cnf, clause: &[Literal]) -> bool {
    let mut solver = match SatSolver::new(cnf) {
        Ok(solver) => solver,
        Err(_) => return true,
    };
    let negation: Vec<Literal> = clause.iter().map(|literal| -literal).collect();
    solver.has_solution_with(&negation) == SatResult::False
}
