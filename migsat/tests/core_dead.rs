mod common;

use common::{entails, random_cnf, rng};
use migsat::anomalies::CoreDeadAnalysis;
use migsat::job::InlineExecutor;
use migsat::parser::read_cnf;
use migsat::solver::{SatResult, SatSolver};
use migsat::{core_dead_analysis, Monitor};
use migsat_cnf::{Cnf, Literal, LiteralSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn satisfiable(cnf: &Cnf) -> bool {
    SatSolver::new(cnf).is_ok_and(|mut solver| solver.has_solution() == SatResult::True)
}

#[test]
fn core_dead_of_feature_models() {
    let cnf = read_cnf(Path::new("./tests/data/small.cnf")).unwrap();
    assert_eq!(
        core_dead_analysis(&cnf, &Monitor::new(), None),
        Some(LiteralSet::new(vec![1, 2]))
    );

    let void = read_cnf(Path::new("./tests/data/void.cnf")).unwrap();
    assert_eq!(
        core_dead_analysis(&void, &Monitor::new(), None),
        Some(LiteralSet::new(vec![-1, -2]))
    );
}

#[test]
fn core_dead_is_sound_complete_and_stable() {
    let mut rng = rng(42);

    for _ in 0..30 {
        let mut cnf = random_cnf(&mut rng, 12, 30, 2, 3);
        // a few units so that facts propagate
        cnf.add_clause(LiteralSet::new(vec![rng_literal(&mut rng, 12)]))
            .unwrap();
        cnf.add_clause(LiteralSet::new(vec![rng_literal(&mut rng, 12)]))
            .unwrap();

        let facts = core_dead_analysis(&cnf, &Monitor::new(), None).unwrap();
        assert!(!facts.has_conflicts(), "a variable is both core and dead");

        if !satisfiable(&cnf) {
            assert_eq!(facts.len(), cnf.num_variables() as usize);
            continue;
        }

        for literal in facts.iter() {
            assert!(entails(&cnf, &[literal]), "{literal} is not a fact");
        }
        for variable in 1..=cnf.num_variables() as Literal {
            if !facts.contains_variable(variable.unsigned_abs()) {
                assert!(!entails(&cnf, &[variable]));
                assert!(!entails(&cnf, &[-variable]));
            }
        }

        assert_eq!(core_dead_analysis(&cnf, &Monitor::new(), None), Some(facts));
    }
}

fn rng_literal(rng: &mut impl rand::Rng, variables: u32) -> Literal {
    let variable = rng.gen_range(1..=variables) as Literal;
    if rng.gen_bool(0.5) {
        variable
    } else {
        -variable
    }
}

#[test]
fn facts_are_streamed() {
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    let monitor =
        Monitor::with_listener(move |literal: Literal| sink.lock().unwrap().push(literal));

    let cnf = read_cnf(Path::new("./tests/data/small.cnf")).unwrap();
    let facts = InlineExecutor
        .run(&mut CoreDeadAnalysis::new(cnf), &monitor)
        .unwrap();

    assert_eq!(LiteralSet::new(collected.lock().unwrap().clone()), facts);
}

#[test]
fn timeouts_bound_the_analysis() {
    let cnf = random_cnf(&mut rng(7), 500, 2000, 3, 3);

    assert_eq!(
        core_dead_analysis(&cnf, &Monitor::new(), Some(Duration::from_millis(1))),
        None
    );
    assert!(
        core_dead_analysis(&cnf, &Monitor::new(), Some(Duration::from_millis(10000))).is_some()
    );
}

#[test]
fn cancelled_analyses_have_no_result() {
    let cnf = read_cnf(Path::new("./tests/data/small.cnf")).unwrap();
    let monitor = Monitor::new();
    monitor.cancel();

    assert_eq!(core_dead_analysis(&cnf, &monitor, None), None);
    assert_eq!(
        core_dead_analysis(&cnf, &monitor, Some(Duration::from_secs(1))),
        None
    );
}
