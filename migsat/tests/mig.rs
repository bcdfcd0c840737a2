mod common;

use common::{entails, random_clause, random_cnf, rng};
use migsat::job::InlineExecutor;
use migsat::mig::{IncrementalMigBuilder, MigBuilder, ModalImplicationGraph};
use migsat::parser::read_cnf;
use migsat::{build_mig, AnalysisError, LongRunningMethod, Monitor};
use migsat_cnf::{Cnf, Literal, LiteralSet, Variables};
use rand::Rng;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

fn named(clauses: Vec<Vec<Literal>>) -> Cnf {
    Cnf::with_clauses(
        Variables::from_names(["A", "B", "C"]).unwrap(),
        clauses.into_iter().map(LiteralSet::new).collect(),
    )
    .unwrap()
}

fn full(cnf: &Cnf) -> ModalImplicationGraph {
    InlineExecutor
        .run(&mut MigBuilder::new(cnf.clone()), &Monitor::new())
        .unwrap()
}

fn incremental(previous: ModalImplicationGraph, cnf: &Cnf) -> ModalImplicationGraph {
    InlineExecutor
        .run(
            &mut IncrementalMigBuilder::new(previous, cnf.clone()),
            &Monitor::new(),
        )
        .unwrap()
}

fn assert_same_graph(incremental: &ModalImplicationGraph, full: &ModalImplicationGraph) {
    assert_eq!(incremental.is_void(), full.is_void());
    assert_eq!(incremental.core_dead(), full.core_dead());
    assert_eq!(incremental.strong_edge_set(), full.strong_edge_set());

    for variable in 1..=full.num_variables() as Literal {
        for literal in [variable, -variable] {
            assert_eq!(incremental.is_core(literal), full.is_core(literal));
            assert_eq!(incremental.is_dead(literal), full.is_dead(literal));
        }
    }
}

#[test]
fn unit_clause_is_core() {
    let mig = build_mig(&named(vec![vec![1]]), &Monitor::new(), None).unwrap();
    assert!(mig.is_core(1));
    assert!(mig.is_dead(-1));
    assert!(!mig.is_core(2) && !mig.is_dead(2));
}

#[test]
fn contradiction_makes_everything_dead() {
    let mig = build_mig(&named(vec![vec![1], vec![-1]]), &Monitor::new(), None).unwrap();

    assert!(mig.is_void());
    for variable in 1..=3 {
        assert!(mig.is_dead(variable));
        assert!(mig.is_core(-variable));
    }
    assert!(mig.strong_edge_set().is_empty());
}

#[test]
fn binary_clause_implies_in_one_direction() {
    let mig = build_mig(&named(vec![vec![-1, 2]]), &Monitor::new(), None).unwrap();

    assert!(mig.implies(1, 2));
    assert!(mig.implies(-2, -1));
    assert!(!mig.implies(2, 1));
    assert!(mig.strong_edge_set().contains(&LiteralSet::new(vec![-1, 2])));
}

#[test]
fn removed_clause_takes_its_edge_along() {
    let mig = full(&named(vec![vec![-1, 2], vec![-2, 3]]));
    assert!(mig.implies(1, 3));

    let mig = incremental(mig, &named(vec![vec![-2, 3]]));
    assert!(!mig.implies(1, 2));
    assert!(!mig.implies(1, 3));
    assert!(mig.implies(2, 3));

    // still derivable through C
    let mig = full(&named(vec![vec![-1, 3], vec![-3, 2], vec![-1, 2]]));
    let mig = incremental(mig, &named(vec![vec![-1, 3], vec![-3, 2]]));
    assert!(mig.implies(1, 2));
    assert!(mig
        .transitive_strong_edges()
        .contains(&LiteralSet::new(vec![-1, 2])));
}

#[test]
fn graph_of_a_feature_model() {
    let cnf = read_cnf(Path::new("./tests/data/small.cnf")).unwrap();
    let mig = full(&cnf);

    assert_eq!(mig.core_dead(), LiteralSet::new(vec![1, 2]));
    // Electric and Combustion are alternatives once the engine is core
    assert!(mig.implies(3, -4));
    assert!(mig.implies(-3, 4));
    assert!(!mig.implies(5, 3));

    let statistics = mig.statistics();
    assert_eq!(statistics.variables.core, 2);
    assert_eq!(statistics.clauses.complex, 0);
}

#[test]
fn incremental_builds_equal_full_builds() {
    let mut rng = rng(2024);

    for _ in 0..25 {
        let mut cnf = random_cnf(&mut rng, 10, 18, 2, 4);
        let mut mig = full(&cnf);

        for _ in 0..4 {
            let mut clauses = cnf.clauses().to_vec();
            for _ in 0..rng.gen_range(0..=3) {
                if !clauses.is_empty() {
                    clauses.remove(rng.gen_range(0..clauses.len()));
                }
            }
            for _ in 0..rng.gen_range(0..=3) {
                clauses.push(random_clause(&mut rng, 10, 1, 4));
            }
            cnf = Cnf::with_clauses(cnf.variables().clone(), clauses).unwrap();

            mig = incremental(mig, &cnf);
            assert_same_graph(&mig, &full(&cnf));
        }
    }
}

#[test]
fn redundant_clauses_are_entailed() {
    let mut rng = rng(99);

    for _ in 0..25 {
        let cnf = random_cnf(&mut rng, 10, 25, 2, 4);
        let mig = full(&cnf);
        if mig.is_void() {
            continue;
        }

        // the graph itself: non-redundant cleaned clauses plus the facts
        let mut kept: Vec<LiteralSet> = mig
            .clean_clauses()
            .iter()
            .filter(|clause| !mig.is_redundant(clause))
            .cloned()
            .collect();
        kept.extend(mig.core_dead().iter().map(|literal| LiteralSet::new(vec![literal])));
        let kept = Cnf::with_clauses(cnf.variables().clone(), kept).unwrap();

        for clause in mig.redundant_clauses() {
            assert!(entails(&kept, clause.literals()), "{clause} is not redundant");
            assert!(clause.len() > 2);
        }

        for edge in mig.strong_edge_set() {
            assert!(entails(&cnf, edge.literals()), "{edge} is not entailed");
        }
    }
}

#[test]
fn incremental_builds_adopt_new_variables() {
    let mig = full(&named(vec![vec![-1, 2]]));

    let grown = Cnf::with_clauses(
        Variables::from_names(["A", "B", "C", "D"]).unwrap(),
        vec![LiteralSet::new(vec![-1, 2]), LiteralSet::new(vec![-2, 4])],
    )
    .unwrap();
    let mig = incremental(mig, &grown);

    assert_eq!(mig.num_variables(), 4);
    assert!(mig.implies(1, 4));
}

#[test]
fn probes_cut_off_by_the_solver_timeout_are_skipped() {
    // -1 | 2 is entailed by the first two clauses, the third one is redundant
    let cnf = Cnf::from(vec![
        vec![-1, 2, 3],
        vec![-1, 2, -3],
        vec![-1, 2, 3, 4],
        vec![3, -4],
    ]);
    let complete = full(&cnf);
    assert!(complete.is_redundant(&LiteralSet::new(vec![-1, 2, 3, 4])));
    assert!(complete.implies(1, 2));

    let mut builder = MigBuilder::new(cnf.clone()).with_solver_timeout(Some(Duration::ZERO));
    let mig = InlineExecutor.run(&mut builder, &Monitor::new()).unwrap();

    assert!(builder.timeouts() > 0);
    assert!(!mig.is_void());
    assert!(mig.redundant_clauses().is_empty());
    assert!(mig.implicit_strong_edges().is_empty());
    assert!(!mig.implies(1, 2));
    assert!(mig.implies(4, 3));
    for edge in mig.strong_edge_set() {
        assert!(entails(&cnf, edge.literals()), "{edge} is not entailed");
    }

    // a later run without the timeout finds the skipped strong edges
    let mig = incremental(mig, &cnf);
    assert_same_graph(&mig, &complete);
}

#[test]
fn cancelled_builds_stop_early() {
    let cnf = random_cnf(&mut rng(11), 600, 2550, 3, 3);
    let monitor = Monitor::new();
    let token = monitor.token().clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        token.cancel();
    });

    let result = InlineExecutor.run(&mut MigBuilder::new(cnf), &monitor);
    canceller.join().unwrap();

    assert!(matches!(result, Err(AnalysisError::Cancelled)));
}

#[test]
fn unfinished_runs_hand_back_the_predecessor() {
    let previous = full(&named(vec![vec![-1, 2]]));
    let mut builder = IncrementalMigBuilder::new(previous.clone(), named(vec![vec![-2, 3]]));

    let expired = Monitor::new().with_deadline(Instant::now());
    assert!(matches!(
        builder.execute(&expired),
        Err(AnalysisError::Timeout)
    ));

    let recovered = builder.take_previous().unwrap();
    assert!(recovered.implies(1, 2));
    assert_eq!(recovered.strong_edge_set(), previous.strong_edge_set());
    assert!(matches!(
        builder.execute(&Monitor::new()),
        Err(AnalysisError::AlreadyExecuted)
    ));

    // a successful run retires the predecessor
    let mut builder = IncrementalMigBuilder::new(recovered, named(vec![vec![-2, 3]]));
    let mig = builder.execute(&Monitor::new()).unwrap();
    assert!(mig.implies(2, 3));
    assert!(builder.take_previous().is_none());
}
