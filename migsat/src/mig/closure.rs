use super::vertex::{index, literal};
use super::ModalImplicationGraph;
use bitvec::prelude::*;
use migsat_cnf::LiteralSet;
use std::collections::HashSet;

const IN_PROGRESS: u8 = 1;
const COMPLETED: u8 = 2;

/// Depth-first reachability over a frozen adjacency.
///
/// Every vertex carries a two-bit mark: in progress while it is on the search stack and completed
/// once all of its successors are expanded. Marks only live for one root, so the closure of each
/// literal is computed exactly once per root, independent of the order edges were discovered in.
struct Reachability {
    adjacency: Vec<Vec<usize>>,
    marks: Vec<u8>,
    touched: Vec<usize>,
    stack: Vec<(usize, usize)>,
}

impl Reachability {
    fn new(adjacency: Vec<Vec<usize>>) -> Self {
        let size = adjacency.len();
        Self {
            adjacency,
            marks: vec![0; size],
            touched: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// All vertices reachable from `root` by at least one edge, in discovery order.
    fn reach(&mut self, root: usize) -> Vec<usize> {
        self.touched.iter().for_each(|&vertex| self.marks[vertex] = 0);
        self.touched.clear();

        let mut reached = Vec::new();
        self.enter(root);

        while let Some((vertex, position)) = self.stack.pop() {
            match self.adjacency[vertex].get(position).copied() {
                Some(next) => {
                    self.stack.push((vertex, position + 1));
                    if self.marks[next] == 0 {
                        reached.push(next);
                        self.enter(next);
                    }
                }
                None => {
                    self.marks[vertex] &= !IN_PROGRESS;
                    self.marks[vertex] |= COMPLETED;
                }
            }
        }

        reached
    }

    fn enter(&mut self, vertex: usize) {
        self.marks[vertex] |= IN_PROGRESS;
        self.touched.push(vertex);
        self.stack.push((vertex, 0));
    }
}

/// All transitive strong edges `-a | b` with `b` reachable from `a` over strong edges
/// but not directly connected to it.
pub(super) fn transitive_strong_edges(mig: &ModalImplicationGraph) -> Vec<LiteralSet> {
    let adjacency: Vec<Vec<usize>> = mig
        .vertices()
        .iter()
        .map(|vertex| vertex.strong_edges().map(index).collect())
        .collect();
    let mut reachability = Reachability::new(adjacency);
    let mut edges = Vec::new();

    for root in 0..mig.vertices().len() {
        let from = literal(root);
        let direct = mig.vertices()[root].strong_edges.clone();

        for to in reachability.reach(root).into_iter().map(literal) {
            if to != from && to != -from && !direct.contains(&to) {
                edges.push(LiteralSet::pair(-from, to));
            }
        }
    }

    edges
}

/// All transitive weak edges `-a | b` with `b` reachable from `a` over strong and weak edges
/// by a path of at least two edges, excluding pairs that are strong edges.
pub(super) fn transitive_weak_edges(mig: &ModalImplicationGraph) -> HashSet<LiteralSet> {
    let size = mig.vertices().len();
    let adjacency: Vec<Vec<usize>> = (0..size)
        .map(|vertex| {
            let from = literal(vertex);
            let mut targets: Vec<usize> = mig
                .strong_targets(from)
                .chain(mig.weak_targets(from))
                .map(index)
                .collect();
            targets.sort_unstable();
            targets.dedup();
            targets
        })
        .collect();

    let mut direct = bitvec![0; size];
    let mut reachability = Reachability::new(adjacency.clone());
    let mut edges = HashSet::new();

    for root in 0..size {
        let from = literal(root);
        adjacency[root].iter().for_each(|&next| direct.set(next, true));

        for reached in reachability.reach(root) {
            let to = literal(reached);
            if direct[reached] || to == from || to == -from {
                continue;
            }
            if mig.vertices()[root].strong_edges.contains(&to) {
                continue;
            }
            edges.insert(LiteralSet::pair(-from, to));
        }

        adjacency[root].iter().for_each(|&next| direct.set(next, false));
    }

    edges
}
