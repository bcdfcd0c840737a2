//! The modal implication graph: per-literal core/dead flags plus strong and weak implication edges.

pub mod builder;
mod closure;
pub mod incremental;
pub mod statistics;
pub mod vertex;

pub use builder::MigBuilder;
pub use incremental::IncrementalMigBuilder;
pub use statistics::Statistics;
pub use vertex::Vertex;

use migsat_cnf::{Literal, LiteralSet, Order, Variables};
use std::collections::{HashMap, HashSet};
use vertex::index;

/// Where a strong edge comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A binary clause of the cleaned formula.
    Explicit,
    /// A binary clause entailed by the formula but not part of it.
    Implicit,
    /// Derived by transitivity from explicit and implicit edges.
    Transitive,
}

/// A modal implication graph over a fixed variable universe.
///
/// A strong edge `a -> b` is stored as the clause `-a | b`, so every edge is entailed by the formula.
/// Complex clauses (three or more literals) give weak edges: selecting `a` with `-a` in a complex
/// clause makes the remaining literals of that clause weakly implied.
#[derive(Debug, Clone, Default)]
pub struct ModalImplicationGraph {
    variables: Variables,
    vertices: Vec<Vertex>,
    complex_clauses: Vec<Option<LiteralSet>>,
    complex_index: HashMap<LiteralSet, usize>,
    free_slots: Vec<usize>,
    explicit_edges: HashSet<LiteralSet>,
    implicit_edges: HashSet<LiteralSet>,
    transitive_edges: HashSet<LiteralSet>,
    transitive_weak_edges: HashSet<LiteralSet>,
    clean_clauses: HashSet<LiteralSet>,
    redundant_clauses: HashSet<LiteralSet>,
    strong_detected: bool,
    void: bool,
}

impl ModalImplicationGraph {
    /// A graph without edges or facts, the predecessor of every initial build.
    pub fn empty(variables: Variables) -> Self {
        let mut mig = Self::default();
        mig.resize(variables);
        mig
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn num_variables(&self) -> u32 {
        self.variables.size()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// The vertex of `literal`.
    ///
    /// # Panics
    ///
    /// Panics if the literal is zero or outside of the variable universe.
    pub fn vertex(&self, literal: Literal) -> &Vertex {
        &self.vertices[index(literal)]
    }

    pub fn is_core(&self, literal: Literal) -> bool {
        self.vertex(literal).is_core()
    }

    pub fn is_dead(&self, literal: Literal) -> bool {
        self.vertex(literal).is_dead()
    }

    /// Whether the formula the graph was built from has no model.
    pub fn is_void(&self) -> bool {
        self.void
    }

    /// All core variables as positive and all dead variables as negative literals.
    pub fn core_dead(&self) -> LiteralSet {
        LiteralSet::with_order(
            (1..=self.num_variables() as Literal)
                .filter_map(|variable| {
                    if self.is_core(variable) {
                        Some(variable)
                    } else if self.is_dead(variable) {
                        Some(-variable)
                    } else {
                        None
                    }
                })
                .collect(),
            Order::Natural,
        )
    }

    /// Whether selecting `from` forces `to` without consulting a solver.
    pub fn implies(&self, from: Literal, to: Literal) -> bool {
        from == to
            || self.is_core(to)
            || self.is_dead(from)
            || self.vertex(from).strong_edges.contains(&to)
    }

    /// The literals strongly implied by `literal`.
    pub fn strong_targets(&self, literal: Literal) -> impl Iterator<Item = Literal> + '_ {
        self.vertex(literal).strong_edges()
    }

    /// The literals weakly implied by `literal` through complex clauses.
    pub fn weak_targets(&self, literal: Literal) -> impl Iterator<Item = Literal> + '_ {
        self.vertex(literal)
            .complex_clauses()
            .filter_map(|slot| self.complex_clauses[slot].as_ref())
            .flat_map(move |clause| clause.iter().filter(move |&other| other != -literal))
    }

    pub fn complex_clauses(&self) -> impl Iterator<Item = &LiteralSet> + '_ {
        self.complex_clauses.iter().flatten()
    }

    pub fn explicit_strong_edges(&self) -> &HashSet<LiteralSet> {
        &self.explicit_edges
    }

    pub fn implicit_strong_edges(&self) -> &HashSet<LiteralSet> {
        &self.implicit_edges
    }

    pub fn transitive_strong_edges(&self) -> &HashSet<LiteralSet> {
        &self.transitive_edges
    }

    pub fn transitive_weak_edges(&self) -> &HashSet<LiteralSet> {
        &self.transitive_weak_edges
    }

    /// Every strong edge as a binary clause, whatever its origin.
    pub fn strong_edge_set(&self) -> HashSet<LiteralSet> {
        self.explicit_edges
            .iter()
            .chain(self.implicit_edges.iter())
            .chain(self.transitive_edges.iter())
            .cloned()
            .collect()
    }

    /// The cleaned clauses of the formula the graph was built from, redundant ones included.
    pub fn clean_clauses(&self) -> &HashSet<LiteralSet> {
        &self.clean_clauses
    }

    /// Cleaned clauses that are entailed by the other non-redundant clauses and therefore not part of the graph.
    pub fn redundant_clauses(&self) -> &HashSet<LiteralSet> {
        &self.redundant_clauses
    }

    pub fn is_redundant(&self, clause: &LiteralSet) -> bool {
        self.redundant_clauses.contains(clause)
    }

    /// Grows the graph to a universe that keeps all existing ids.
    pub(crate) fn resize(&mut self, variables: Variables) {
        let size = 2 * variables.size() as usize;
        let current = self.vertices.len();
        self.vertices
            .extend((current..size).map(|index| Vertex::new(vertex::literal(index))));
        self.variables = variables;
    }

    pub(crate) fn set_facts(&mut self, facts: &LiteralSet) {
        self.void = false;
        self.vertices.iter_mut().for_each(Vertex::reset);

        for literal in facts.iter() {
            self.vertices[index(literal)].set_core();
            self.vertices[index(-literal)].set_dead();
        }
    }

    /// Turns the graph into the one of a formula without models: every variable is dead, no edges remain.
    pub(crate) fn set_void(&mut self) {
        let variables = self.variables.clone();
        *self = Self::empty(variables);
        self.void = true;

        for variable in 1..=self.num_variables() as Literal {
            self.vertices[index(variable)].set_dead();
            self.vertices[index(-variable)].set_core();
        }
    }

    pub(crate) fn set_clean_clauses(&mut self, clean: HashSet<LiteralSet>) {
        self.clean_clauses = clean;
    }

    pub(crate) fn set_strong_detected(&mut self, detected: bool) {
        self.strong_detected = detected;
    }

    pub(crate) fn strong_detected(&self) -> bool {
        self.strong_detected
    }

    pub(crate) fn mark_redundant(&mut self, clause: LiteralSet) {
        self.remove_clause(&clause);
        self.redundant_clauses.insert(clause);
    }

    pub(crate) fn unmark_redundant(&mut self, clause: &LiteralSet) -> bool {
        self.redundant_clauses.remove(clause)
    }

    /// Inserts a clause of the cleaned formula: binary clauses become explicit strong edges,
    /// longer ones complex clauses.
    pub(crate) fn add_clause(&mut self, clause: &LiteralSet) {
        match clause.len() {
            0 | 1 => (),
            2 => self.add_strong_edge(clause, EdgeKind::Explicit),
            _ => self.add_complex_clause(clause),
        }
    }

    /// Removes a clause inserted by [Self::add_clause].
    pub(crate) fn remove_clause(&mut self, clause: &LiteralSet) {
        match clause.len() {
            0 | 1 => (),
            2 => self.remove_strong_edge(clause, EdgeKind::Explicit),
            _ => self.remove_complex_clause(clause),
        }
    }

    pub(crate) fn add_strong_edge(&mut self, edge: &LiteralSet, kind: EdgeKind) {
        let (first, second) = match edge.literals() {
            [first, second] => (*first, *second),
            _ => return,
        };

        let mut edge = edge.clone();
        edge.set_order(Order::Natural);
        if !self.edges_mut(kind).insert(edge) {
            return;
        }

        self.vertices[index(-first)].strong_edges.insert(second);
        self.vertices[index(-second)].strong_edges.insert(first);
    }

    pub(crate) fn remove_strong_edge(&mut self, edge: &LiteralSet, kind: EdgeKind) {
        let (first, second) = match edge.literals() {
            [first, second] => (*first, *second),
            _ => return,
        };

        if !self.edges_mut(kind).remove(edge) {
            return;
        }

        let still_present = self.explicit_edges.contains(edge)
            || self.implicit_edges.contains(edge)
            || self.transitive_edges.contains(edge);

        if !still_present {
            self.vertices[index(-first)].strong_edges.remove(&second);
            self.vertices[index(-second)].strong_edges.remove(&first);
        }
    }

    /// Drops every derived edge. They are recomputed by the closure after each build.
    pub(crate) fn clear_transitive(&mut self) {
        let transitive: Vec<LiteralSet> = self.transitive_edges.iter().cloned().collect();
        transitive
            .iter()
            .for_each(|edge| self.remove_strong_edge(edge, EdgeKind::Transitive));
        self.transitive_weak_edges.clear();
    }

    /// Drops all implicit edges and hands them back for revalidation.
    pub(crate) fn take_implicit(&mut self) -> Vec<LiteralSet> {
        let implicit: Vec<LiteralSet> = self.implicit_edges.iter().cloned().collect();
        implicit
            .iter()
            .for_each(|edge| self.remove_strong_edge(edge, EdgeKind::Implicit));
        implicit
    }

    pub(crate) fn set_transitive_weak_edges(&mut self, edges: HashSet<LiteralSet>) {
        self.transitive_weak_edges = edges;
    }

    fn add_complex_clause(&mut self, clause: &LiteralSet) {
        if self.complex_index.contains_key(clause) {
            return;
        }

        let mut clause = clause.clone();
        clause.set_order(Order::Natural);

        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.complex_clauses[slot] = Some(clause.clone());
                slot
            }
            None => {
                self.complex_clauses.push(Some(clause.clone()));
                self.complex_clauses.len() - 1
            }
        };

        for literal in clause.iter() {
            self.vertices[index(-literal)].complex_clauses.insert(slot);
        }
        self.complex_index.insert(clause, slot);
    }

    fn remove_complex_clause(&mut self, clause: &LiteralSet) {
        if let Some(slot) = self.complex_index.remove(clause) {
            for literal in clause.iter() {
                self.vertices[index(-literal)].complex_clauses.remove(&slot);
            }
            self.complex_clauses[slot] = None;
            self.free_slots.push(slot);
        }
    }

    fn edges_mut(&mut self, kind: EdgeKind) -> &mut HashSet<LiteralSet> {
        match kind {
            EdgeKind::Explicit => &mut self.explicit_edges,
            EdgeKind::Implicit => &mut self.implicit_edges,
            EdgeKind::Transitive => &mut self.transitive_edges,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mig(variables: u32) -> ModalImplicationGraph {
        ModalImplicationGraph::empty(Variables::with_count(variables))
    }

    #[test]
    fn binary_clauses_are_strong_edges() {
        let mut mig = mig(2);
        mig.add_clause(&LiteralSet::new(vec![-1, 2]));

        assert!(mig.implies(1, 2));
        assert!(mig.implies(-2, -1));
        assert!(!mig.implies(2, 1));
        assert_eq!(mig.strong_targets(1).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn shared_edges_survive_partial_removal() {
        let mut mig = mig(2);
        let edge = LiteralSet::new(vec![-1, 2]);
        mig.add_strong_edge(&edge, EdgeKind::Explicit);
        mig.add_strong_edge(&edge, EdgeKind::Transitive);

        mig.remove_strong_edge(&edge, EdgeKind::Explicit);
        assert!(mig.implies(1, 2));

        mig.clear_transitive();
        assert!(!mig.implies(1, 2));
        assert!(mig.strong_edge_set().is_empty());
    }

    #[test]
    fn complex_clauses_are_weak_edges() {
        let mut mig = mig(3);
        let clause = LiteralSet::new(vec![-1, 2, 3]);
        mig.add_clause(&clause);

        let mut targets: Vec<Literal> = mig.weak_targets(1).collect();
        targets.sort();
        assert_eq!(targets, vec![2, 3]);
        assert_eq!(mig.weak_targets(-2).collect::<Vec<_>>(), vec![-1, 3]);
        assert_eq!(mig.weak_targets(2).count(), 0);

        mig.remove_clause(&clause);
        assert_eq!(mig.complex_clauses().count(), 0);

        mig.add_clause(&LiteralSet::new(vec![1, 2, 3]));
        assert_eq!(mig.complex_clauses().count(), 1);
        assert_eq!(mig.complex_clauses.len(), 1);
    }

    #[test]
    fn facts_and_void() {
        let mut mig = mig(2);
        mig.set_facts(&LiteralSet::new(vec![1, -2]));

        assert!(mig.is_core(1));
        assert!(mig.is_dead(-1));
        assert!(mig.is_dead(2));
        assert_eq!(mig.core_dead(), LiteralSet::new(vec![1, -2]));
        assert!(mig.implies(2, 1));

        mig.add_clause(&LiteralSet::new(vec![1, 2]));
        mig.set_void();
        assert!(mig.is_void());
        assert_eq!(mig.core_dead(), LiteralSet::new(vec![-1, -2]));
        assert!(mig.strong_edge_set().is_empty());
    }

    #[test]
    fn resize_keeps_content() {
        let mut mig = mig(1);
        mig.set_facts(&LiteralSet::new(vec![1]));
        mig.resize(Variables::with_count(3));

        assert_eq!(mig.vertices().len(), 6);
        assert!(mig.is_core(1));
        assert_eq!(mig.vertex(-3).literal(), -3);
    }
}
