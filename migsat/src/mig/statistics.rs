use super::ModalImplicationGraph;
use serde::Serialize;

/// Various statistics about a modal implication graph.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Statistics {
    /// The amount of variables and their core/dead status.
    pub variables: VariableCount,
    /// The amount of strong edges per origin.
    pub strong_edges: StrongEdges,
    /// The clauses the graph was built from.
    pub clauses: ClauseCount,
    /// Out-degree information over strong edges.
    pub degrees: Degrees,
}

impl From<&ModalImplicationGraph> for Statistics {
    fn from(mig: &ModalImplicationGraph) -> Self {
        Self {
            variables: VariableCount::from(mig),
            strong_edges: StrongEdges::from(mig),
            clauses: ClauseCount::from(mig),
            degrees: Degrees::from(mig),
        }
    }
}

impl ModalImplicationGraph {
    /// Generates various statistics about this graph.
    pub fn statistics(&self) -> Statistics {
        Statistics::from(self)
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VariableCount {
    pub total: u32,
    pub core: usize,
    pub dead: usize,
    pub void: bool,
}

impl From<&ModalImplicationGraph> for VariableCount {
    fn from(mig: &ModalImplicationGraph) -> Self {
        let facts = mig.core_dead();

        Self {
            total: mig.num_variables(),
            core: facts.count_positive(),
            dead: facts.count_negative(),
            void: mig.is_void(),
        }
    }
}

/// The amount of strong edges, each edge counted once as a binary clause.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StrongEdges {
    pub total: usize,
    pub explicit: usize,
    pub implicit: usize,
    pub transitive: usize,
    /// Transitive weak edges, only collected when implicit edges are searched for.
    pub transitive_weak: usize,
}

impl From<&ModalImplicationGraph> for StrongEdges {
    fn from(mig: &ModalImplicationGraph) -> Self {
        Self {
            total: mig.strong_edge_set().len(),
            explicit: mig.explicit_strong_edges().len(),
            implicit: mig.implicit_strong_edges().len(),
            transitive: mig.transitive_strong_edges().len(),
            transitive_weak: mig.transitive_weak_edges().len(),
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClauseCount {
    /// Clauses left after removing core and dead literals.
    pub clean: usize,
    /// Clauses of three or more literals that are part of the graph.
    pub complex: usize,
    pub redundant: usize,
}

impl From<&ModalImplicationGraph> for ClauseCount {
    fn from(mig: &ModalImplicationGraph) -> Self {
        Self {
            clean: mig.clean_clauses().len(),
            complex: mig.complex_clauses().count(),
            redundant: mig.redundant_clauses().len(),
        }
    }
}

/// Out-degree information of the literals over strong edges.
#[derive(Default, Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Degrees {
    /// Literals that imply at least one other literal.
    pub connected: usize,
    pub max: usize,
    pub mean: f64,
}

impl From<&ModalImplicationGraph> for Degrees {
    fn from(mig: &ModalImplicationGraph) -> Self {
        let degrees: Vec<usize> = mig
            .vertices()
            .iter()
            .map(|vertex| vertex.strong_edges().count())
            .collect();

        if degrees.is_empty() {
            return Self::default();
        }

        Self {
            connected: degrees.iter().filter(|&&degree| degree > 0).count(),
            max: degrees.iter().copied().max().unwrap_or(0),
            mean: degrees.iter().sum::<usize>() as f64 / degrees.len() as f64,
        }
    }
}
