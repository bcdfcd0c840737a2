use migsat_cnf::Literal;
use serde::Serialize;
use std::collections::BTreeSet;

/// One literal of the implication graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Vertex {
    literal: Literal,
    core: bool,
    dead: bool,
    /// Literals implied by selecting this one.
    pub(super) strong_edges: BTreeSet<Literal>,
    /// Slots of the complex clauses containing the negation of this literal.
    pub(super) complex_clauses: BTreeSet<usize>,
}

impl Vertex {
    pub(super) fn new(literal: Literal) -> Self {
        Self {
            literal,
            ..Default::default()
        }
    }

    pub fn literal(&self) -> Literal {
        self.literal
    }

    pub fn is_core(&self) -> bool {
        self.core
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Neither core nor dead.
    pub fn is_normal(&self) -> bool {
        !self.core && !self.dead
    }

    pub(super) fn set_core(&mut self) {
        self.core = true;
        self.dead = false;
    }

    pub(super) fn set_dead(&mut self) {
        self.core = false;
        self.dead = true;
    }

    pub(super) fn reset(&mut self) {
        self.core = false;
        self.dead = false;
    }

    pub fn strong_edges(&self) -> impl Iterator<Item = Literal> + '_ {
        self.strong_edges.iter().copied()
    }

    pub fn complex_clauses(&self) -> impl Iterator<Item = usize> + '_ {
        self.complex_clauses.iter().copied()
    }
}

/// The position of a literal in the vertex array: `2 * (|l| - 1)`, plus one for positive literals.
#[inline]
pub fn index(literal: Literal) -> usize {
    let base = 2 * (literal.unsigned_abs() as usize - 1);
    if literal > 0 {
        base + 1
    } else {
        base
    }
}

/// The inverse of [index].
#[inline]
pub fn literal(index: usize) -> Literal {
    let variable = (index / 2 + 1) as Literal;
    if index % 2 == 1 {
        variable
    } else {
        -variable
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_indices() {
        assert_eq!(index(-1), 0);
        assert_eq!(index(1), 1);
        assert_eq!(index(-3), 4);
        assert_eq!(index(3), 5);

        for literal in [-7, -1, 1, 4] {
            assert_eq!(super::literal(index(literal)), literal);
        }
    }

    #[test]
    fn core_and_dead_exclude_each_other() {
        let mut vertex = Vertex::new(2);
        vertex.set_core();
        vertex.set_dead();

        assert!(vertex.is_dead());
        assert!(!vertex.is_core());

        vertex.reset();
        assert!(vertex.is_normal());
    }
}
