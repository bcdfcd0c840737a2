use crate::{Literal, Variable};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// How the literals of a [LiteralSet] are laid out.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// Insertion order.
    #[default]
    Unordered,
    /// Sorted ascending by value, without duplicates.
    Natural,
    /// A model: the literal of variable `v` sits at position `v - 1`, `0` marks an unset variable.
    Index,
}

/// A set of literals, used for clauses, models and results.
///
/// Equality, ordering and hashing only look at the contained literals, never at the layout,
/// so two clauses written in a different order are the same clause.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LiteralSet {
    literals: Vec<Literal>,
    order: Order,
}

impl LiteralSet {
    /// Creates a set keeping the insertion order. Repeated literals are only kept once.
    pub fn new(literals: Vec<Literal>) -> Self {
        let mut unique = Vec::with_capacity(literals.len());
        for literal in literals {
            if !unique.contains(&literal) {
                unique.push(literal);
            }
        }

        Self {
            literals: unique,
            order: Order::Unordered,
        }
    }

    /// Creates a set with the given layout.
    pub fn with_order(literals: Vec<Literal>, order: Order) -> Self {
        match order {
            Order::Unordered => Self::new(literals),
            Order::Natural => {
                let mut literals = literals;
                literals.sort_unstable();
                literals.dedup();
                literals.retain(|&literal| literal != 0);
                Self { literals, order }
            }
            Order::Index => Self { literals, order },
        }
    }

    /// Wraps an index-ordered model.
    pub fn from_model(model: Vec<Literal>) -> Self {
        Self::with_order(model, Order::Index)
    }

    /// A binary clause, naturally ordered.
    pub fn pair(first: Literal, second: Literal) -> Self {
        Self::with_order(vec![first, second], Order::Natural)
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn into_literals(self) -> Vec<Literal> {
        self.literals
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Iterates over all set literals, skipping unset positions of a model.
    pub fn iter(&self) -> impl Iterator<Item = Literal> + '_ {
        self.literals
            .iter()
            .copied()
            .filter(|&literal| literal != 0)
    }

    /// The number of set literals.
    pub fn len(&self) -> usize {
        match self.order {
            Order::Index => self.iter().count(),
            _ => self.literals.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Changes the layout in place. Converting into [Order::Index] is not supported
    /// and keeps the current layout.
    pub fn set_order(&mut self, order: Order) {
        match (self.order, order) {
            (from, to) if from == to => (),
            (_, Order::Natural) => {
                self.literals.retain(|&literal| literal != 0);
                self.literals.sort_unstable();
                self.literals.dedup();
                self.order = Order::Natural;
            }
            (Order::Index, Order::Unordered) => {
                self.literals.retain(|&literal| literal != 0);
                self.order = Order::Unordered;
            }
            (_, Order::Unordered) => self.order = Order::Unordered,
            (_, Order::Index) => (),
        }
    }

    /// Flips the sign of every literal. The layout is kept, a natural order gets re-sorted.
    pub fn negate(&self) -> LiteralSet {
        let negated = self.literals.iter().map(|literal| -literal).collect();
        match self.order {
            Order::Natural => Self::with_order(negated, Order::Natural),
            order => Self {
                literals: negated,
                order,
            },
        }
    }

    /// The positive literals of all variables that occur in this set.
    pub fn variables(&self) -> LiteralSet {
        Self::with_order(
            self.iter().map(|literal| literal.abs()).collect(),
            Order::Natural,
        )
    }

    pub fn contains(&self, literal: Literal) -> bool {
        literal != 0
            && match self.order {
                Order::Natural => self.literals.binary_search(&literal).is_ok(),
                Order::Index => self
                    .literals
                    .get(literal.unsigned_abs() as usize - 1)
                    .is_some_and(|&set| set == literal),
                Order::Unordered => self.literals.contains(&literal),
            }
    }

    pub fn contains_variable(&self, variable: Variable) -> bool {
        let variable = variable as Literal;
        self.contains(variable) || self.contains(-variable)
    }

    pub fn contains_all(&self, other: &LiteralSet) -> bool {
        other.iter().all(|literal| self.contains(literal))
    }

    pub fn contains_any(&self, other: &LiteralSet) -> bool {
        other.iter().any(|literal| self.contains(literal))
    }

    pub fn count_negative(&self) -> usize {
        self.iter().filter(|literal| literal.is_negative()).count()
    }

    pub fn count_positive(&self) -> usize {
        self.iter().filter(|literal| literal.is_positive()).count()
    }

    /// Whether some variable occurs in both polarities. A clause with conflicts is a tautology.
    pub fn has_conflicts(&self) -> bool {
        self.iter().any(|literal| self.contains(-literal))
    }

    /// All literals that do not occur in `other`.
    pub fn without(&self, other: &LiteralSet) -> LiteralSet {
        let literals = self
            .iter()
            .filter(|&literal| !other.contains(literal))
            .collect();
        Self::with_order(literals, self.flat_order())
    }

    /// All literals whose variable occurs in `variables`.
    pub fn retain_variables(&self, variables: &LiteralSet) -> LiteralSet {
        let literals = self
            .iter()
            .filter(|&literal| variables.contains_variable(literal.unsigned_abs()))
            .collect();
        Self::with_order(literals, self.flat_order())
    }

    /// Zeroes every position of `model` where it disagrees with `other`.
    /// Both slices are index-ordered models.
    pub fn reset_conflicts(model: &mut [Literal], other: &[Literal]) {
        model
            .iter_mut()
            .zip(other.iter())
            .filter(|(set, other)| *set != *other)
            .for_each(|(set, _)| *set = 0);
    }

    // The set literals in ascending order. Used for every comparison.
    fn canonical(&self) -> Cow<'_, [Literal]> {
        match self.order {
            Order::Natural => Cow::Borrowed(&self.literals),
            _ => {
                let mut literals: Vec<Literal> = self.iter().collect();
                literals.sort_unstable();
                literals.dedup();
                Cow::Owned(literals)
            }
        }
    }

    fn flat_order(&self) -> Order {
        match self.order {
            Order::Index => Order::Unordered,
            order => order,
        }
    }
}

impl PartialEq for LiteralSet {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for LiteralSet {}

impl Hash for LiteralSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state)
    }
}

impl PartialOrd for LiteralSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LiteralSet {
    /// Shorter sets first, then lexicographically by their sorted literals.
    fn cmp(&self, other: &Self) -> Ordering {
        let (left, right) = (self.canonical(), other.canonical());
        left.len().cmp(&right.len()).then_with(|| left.cmp(&right))
    }
}

impl Display for LiteralSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        self.iter().try_for_each(|literal| {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{literal}")
        })
    }
}

impl From<Vec<Literal>> for LiteralSet {
    fn from(literals: Vec<Literal>) -> Self {
        Self::new(literals)
    }
}

impl From<&[Literal]> for LiteralSet {
    fn from(literals: &[Literal]) -> Self {
        Self::new(literals.to_vec())
    }
}

impl FromIterator<Literal> for LiteralSet {
    fn from_iter<T: IntoIterator<Item = Literal>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
