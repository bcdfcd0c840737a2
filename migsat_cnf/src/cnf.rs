#[path = "cnf/header.rs"]
mod header;
#[path = "cnf/literal_set.rs"]
mod literal_set;
#[path = "cnf/variables.rs"]
mod variables;

pub use header::Header;
pub use literal_set::{LiteralSet, Order};
pub use variables::Variables;

use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A 1-based variable id.
pub type Variable = u32;
/// A signed variable id. The sign is the polarity.
pub type Literal = i32;

/// Structural errors of the formula model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CnfError {
    #[error("variable '{name}' does not exist in the target universe")]
    UnknownVariable { name: String },
    #[error("literal {literal} is out of range for {size} variables")]
    VariableOutOfRange { literal: Literal, size: u32 },
    #[error("variable name '{0}' is used twice")]
    DuplicateName(String),
    #[error("0 terminates a clause and is no literal")]
    ZeroLiteral,
}

/// A formula in conjunctive normal form over a fixed variable universe.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Cnf {
    variables: Variables,
    clauses: Vec<LiteralSet>,
}

impl Cnf {
    /// Creates an empty (tautological) formula over the given universe.
    pub fn new(variables: Variables) -> Self {
        Self {
            variables,
            clauses: Vec::new(),
        }
    }

    /// Creates a formula and checks that every literal belongs to the universe.
    pub fn with_clauses(variables: Variables, clauses: Vec<LiteralSet>) -> Result<Self, CnfError> {
        let mut cnf = Self::new(variables);
        for clause in clauses {
            cnf.add_clause(clause)?;
        }
        Ok(cnf)
    }

    /// Creates an unsatisfiable formula over one variable.
    pub fn contradiction() -> Self {
        Self {
            variables: Variables::with_count(1),
            clauses: vec![LiteralSet::new(vec![1]), LiteralSet::new(vec![-1])],
        }
    }

    /// Creates a formula over one variable with exactly one model.
    pub fn tautology() -> Self {
        Self {
            variables: Variables::with_count(1),
            clauses: vec![LiteralSet::new(vec![1])],
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn clauses(&self) -> &[LiteralSet] {
        &self.clauses
    }

    pub fn num_variables(&self) -> u32 {
        self.variables.size()
    }

    pub fn add_clause(&mut self, clause: LiteralSet) -> Result<(), CnfError> {
        // a model keeps 0 for unassigned variables, every other layout holds literals only
        if clause.order() != Order::Index && clause.literals().contains(&0) {
            return Err(CnfError::ZeroLiteral);
        }

        let size = self.variables.size();
        if let Some(literal) = clause
            .iter()
            .find(|literal| literal.unsigned_abs() > size)
        {
            return Err(CnfError::VariableOutOfRange { literal, size });
        }

        self.clauses.push(clause);
        Ok(())
    }

    /// Remaps this formula onto `universe` by variable name.
    ///
    /// The universe may be larger than the current one, new variables stay unconstrained.
    /// Fails if a variable of this formula has no counterpart in `universe`.
    pub fn adapt(&self, universe: &Variables) -> Result<Cnf, CnfError> {
        let mut mapping = Vec::with_capacity(self.variables.size() as usize + 1);
        mapping.push(0);

        for name in self.variables.names() {
            let variable = universe
                .variable(name)
                .ok_or_else(|| CnfError::UnknownVariable {
                    name: name.to_string(),
                })?;
            mapping.push(variable as Literal);
        }

        let clauses = self
            .clauses
            .iter()
            .map(|clause| {
                clause
                    .iter()
                    .map(|literal| literal.signum() * mapping[literal.unsigned_abs() as usize])
                    .collect::<LiteralSet>()
            })
            .collect();

        Ok(Cnf {
            variables: universe.clone(),
            clauses,
        })
    }

    /// Conjoins another formula over the same or a smaller universe.
    pub fn extend(&mut self, other: &Cnf) -> Result<(), CnfError> {
        let other = other.adapt(&self.variables)?;
        self.clauses.extend(other.clauses);
        Ok(())
    }
}

impl Display for Cnf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Header::from(self))?;

        self.variables
            .names()
            .enumerate()
            .try_for_each(|(index, name)| write!(f, "\nc {} {name}", index + 1))?;

        self.clauses.iter().try_for_each(|clause| {
            writeln!(f)?;
            clause
                .iter()
                .try_for_each(|literal| write!(f, "{literal} "))?;
            write!(f, "0")
        })
    }
}

impl FromIterator<Vec<Literal>> for Cnf {
    fn from_iter<T: IntoIterator<Item = Vec<Literal>>>(iter: T) -> Self {
        // trailing DIMACS terminators are dropped
        let clauses: Vec<LiteralSet> = iter
            .into_iter()
            .map(|clause| clause.into_iter().filter(|&literal| literal != 0).collect())
            .collect();
        let num_variables = clauses
            .iter()
            .flat_map(LiteralSet::iter)
            .map(|literal| literal.unsigned_abs())
            .max()
            .unwrap_or(0);

        Cnf {
            variables: Variables::with_count(num_variables),
            clauses,
        }
    }
}

impl From<Vec<Vec<Literal>>> for Cnf {
    fn from(value: Vec<Vec<Literal>>) -> Self {
        value.into_iter().collect()
    }
}
