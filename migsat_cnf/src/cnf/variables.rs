use crate::{CnfError, Literal, LiteralSet, Variable};
use bimap::BiHashMap;

/// The variable universe of a formula: a bijection between 1-based ids and feature names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Variables {
    names: BiHashMap<Variable, String>,
}

impl Variables {
    /// Creates a universe with ids `1..=n` assigned in iteration order.
    pub fn from_names<I, S>(names: I) -> Result<Self, CnfError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut variables = Self::default();

        for name in names {
            variables.push(name.into())?;
        }

        Ok(variables)
    }

    /// Creates an anonymous universe of `count` variables, each named after its id.
    pub fn with_count(count: u32) -> Self {
        Self {
            names: (1..=count).map(|id| (id, id.to_string())).collect(),
        }
    }

    /// The number of variables. Ids are always `1..=size`.
    pub fn size(&self) -> u32 {
        self.names.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, variable: Variable) -> Option<&str> {
        self.names.get_by_left(&variable).map(String::as_str)
    }

    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.names.get_by_right(name).copied()
    }

    /// The literal of the named variable with the given polarity.
    pub fn literal(&self, name: &str, positive: bool) -> Option<Literal> {
        self.variable(name).map(|variable| {
            let literal = variable as Literal;
            if positive {
                literal
            } else {
                -literal
            }
        })
    }

    /// All names in id order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        (1..=self.size()).filter_map(|variable| self.name(variable))
    }

    /// Appends a new variable with the next free id.
    pub fn push(&mut self, name: String) -> Result<Variable, CnfError> {
        let variable = self.size() + 1;
        self.names
            .insert_no_overwrite(variable, name)
            .map_err(|(_, name)| CnfError::DuplicateName(name))?;
        Ok(variable)
    }

    /// Renames an existing variable.
    pub fn rename(&mut self, variable: Variable, name: String) -> Result<(), CnfError> {
        if variable == 0 || variable > self.size() {
            return Err(CnfError::VariableOutOfRange {
                literal: variable as Literal,
                size: self.size(),
            });
        }

        if let Some(other) = self.variable(&name) {
            if other != variable {
                return Err(CnfError::DuplicateName(name));
            }
        }

        self.names.insert(variable, name);
        Ok(())
    }

    /// The union of both universes. Every id of `self` is kept and names only known to
    /// `other` are appended in their id order.
    pub fn merge(&self, other: &Variables) -> Variables {
        let mut merged = self.clone();

        for name in other.names() {
            if merged.variable(name).is_none() {
                let variable = merged.size() + 1;
                merged.names.insert(variable, name.to_string());
            }
        }

        merged
    }

    /// Whether every name of `other` is also known here.
    pub fn contains_all(&self, other: &Variables) -> bool {
        other.names().all(|name| self.variable(name).is_some())
    }

    /// Maps the literals of a set to feature names, dropping the sign.
    pub fn to_names(&self, literals: &LiteralSet) -> Vec<String> {
        literals
            .iter()
            .filter_map(|literal| self.name(literal.unsigned_abs()))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let variables = Variables::from_names(["Root", "A", "B"]).unwrap();

        assert_eq!(variables.size(), 3);
        assert_eq!(variables.variable("A"), Some(2));
        assert_eq!(variables.name(3), Some("B"));
        assert_eq!(variables.literal("B", false), Some(-3));
        assert_eq!(variables.names().collect::<Vec<_>>(), vec!["Root", "A", "B"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert_eq!(
            Variables::from_names(["A", "A"]),
            Err(CnfError::DuplicateName("A".to_string()))
        );
    }

    #[test]
    fn merge_keeps_ids() {
        let old = Variables::from_names(["Root", "A", "B"]).unwrap();
        let new = Variables::from_names(["C", "B", "Root"]).unwrap();
        let merged = old.merge(&new);

        assert_eq!(merged.size(), 4);
        assert_eq!(merged.variable("B"), Some(3));
        assert_eq!(merged.variable("C"), Some(4));
        assert!(merged.contains_all(&old));
        assert!(merged.contains_all(&new));
        assert!(!old.contains_all(&new));
    }

    #[test]
    fn rename_anonymous() {
        let mut variables = Variables::with_count(2);
        assert_eq!(variables.name(2), Some("2"));

        variables.rename(2, "B".to_string()).unwrap();
        assert_eq!(variables.variable("B"), Some(2));
        assert!(variables.rename(3, "C".to_string()).is_err());
        assert!(variables.rename(1, "B".to_string()).is_err());
    }
}
