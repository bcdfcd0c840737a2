use crate::Cnf;
use std::fmt::{Display, Formatter};

/// The DIMACS problem line `p cnf <variables> <clauses>`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Header {
    pub num_variables: u32,
    pub num_clauses: usize,
}

impl From<&Cnf> for Header {
    fn from(cnf: &Cnf) -> Self {
        Self {
            num_variables: cnf.variables().size(),
            num_clauses: cnf.clauses().len(),
        }
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "p cnf {} {}", self.num_variables, self.num_clauses)
    }
}
