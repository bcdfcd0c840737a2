pub mod cnf_lexer;

use crate::error::ParseError;
use cnf_lexer::{lex_cnf_line, CnfToken};
use log::warn;
use migsat_cnf::{Cnf, LiteralSet, Variables};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Parses a CNF file in DIMACS format, referenced by the file path.
///
/// Comments of the form `c <id> <name>` name the variables, all other variables are named by their id.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use migsat::parser;
///
/// let cnf = parser::read_cnf(Path::new("./tests/data/small.cnf")).unwrap();
/// assert_eq!(cnf.num_variables(), 5);
/// ```
pub fn read_cnf(path: &Path) -> Result<Cnf, ParseError> {
    parse_cnf(&fs::read_to_string(path)?)
}

/// Parses the content of a DIMACS CNF file.
pub fn parse_cnf(input: &str) -> Result<Cnf, ParseError> {
    let mut header = None;
    let mut names = BTreeMap::new();
    let mut clauses = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let token = match lex_cnf_line(line) {
            Ok((_, token)) => token,
            Err(_) => {
                return Err(ParseError::Malformed {
                    line: index + 1,
                    content: line.to_string(),
                })
            }
        };

        match token {
            CnfToken::Header {
                total_variables,
                total_clauses,
            } => header = Some((total_variables, total_clauses)),
            CnfToken::Name { variable, name } => {
                names.insert(variable, name);
            }
            CnfToken::Comment => (),
            CnfToken::Clause { literals } => {
                if header.is_none() {
                    return Err(ParseError::MissingHeader);
                }
                clauses.push(LiteralSet::new(literals));
            }
            CnfToken::End => break,
        }
    }

    let (total_variables, total_clauses) = header.ok_or(ParseError::MissingHeader)?;
    if total_clauses != clauses.len() as u64 {
        warn!(
            "header announces {total_clauses} clauses, but {} were found",
            clauses.len()
        );
    }

    // names of variables beyond the header are treated as plain comments
    let variables = Variables::from_names((1..=total_variables).map(|variable| {
        names
            .remove(&variable)
            .unwrap_or_else(|| variable.to_string())
    }))?;

    Ok(Cnf::with_clauses(variables, clauses)?)
}
