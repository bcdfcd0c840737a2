use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, i32, not_line_ending, space0, space1, u32, u64},
    combinator::{eof, map, value, verify},
    multi::many0,
    sequence::{preceded, separated_pair, terminated},
    IResult, Parser,
};

/// A classification for the different kinds of lines a DIMACS CNF file contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CnfToken {
    /// The head of a CNF file of the format `p cnf #VARIABLES #CLAUSES`.
    Header {
        total_variables: u32,
        total_clauses: u64,
    },
    /// A comment of the format `c <id> <name>` naming a variable.
    Name { variable: u32, name: String },
    /// Any other comment. It starts with a `c`.
    Comment,
    /// A clause that consists of a sequence of signed numbers terminated by `0`.
    Clause { literals: Vec<i32> },
    /// The `%` some benchmark files end with. Everything after it is ignored.
    End,
}

use CnfToken::*;

/// Lexes a single line. The whole line has to be consumed, trailing whitespace aside.
#[inline]
pub fn lex_cnf_line(line: &str) -> IResult<&str, CnfToken> {
    terminated(
        alt((lex_header, lex_name, lex_comment, lex_end, lex_clause)),
        (space0, eof),
    )
    .parse(line)
}

// lexes the head of a CNF file of the format p cnf #VARIABLES #CLAUSES
fn lex_header(line: &str) -> IResult<&str, CnfToken> {
    map(
        preceded(
            (tag("p"), space1, tag("cnf"), space1),
            separated_pair(u32, space1, u64),
        ),
        |(total_variables, total_clauses)| Header {
            total_variables,
            total_clauses,
        },
    )
    .parse(line)
}

// a comment that maps a positive variable id to a name
fn lex_name(line: &str) -> IResult<&str, CnfToken> {
    map(
        preceded(
            (char('c'), space1),
            separated_pair(
                verify(u32, |variable: &u32| *variable > 0),
                space1,
                verify(not_line_ending, |name: &str| !name.trim().is_empty()),
            ),
        ),
        |(variable, name): (u32, &str)| Name {
            variable,
            name: name.trim_end().to_string(),
        },
    )
    .parse(line)
}

fn lex_comment(line: &str) -> IResult<&str, CnfToken> {
    value(Comment, preceded(char('c'), not_line_ending)).parse(line)
}

fn lex_end(line: &str) -> IResult<&str, CnfToken> {
    value(End, preceded(char('%'), not_line_ending)).parse(line)
}

// a sequence of non-zero signed numbers each followed by whitespace, then the terminating 0
fn lex_clause(line: &str) -> IResult<&str, CnfToken> {
    map(
        terminated(
            many0(terminated(verify(i32, |literal: &i32| *literal != 0), space1)),
            char('0'),
        ),
        |literals| Clause { literals },
    )
    .parse(line)
}
