use migsat::parser::{parse_cnf, read_cnf};
use migsat::ParseError;
use migsat_cnf::LiteralSet;
use std::io::Write;
use std::path::Path;

#[test]
fn cnf_parsing_test() {
    let cnf = read_cnf(Path::new("./tests/data/small.cnf")).unwrap();

    assert_eq!(cnf.num_variables(), 5);
    assert_eq!(cnf.clauses().len(), 8);
    assert_eq!(cnf.variables().variable("Combustion"), Some(4));
    assert_eq!(cnf.variables().name(5), Some("Radio"));
    assert!(cnf.clauses().contains(&LiteralSet::new(vec![-2, 3, 4])));
}

#[test]
fn written_cnf_is_read_back() {
    let cnf = read_cnf(Path::new("./tests/data/small.cnf")).unwrap();

    let mut file = tempfile::Builder::new().suffix(".cnf").tempfile().unwrap();
    write!(file, "{cnf}").unwrap();
    file.flush().unwrap();

    assert_eq!(read_cnf(file.path()).unwrap(), cnf);
}

#[test]
fn missing_files() {
    assert!(matches!(
        read_cnf(Path::new("./tests/data/does_not_exist.cnf")),
        Err(ParseError::Io(_))
    ));
}

#[test]
fn header_mismatch_is_tolerated() {
    // the header announces more clauses than there are
    let cnf = parse_cnf("p cnf 3 5\n1 -2 0\n2 3 0\n").unwrap();
    assert_eq!(cnf.clauses().len(), 2);
    assert_eq!(cnf.variables().name(3), Some("3"));
}
