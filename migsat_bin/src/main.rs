use clap::{Parser, Subcommand};
use log::{error, info};
use migsat::analyzer::{AnalysisCache, Constraint, FeatureModelFormula, FormulaAnalyzer};
use migsat::job::{get_result, Monitor};
use migsat::mig::{IncrementalMigBuilder, MigBuilder, ModalImplicationGraph};
use migsat::parser::read_cnf;
use migsat::util::format_vec;
use migsat::AnalysisConfig;
use migsat_cnf::{Cnf, CnfError};
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::{stdout, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "migsat", version, arg_required_else_help(true))]
struct Cli {
    /// Input path of a CNF in DIMACS format.
    /// Comments of the form 'c <id> <name>' name the variables.
    #[arg(short, long, verbatim_doc_comment)]
    input: String,

    /// Output path, stdout when not given.
    #[arg(short, long, verbatim_doc_comment)]
    output: Option<String>,

    /// Path to a JSON file with the analysis configuration.
    /// Missing entries keep their default values.
    #[arg(short, long, verbatim_doc_comment)]
    config: Option<String>,

    /// Bound of the whole analysis in milliseconds.
    /// The analysis runs without a bound when not given.
    #[arg(short, long, verbatim_doc_comment)]
    timeout: Option<u64>,

    /// Choose one of the available
    #[clap(subcommand)]
    operation: Operation,
}

#[derive(Debug, Clone, Subcommand)]
enum Operation {
    /// Decides whether the formula has a model.
    Valid,
    /// Computes the core features.
    Core,
    /// Computes the dead features.
    Dead,
    /// Computes the features that are neither core nor dead.
    Common,
    /// Computes all atomic sets.
    /// The first line holds the core and dead features as literals.
    #[clap(verbatim_doc_comment)]
    AtomicSets,
    /// Computes the optional features that are selected whenever their parent is.
    FalseOptional {
        /// Optional features with their parents, given by name as CHILD:PARENT.
        #[arg(long, num_args = 1.., value_parser = parse_optional, verbatim_doc_comment)]
        optional: Vec<(String, String)>,
    },
    /// Computes void, contradictory, redundant and tautology constraints.
    /// The input is the tree, every constraint is read from its own file.
    #[clap(verbatim_doc_comment)]
    Constraints {
        /// Paths to CNF files, one per constraint.
        /// Variables are matched with the tree by name.
        #[arg(long, num_args = 1.., verbatim_doc_comment)]
        constraint: Vec<String>,
    },
    /// Computes core, dead, false-optional features, atomic sets and anomalous constraints.
    Anomalies {
        /// Paths to CNF files, one per constraint.
        #[arg(long, num_args = 0.., verbatim_doc_comment)]
        constraint: Vec<String>,
        /// Optional features with their parents, given by name as CHILD:PARENT.
        #[arg(long, num_args = 0.., value_parser = parse_optional, verbatim_doc_comment)]
        optional: Vec<(String, String)>,
    },
    /// Builds the modal implication graph and prints its statistics as JSON.
    Mig,
    /// Builds the modal implication graph of a previous version of the formula,
    /// then updates it incrementally to the input and prints its statistics as JSON.
    #[clap(verbatim_doc_comment)]
    Incremental {
        /// Path to the previous version of the formula.
        #[arg(short, long, verbatim_doc_comment)]
        previous: String,
    },
}

#[derive(Debug, Serialize)]
struct ConstraintReport {
    void: Option<Vec<String>>,
    contradictory: Option<Vec<String>>,
    redundant: Option<Vec<String>>,
    tautology: Option<Vec<String>>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    pretty_env_logger::init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => AnalysisConfig::default(),
    };
    let timeout = cli.timeout.map(Duration::from_millis);

    let time = Instant::now();
    let cnf = read_cnf(Path::new(&cli.input))?;
    info!(
        "Parsed {} variables and {} clauses in {:.3}s.",
        cnf.num_variables(),
        cnf.clauses().len(),
        time.elapsed().as_secs_f32()
    );

    let mut writer: Box<dyn Write> = if let Some(path) = &cli.output {
        Box::new(BufWriter::new(File::create(path)?))
    } else {
        Box::new(BufWriter::new(stdout()))
    };

    let time = Instant::now();
    let mut cache = AnalysisCache::new();
    let analyzer = |constraints, optional: &[(String, String)]| {
        formula_analyzer(&cnf, config, constraints, optional)
    };

    match &cli.operation {
        Operation::Valid => {
            let valid = analyzer(Vec::new(), &[])?.is_valid(&mut cache, &Monitor::new(), timeout);
            writeln!(writer, "{}", finished(valid)?)?;
        }
        Operation::Core => {
            let core = analyzer(Vec::new(), &[])?.get_core_features(
                &mut cache,
                &Monitor::new(),
                timeout,
            );
            writeln!(writer, "{}", format_vec(finished(core)?.iter()))?;
        }
        Operation::Dead => {
            let dead = analyzer(Vec::new(), &[])?.get_dead_features(
                &mut cache,
                &Monitor::new(),
                timeout,
            );
            writeln!(writer, "{}", format_vec(finished(dead)?.iter()))?;
        }
        Operation::Common => {
            let common = analyzer(Vec::new(), &[])?.get_common_features(
                &mut cache,
                &Monitor::new(),
                timeout,
            );
            writeln!(writer, "{}", format_vec(finished(common)?.iter()))?;
        }
        Operation::AtomicSets => {
            let atomic_sets =
                analyzer(Vec::new(), &[])?.get_atomic_sets(&mut cache, &Monitor::new(), timeout);
            for set in finished(atomic_sets)? {
                writeln!(writer, "{}", format_vec(set.iter()))?;
            }
        }
        Operation::FalseOptional { optional } => {
            let false_optional = analyzer(Vec::new(), optional.as_slice())?
                .get_false_optional_features(&mut cache, &Monitor::new(), timeout);
            writeln!(writer, "{}", format_vec(finished(false_optional)?.iter()))?;
        }
        Operation::Constraints { constraint } => {
            let analyzer = analyzer(read_constraints(constraint)?, &[])?;
            let names = |indices: Option<Vec<usize>>| {
                indices.map(|indices| {
                    indices
                        .into_iter()
                        .map(|index| analyzer.formula().constraints()[index].name.clone())
                        .collect()
                })
            };

            let monitor = Monitor::new();
            let report = ConstraintReport {
                void: names(analyzer.get_void_constraints(&mut cache, &monitor, timeout)),
                contradictory: names(analyzer.get_contradictory_constraints(
                    &mut cache, &monitor, timeout,
                )),
                redundant: names(analyzer.get_redundant_constraints(&mut cache, &monitor, timeout)),
                tautology: names(analyzer.get_tautology_constraints(&mut cache, &monitor, timeout)),
            };
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writeln!(writer)?;
        }
        // anomalies are: core, dead, false-optional features, atomic sets and anomalous constraints
        Operation::Anomalies {
            constraint,
            optional,
        } => {
            analyzer(read_constraints(constraint)?, optional.as_slice())?.write_anomalies(
                &mut cache,
                &mut writer,
                timeout,
            )?;
        }
        Operation::Mig => {
            let mig = get_result(
                MigBuilder::new(cnf.clone()).with_config(&config),
                &Monitor::new(),
                timeout,
            );
            write_statistics(&mut writer, &finished(mig)?)?;
        }
        Operation::Incremental { previous } => {
            let previous = read_cnf(Path::new(previous))?;
            let previous_mig = get_result(
                MigBuilder::new(previous).with_config(&config),
                &Monitor::new(),
                timeout,
            );
            info!(
                "Built the previous graph in {:.3}s.",
                time.elapsed().as_secs_f32()
            );

            let time = Instant::now();
            let mig = get_result(
                IncrementalMigBuilder::new(finished(previous_mig)?, cnf.clone())
                    .with_config(&config),
                &Monitor::new(),
                timeout,
            );
            info!(
                "Updated the graph incrementally in {:.3}s.",
                time.elapsed().as_secs_f32()
            );
            write_statistics(&mut writer, &finished(mig)?)?;
        }
    }

    info!(
        "Elapsed time for the analysis in seconds: {:.3}s.",
        time.elapsed().as_secs_f32()
    );

    writer.flush()?;
    Ok(())
}

fn formula_analyzer(
    cnf: &Cnf,
    config: AnalysisConfig,
    constraints: Vec<Constraint>,
    optional: &[(String, String)],
) -> Result<FormulaAnalyzer, CnfError> {
    let formula =
        FeatureModelFormula::new(0, cnf.clone(), constraints)?.with_optional_features(optional)?;
    Ok(FormulaAnalyzer::new(formula).with_config(config))
}

/// Parses an optional feature and its parent given as CHILD:PARENT.
fn parse_optional(value: &str) -> Result<(String, String), String> {
    match value.split_once(':') {
        Some((child, parent)) if !child.is_empty() && !parent.is_empty() => {
            Ok((child.to_string(), parent.to_string()))
        }
        _ => Err(format!("expected CHILD:PARENT, got '{value}'")),
    }
}

/// Reads each constraint from its own file, named after the file.
fn read_constraints(paths: &[String]) -> Result<Vec<Constraint>, Box<dyn Error>> {
    paths
        .iter()
        .map(|path| {
            let path = Path::new(path);
            let name = path.file_stem().map_or_else(
                || path.display().to_string(),
                |stem| stem.to_string_lossy().into_owned(),
            );
            Ok(Constraint::new(name, read_cnf(path)?))
        })
        .collect()
}

fn finished<T>(result: Option<T>) -> Result<T, Box<dyn Error>> {
    result.ok_or_else(|| "the analysis did not finish, it timed out or failed".into())
}

fn write_statistics(
    writer: &mut impl Write,
    mig: &ModalImplicationGraph,
) -> Result<(), Box<dyn Error>> {
    serde_json::to_writer_pretty(&mut *writer, &mig.statistics())?;
    writeln!(writer)?;
    Ok(())
}
