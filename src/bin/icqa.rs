//! icqa command-line driver.
//!
//! Reads and writes JSON-lines tables:
//! - icqa measures --witnesses <mis.jsonl> --out <measures.jsonl> [--gamma-out <gamma.jsonl>]
//! - icqa answers --supports <supports.jsonl> --answers <answers.jsonl> --measures <measures.jsonl> --out <icqa.jsonl>

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use icqa::storage::{jsonl, AnswerRow, MeasureRow, WitnessRow};
use icqa::{AggregatorKind, EngineConfig, IcqaResult, MeasureKind, MeasureTable, Pipeline, WitnessStore};

/// Tuple-level inconsistency measures and inconsistency-aware answer scores
#[derive(Parser, Debug)]
#[command(name = "icqa")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute tuple measures from constraint MIS rows
    Measures {
        /// Witness rows of the denial constraints
        #[arg(long)]
        witnesses: PathBuf,

        /// Output tuple-measure rows
        #[arg(long)]
        out: PathBuf,

        /// Output hitting-set diagnostics (RIM only)
        #[arg(long)]
        gamma_out: Option<PathBuf>,

        /// Constraints to include; all when omitted
        #[arg(long, value_delimiter = ',')]
        constraints: Vec<String>,

        /// Measures to compute
        #[arg(long, value_delimiter = ',', default_value = "CBM,CIM,PIM,RIM")]
        measures: Vec<MeasureKind>,
    },

    /// Score query answers
    Answers {
        /// Witness rows of the answers' minimal supports
        #[arg(long)]
        supports: PathBuf,

        /// Answer metadata rows
        #[arg(long)]
        answers: PathBuf,

        /// Tuple-measure rows
        #[arg(long)]
        measures: PathBuf,

        /// Output ICQA rows
        #[arg(long)]
        out: PathBuf,

        /// Measure kinds to aggregate
        #[arg(long, value_delimiter = ',', default_value = "CBM,CIM,PIM,RIM")]
        kinds: Vec<MeasureKind>,

        /// Aggregators to apply
        #[arg(long, value_delimiter = ',', default_value = "prov,resp,shap")]
        aggregators: Vec<AggregatorKind>,
    },
}

fn run(cli: Cli) -> IcqaResult<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let pipeline = Pipeline::new(config)?;

    match cli.command {
        Command::Measures {
            witnesses,
            out,
            gamma_out,
            constraints,
            measures,
        } => {
            let rows: Vec<WitnessRow> = jsonl::read_file(&witnesses)?;
            let store = WitnessStore::from_rows(rows)?;
            let run = pipeline.tuple_measures(&store, &constraints, &measures)?;
            jsonl::write_file(&out, &run.table.rows())?;
            if let Some(path) = gamma_out {
                jsonl::write_file(&path, &run.gamma)?;
            }
        }
        Command::Answers {
            supports,
            answers,
            measures,
            out,
            kinds,
            aggregators,
        } => {
            let support_rows: Vec<WitnessRow> = jsonl::read_file(&supports)?;
            let answer_rows: Vec<AnswerRow> = jsonl::read_file(&answers)?;
            let measure_rows: Vec<MeasureRow> = jsonl::read_file(&measures)?;

            let store = WitnessStore::from_rows(support_rows)?;
            let table = MeasureTable::from_rows(measure_rows)?;
            let run = pipeline.answers(&store, &answer_rows, table, &kinds, &aggregators)?;
            jsonl::write_file(&out, &run.rows)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("icqa=info")))
        .with_target(false)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "icqa failed");
            eprintln!("error: {err}");
            // 2 for rejected input, 1 for failures while scoring.
            if err.is_validation() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
