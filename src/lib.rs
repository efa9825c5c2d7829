//! # icqa - Inconsistency attribution and inconsistency-aware query answering
//!
//! Given the minimal inconsistent sets (MIS) of a set of denial constraints,
//! this crate assigns every involved tuple a nonnegative blame score, and
//! given the minimal supports of query answers, it combines those tuple
//! scores into a per-answer inconsistency score.
//!
//! ## Core Concepts
//!
//! - **Witness set**: a minimal set of tuples that jointly violates a
//!   constraint (an MIS) or jointly derives an answer (a minimal support)
//! - **Hypergraph**: the witness sets of one scoring unit, over dense indices
//! - **Responsibility**: ρ(t) = 1 / (1 + h*), with h* the minimum hitting-set
//!   size of the witness sets that avoid t
//! - **Shapley value**: the share of t in the covering game of the witness sets
//! - **Exactness**: every weight and score says whether it was proven exact
//!
//! ## Usage
//!
//! ```rust,ignore
//! use icqa::{AggregatorKind, EngineConfig, MeasureKind, Pipeline, WitnessStore};
//! use icqa::storage::jsonl;
//!
//! let pipeline = Pipeline::new(EngineConfig::default())?;
//! let store = WitnessStore::from_rows(jsonl::read_file(path)?)?;
//! let run = pipeline.tuple_measures(&store, &[], &MeasureKind::ALL)?;
//! jsonl::write_file(out, &run.table.rows())?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

// Core types
pub mod error;
pub mod exactness;
pub mod tuple;
pub mod witness;

// Attribution engine
pub mod hitting_set;
pub mod hypergraph;
pub mod icqa;
pub mod measures;
pub mod responsibility;
pub mod shapley;

// Orchestration
pub mod config;
pub mod pipeline;
pub mod runtime;
pub mod storage;

pub use config::EngineConfig;
pub use error::{ExecutionError, IcqaError, IcqaResult, ValidationError};
pub use exactness::Exactness;
pub use hitting_set::{HittingSetCache, HittingSetSolution, HittingSetSolver, SolveStatus};
pub use hypergraph::{Edge, Hypergraph};
pub use icqa::{AggregatorKind, AnswerScore, IcqaScorer, ScoredAnswer};
pub use measures::{GammaRecord, MeasureKind, TupleScores, WeightTables};
pub use pipeline::{AnswerRun, MeasureRun, Pipeline, RunSummary};
pub use responsibility::{ResponsibilityEngine, ResponsibilityProfile};
pub use runtime::{ScoringHandle, ScoringRuntime};
pub use shapley::{ShapleyConfig, ShapleyEngine, ShapleyMode, ShapleyValues};
pub use storage::{MeasureTable, WitnessStore};
pub use tuple::{PrimaryKey, TupleId};
pub use witness::{Answer, ConstraintFamilies, WitnessFamily, WitnessSet};
