//! Tabular inputs and outputs of the attribution engine.
//!
//! The engine reads witness-set rows, tuple measure rows, and answer
//! metadata, and writes tuple measures, ICQA scores, and hitting-set
//! diagnostics. The traits describe what the scorers need from a backend;
//! the in-memory stores are the only backend, fed by the JSON-lines codec.

pub mod jsonl;
mod memory;
mod rows;
mod traits;

pub use memory::{MeasureTable, WitnessStore};
pub use rows::{AnswerRow, GammaRow, IcqaRow, MeasureRow, TupleMeasureRow, WitnessRow};
pub use traits::{KeyedRow, MeasureSource, WitnessSource};
