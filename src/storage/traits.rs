//! Storage traits.
//!
//! Scorers only read: a measure lookup per (tuple, kind) and a family lookup
//! per scoring unit. Both are shared across worker threads.

use crate::measures::MeasureKind;
use crate::tuple::TupleId;
use crate::witness::WitnessFamily;

/// Read access to precomputed tuple-level measures.
pub trait MeasureSource: Send + Sync {
    /// Measure `kind` of `tuple`, or `None` when no row exists.
    fn measure(&self, tuple: &TupleId, kind: MeasureKind) -> Option<f64>;
}

/// Read access to witness-set families.
pub trait WitnessSource: Send + Sync {
    /// Family of `unit_id`, if any witness row named it.
    fn family(&self, unit_id: &str) -> Option<&WitnessFamily>;

    /// Every unit id, sorted.
    fn unit_ids(&self) -> Vec<&str>;
}

/// Output rows with a uniqueness key.
///
/// Writers refuse to emit two rows with the same key.
pub trait KeyedRow {
    /// Key identifying the row within its table.
    fn row_key(&self) -> String;
}
