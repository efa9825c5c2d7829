//! Row types of the input and output tables.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::exactness::Exactness;
use crate::icqa::AggregatorKind;
use crate::measures::{GammaRecord, MeasureKind};
use crate::storage::KeyedRow;
use crate::tuple::{PrimaryKey, TupleId};

/// Ids may be written as JSON strings or integers.
fn string_or_int<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected string or integer id, got {other}"))),
    }
}

/// One member tuple of one witness set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessRow {
    /// Constraint name or answer id.
    #[serde(deserialize_with = "string_or_int")]
    pub unit_id: String,
    /// Witness set within the unit.
    #[serde(deserialize_with = "string_or_int")]
    pub witness_id: String,
    /// Relation the member tuple belongs to.
    pub relation: String,
    /// Member tuple key within `relation`.
    pub primary_key: PrimaryKey,
}

impl WitnessRow {
    /// Tuple identity of this row.
    pub fn tuple(&self) -> Result<TupleId, ValidationError> {
        TupleId::new(self.relation.as_str(), self.primary_key.clone())
    }
}

/// One tuple-level measure value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleMeasureRow {
    pub relation: String,
    pub primary_key: PrimaryKey,
    pub measure: MeasureKind,
    /// Nonnegative measure value.
    pub value: f64,
}

/// Measure rows are read back in the shape they were written.
pub type MeasureRow = TupleMeasureRow;

impl KeyedRow for TupleMeasureRow {
    fn row_key(&self) -> String {
        format!("{}:{}/{}", self.relation, self.primary_key, self.measure)
    }
}

/// Query and rendered value of one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRow {
    /// Answer id; matches the `unit_id` of its support rows.
    #[serde(deserialize_with = "string_or_int")]
    pub unit_id: String,
    /// Query name, e.g. `Q3`.
    pub query: String,
    /// Rendered answer value, kept verbatim.
    #[serde(deserialize_with = "string_or_int")]
    pub answer_value: String,
}

impl KeyedRow for AnswerRow {
    fn row_key(&self) -> String {
        self.unit_id.clone()
    }
}

/// One ICQA score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcqaRow {
    pub unit_id: String,
    pub query: String,
    pub answer_value: String,
    /// Tuple measure aggregated over the answer's supports.
    pub measure: MeasureKind,
    pub aggregator: AggregatorKind,
    pub score: f64,
    /// Whether `score` is exact or an approximation.
    pub exactness: Exactness,
}

impl KeyedRow for IcqaRow {
    fn row_key(&self) -> String {
        format!("{}/{}/{}", self.unit_id, self.measure, self.aggregator)
    }
}

/// Hitting-set diagnostics are written as-is.
pub type GammaRow = GammaRecord;

impl KeyedRow for GammaRecord {
    fn row_key(&self) -> String {
        format!("{}/{}", self.constraint, self.tuple)
    }
}
