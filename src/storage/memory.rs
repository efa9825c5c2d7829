//! In-memory stores.
//!
//! Both stores are built once from rows and then only read, so they are
//! shared between workers behind an `Arc` without locking.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::ValidationError;
use crate::measures::{MeasureKind, TupleScores};
use crate::storage::rows::{AnswerRow, MeasureRow, TupleMeasureRow, WitnessRow};
use crate::storage::traits::{KeyedRow, MeasureSource, WitnessSource};
use crate::tuple::TupleId;
use crate::witness::{Answer, ConstraintFamilies, WitnessFamily, WitnessSet};

/// Tuple-level measures keyed by tuple, then kind.
#[derive(Debug, Clone, Default)]
pub struct MeasureTable {
    values: BTreeMap<TupleId, BTreeMap<MeasureKind, f64>>,
    len: usize,
}

impl MeasureTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from measure rows, rejecting repeated (tuple, kind) keys.
    pub fn from_rows(rows: impl IntoIterator<Item = MeasureRow>) -> Result<Self, ValidationError> {
        let mut table = Self::new();
        for row in rows {
            let tuple = TupleId::new(row.relation, row.primary_key)?;
            table.insert(tuple, row.measure, row.value)?;
        }
        Ok(table)
    }

    /// Inserts one value.
    ///
    /// Measures are nonnegative reals; NaN, infinities and negative values
    /// are rejected.
    pub fn insert(&mut self, tuple: TupleId, kind: MeasureKind, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                what: format!("{kind} of {tuple}"),
            });
        }
        if value < 0.0 {
            return Err(ValidationError::NegativeValue {
                what: format!("{kind} of {tuple}"),
                value,
            });
        }
        let key = format!("{tuple}/{kind}");
        let by_kind = self.values.entry(tuple).or_default();
        if by_kind.contains_key(&kind) {
            return Err(ValidationError::DuplicateKey { key });
        }
        by_kind.insert(kind, value);
        self.len += 1;
        Ok(())
    }

    /// Inserts every score of one measure.
    pub fn extend_scores(&mut self, kind: MeasureKind, scores: &TupleScores) -> Result<(), ValidationError> {
        for (tuple, &value) in scores {
            self.insert(tuple.clone(), kind, value)?;
        }
        Ok(())
    }

    /// Number of (tuple, measure) values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no value has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All values as rows, sorted by relation, key, then measure.
    #[must_use]
    pub fn rows(&self) -> Vec<TupleMeasureRow> {
        self.values
            .iter()
            .flat_map(|(tuple, by_kind)| {
                by_kind.iter().map(move |(&measure, &value)| TupleMeasureRow {
                    relation: tuple.relation.clone(),
                    primary_key: tuple.key.clone(),
                    measure,
                    value,
                })
            })
            .collect()
    }
}

impl MeasureSource for MeasureTable {
    fn measure(&self, tuple: &TupleId, kind: MeasureKind) -> Option<f64> {
        self.values.get(tuple)?.get(&kind).copied()
    }
}

/// Witness-set families grouped from witness rows.
#[derive(Debug, Clone, Default)]
pub struct WitnessStore {
    families: ConstraintFamilies,
}

impl WitnessStore {
    /// Groups rows by unit id, then by witness id.
    ///
    /// Witness sets keep the order in which their id first appeared.
    pub fn from_rows(rows: impl IntoIterator<Item = WitnessRow>) -> Result<Self, ValidationError> {
        #[derive(Default)]
        struct Grouping {
            order: Vec<String>,
            members: HashMap<String, Vec<TupleId>>,
        }

        let mut units: BTreeMap<String, Grouping> = BTreeMap::new();
        for row in rows {
            let tuple = row.tuple()?;
            let unit = units.entry(row.unit_id).or_default();
            let members = unit.members.entry(row.witness_id.clone()).or_insert_with(|| {
                unit.order.push(row.witness_id);
                Vec::new()
            });
            members.push(tuple);
        }

        let mut families = ConstraintFamilies::new();
        for (unit_id, mut grouping) in units {
            let mut family = WitnessFamily::new(unit_id.clone());
            for witness_id in grouping.order {
                let members = grouping.members.remove(&witness_id).unwrap_or_default();
                family.push(WitnessSet::new(&unit_id, Some(witness_id), members)?);
            }
            families.insert(unit_id, family);
        }
        Ok(Self { families })
    }

    /// Wraps already-built families.
    #[must_use]
    pub fn from_families(families: ConstraintFamilies) -> Self {
        Self { families }
    }

    /// All families keyed by unit id.
    #[must_use]
    pub fn families(&self) -> &ConstraintFamilies {
        &self.families
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Joins answer metadata with support families.
    ///
    /// Answers without any witness row get an empty family and score zero.
    pub fn answers(&self, rows: &[AnswerRow]) -> Result<Vec<Answer>, ValidationError> {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut answers = Vec::with_capacity(rows.len());
        for row in rows {
            if !seen.insert(row.row_key()) {
                return Err(ValidationError::DuplicateKey { key: row.row_key() });
            }
            let family = self
                .families
                .get(&row.unit_id)
                .cloned()
                .unwrap_or_else(|| WitnessFamily::new(row.unit_id.clone()));
            answers.push(Answer {
                query: row.query.clone(),
                answer_value: row.answer_value.clone(),
                family,
            });
        }
        Ok(answers)
    }
}

impl WitnessSource for WitnessStore {
    fn family(&self, unit_id: &str) -> Option<&WitnessFamily> {
        self.families.get(unit_id)
    }

    fn unit_ids(&self) -> Vec<&str> {
        self.families.keys().map(String::as_str).collect()
    }
}
