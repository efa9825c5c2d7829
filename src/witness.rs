//! Witness sets and their families.
//!
//! A witness set is a minimal set of tuples that is jointly responsible for
//! a constraint violation (an MIS) or jointly sufficient to derive a query
//! answer (a minimal support). A family groups the witness sets of one
//! scoring unit.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tuple::TupleId;

/// A non-empty set of tuple identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessSet {
    /// External witness-set id, if the producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    members: BTreeSet<TupleId>,
}

impl WitnessSet {
    /// Builds a witness set, rejecting an empty member list.
    ///
    /// `unit` and `id` are only used to describe the error.
    pub fn new(
        unit: &str,
        id: Option<String>,
        members: impl IntoIterator<Item = TupleId>,
    ) -> Result<Self, ValidationError> {
        let members: BTreeSet<TupleId> = members.into_iter().collect();
        if members.is_empty() {
            return Err(ValidationError::EmptyWitnessSet {
                unit: unit.to_string(),
                witness: id.unwrap_or_else(|| "<anonymous>".to_string()),
            });
        }
        Ok(Self { id, members })
    }

    /// Builds an anonymous witness set.
    pub fn from_tuples(members: impl IntoIterator<Item = TupleId>) -> Result<Self, ValidationError> {
        Self::new("<unscoped>", None, members)
    }

    /// Members in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &TupleId> {
        self.members.iter()
    }

    /// Returns true if `tuple` belongs to this witness set.
    #[must_use]
    pub fn contains(&self, tuple: &TupleId) -> bool {
        self.members.contains(tuple)
    }

    /// Number of member tuples (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The witness sets of one scoring unit.
///
/// Duplicate witness sets are kept: multiplicity carries provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessFamily {
    /// Scoring-unit identity (constraint name or answer id).
    pub unit_id: String,
    /// Witness sets in input order.
    pub sets: Vec<WitnessSet>,
}

impl WitnessFamily {
    /// Creates an empty family for `unit_id`.
    #[must_use]
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            sets: Vec::new(),
        }
    }

    /// Creates a family from already-validated witness sets.
    #[must_use]
    pub fn with_sets(unit_id: impl Into<String>, sets: Vec<WitnessSet>) -> Self {
        Self {
            unit_id: unit_id.into(),
            sets,
        }
    }

    /// Appends a witness set.
    pub fn push(&mut self, set: WitnessSet) {
        self.sets.push(set);
    }

    /// Number of witness sets (the `m` of RIM normalization).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns true if the family has no witness sets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Every tuple occurrence, once per witness set it appears in.
    pub fn occurrences(&self) -> impl Iterator<Item = &TupleId> {
        self.sets.iter().flat_map(WitnessSet::iter)
    }

    /// Union of all witness sets, deduplicated and sorted.
    #[must_use]
    pub fn universe(&self) -> BTreeSet<&TupleId> {
        self.occurrences().collect()
    }
}

/// A query answer together with its family of minimal supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Query name (e.g. `Q3`).
    pub query: String,
    /// Rendered answer value.
    pub answer_value: String,
    /// Minimal supports; `family.unit_id` is the answer's scoring-unit id.
    pub family: WitnessFamily,
}

impl Answer {
    /// Scoring-unit identity of this answer.
    #[must_use]
    pub fn unit_id(&self) -> &str {
        &self.family.unit_id
    }
}

/// MIS families keyed by constraint name.
pub type ConstraintFamilies = BTreeMap<String, WitnessFamily>;
