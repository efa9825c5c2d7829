//! Constant-weight measures: CBM, CIM, PIM.
//!
//! None of these fail. Constraints without a family and missing weight
//! entries contribute nothing, and tuples whose accumulated weight stays at
//! zero get no score entry.

use std::collections::BTreeSet;

use crate::measures::{TupleScores, WeightTables};
use crate::tuple::TupleId;
use crate::witness::ConstraintFamilies;

/// CBM: each tuple in at least one MIS of a constraint gets +1 for that
/// constraint, however many MIS of that constraint contain it.
#[must_use]
pub fn compute_cbm(families: &ConstraintFamilies, constraints: &[String]) -> TupleScores {
    let mut scores = TupleScores::new();
    for dc in constraints {
        let Some(family) = families.get(dc) else {
            continue;
        };
        let involved: BTreeSet<&TupleId> = family.occurrences().collect();
        for tuple in involved {
            *scores.entry(tuple.clone()).or_insert(0.0) += 1.0;
        }
    }
    scores
}

/// CIM: each tuple gets `w(constraint, relation)` once per MIS occurrence.
#[must_use]
pub fn compute_cim(
    families: &ConstraintFamilies,
    constraints: &[String],
    weights: &WeightTables,
) -> TupleScores {
    let mut scores = TupleScores::new();
    for dc in constraints {
        let Some(family) = families.get(dc) else {
            continue;
        };
        for tuple in family.occurrences() {
            let w = weights.cim_weight(dc, &tuple.relation);
            if w != 0.0 {
                *scores.entry(tuple.clone()).or_insert(0.0) += w;
            }
        }
    }
    scores
}

/// PIM: each tuple gets `w(constraint)` once per MIS occurrence.
#[must_use]
pub fn compute_pim(
    families: &ConstraintFamilies,
    constraints: &[String],
    weights: &WeightTables,
) -> TupleScores {
    let mut scores = TupleScores::new();
    for dc in constraints {
        let w = weights.pim_weight(dc);
        if w == 0.0 {
            continue;
        }
        let Some(family) = families.get(dc) else {
            continue;
        };
        for tuple in family.occurrences() {
            *scores.entry(tuple.clone()).or_insert(0.0) += w;
        }
    }
    scores
}
