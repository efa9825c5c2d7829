//! Tuple-level inconsistency measures.
//!
//! Each measure assigns every tuple that occurs in at least one
//! minimal-inconsistent-set a nonnegative score, accumulated over the
//! selected denial constraints:
//!
//! - **CBM**: +1 per constraint the tuple is involved in.
//! - **CIM**: +w(constraint, relation) per MIS occurrence.
//! - **PIM**: +w(constraint) per MIS occurrence.
//! - **RIM**: normalized causal responsibility, scaled by the MIS count.

mod constant;
mod rim;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tuple::TupleId;

pub use constant::{compute_cbm, compute_cim, compute_pim};
pub use rim::{compute_rim, rim_for_constraint, ConstraintRim, GammaRecord, RimReport};

/// Per-tuple scores for one measure.
pub type TupleScores = BTreeMap<TupleId, f64>;

/// Tuple-level measure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeasureKind {
    /// Constraint-based measure.
    Cbm,
    /// Constraint-and-relation weighted measure.
    Cim,
    /// Per-constraint weighted measure.
    Pim,
    /// Responsibility-based measure.
    Rim,
}

impl MeasureKind {
    /// Every measure kind, in output order.
    pub const ALL: [Self; 4] = [Self::Cbm, Self::Cim, Self::Pim, Self::Rim];

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cbm => "CBM",
            Self::Cim => "CIM",
            Self::Pim => "PIM",
            Self::Rim => "RIM",
        }
    }
}

impl fmt::Display for MeasureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CBM" => Ok(Self::Cbm),
            "CIM" => Ok(Self::Cim),
            "PIM" => Ok(Self::Pim),
            "RIM" => Ok(Self::Rim),
            _ => Err(ValidationError::UnknownKind {
                kind: "measure",
                value: s.to_string(),
            }),
        }
    }
}

/// Constant weight tables for CIM and PIM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTables {
    /// CIM: constraint -> relation -> weight.
    pub cim: HashMap<String, HashMap<String, f64>>,
    /// PIM: constraint -> weight.
    pub pim: HashMap<String, f64>,
}

impl Default for WeightTables {
    /// TPC-H tables for denial constraints DC1..DC4.
    fn default() -> Self {
        let rel = |pairs: &[(&str, f64)]| -> HashMap<String, f64> {
            pairs.iter().map(|&(r, w)| (r.to_string(), w)).collect()
        };

        let cim = HashMap::from([
            ("DC1".to_string(), rel(&[("lineitem", 1.0)])),
            ("DC2".to_string(), rel(&[("orders", 2.0), ("lineitem", 2.0)])),
            ("DC3".to_string(), rel(&[("orders", 2.0), ("lineitem", 2.0)])),
            (
                "DC4".to_string(),
                rel(&[("lineitem", 2.0), ("partsupp", 3.0), ("part", 1.0)]),
            ),
        ]);

        let pim = HashMap::from([
            ("DC1".to_string(), 1.0),
            ("DC2".to_string(), 0.5),
            ("DC3".to_string(), 0.5),
            ("DC4".to_string(), 1.0 / 3.0),
        ]);

        Self { cim, pim }
    }
}

impl WeightTables {
    /// Empty tables: every CIM/PIM weight is zero.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            cim: HashMap::new(),
            pim: HashMap::new(),
        }
    }

    /// `w(constraint, relation)`, zero when absent.
    #[must_use]
    pub fn cim_weight(&self, constraint: &str, relation: &str) -> f64 {
        self.cim
            .get(constraint)
            .and_then(|by_rel| by_rel.get(relation))
            .copied()
            .unwrap_or(0.0)
    }

    /// `w(constraint)`, zero when absent.
    #[must_use]
    pub fn pim_weight(&self, constraint: &str) -> f64 {
        self.pim.get(constraint).copied().unwrap_or(0.0)
    }

    /// Rejects negative or non-finite weights.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let bad = |what: String, w: f64| ValidationError::InvalidConfig {
            reason: format!("{what} weight {w} must be finite and >= 0"),
        };
        for (dc, by_rel) in &self.cim {
            for (rel, &w) in by_rel {
                if !w.is_finite() || w < 0.0 {
                    return Err(bad(format!("CIM {dc}/{rel}"), w));
                }
            }
        }
        for (dc, &w) in &self.pim {
            if !w.is_finite() || w < 0.0 {
                return Err(bad(format!("PIM {dc}"), w));
            }
        }
        Ok(())
    }
}
