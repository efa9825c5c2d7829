//! RIM: responsibility-based inconsistency measure.
//!
//! Per constraint with `m` MIS: compute ρ for every tuple of the MIS
//! universe, normalize so the constraint's ρ' sum to one, then scale by `m`.
//! A tuple's RIM score is the sum of its contributions over constraints, so
//! each constraint distributes exactly `m` units of blame.

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::exactness::Exactness;
use crate::hitting_set::{CacheStats, HittingSetCache, SolveStatus};
use crate::hypergraph::Hypergraph;
use crate::measures::TupleScores;
use crate::responsibility::ResponsibilityEngine;
use crate::tuple::TupleId;
use crate::witness::{ConstraintFamilies, WitnessFamily};

/// Hitting-set diagnostics for one (constraint, tuple) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaRecord {
    /// Constraint name.
    pub constraint: String,
    /// Tuple the MIS were filtered against.
    pub tuple: TupleId,
    /// Minimum hitting-set size of the MIS not containing `tuple`.
    pub gamma: usize,
    /// Solver status.
    pub status: SolveStatus,
    /// Solver time in milliseconds (zero on a cache hit).
    pub runtime_ms: u64,
    /// MIS remaining after filtering.
    pub n_edges: usize,
    /// Universe size of the constraint.
    pub n_nodes: usize,
}

/// RIM result of a single constraint.
#[derive(Debug, Clone)]
pub struct ConstraintRim {
    /// Constraint name.
    pub constraint: String,
    /// Number of MIS (`m`).
    pub witness_count: usize,
    /// `ρ'(t) · m` per tuple.
    pub contributions: TupleScores,
    /// Per-tuple solver diagnostics, in universe order.
    pub gamma: Vec<GammaRecord>,
    /// Cache counters.
    pub cache: CacheStats,
    /// Exact only if every gamma was proven optimal.
    pub exactness: Exactness,
}

/// Computes the RIM contributions of one constraint's MIS family.
///
/// A fresh cache is created for the constraint and dropped afterwards.
pub fn rim_for_constraint(
    family: &WitnessFamily,
    engine: &ResponsibilityEngine,
    enable_cache: bool,
) -> Result<ConstraintRim, ExecutionError> {
    let m = family.len();
    if m == 0 {
        return Ok(ConstraintRim {
            constraint: family.unit_id.clone(),
            witness_count: 0,
            contributions: TupleScores::new(),
            gamma: Vec::new(),
            cache: CacheStats::default(),
            exactness: Exactness::Exact,
        });
    }

    let hypergraph = Hypergraph::from_family(family);
    let mut cache = HittingSetCache::with_enabled(enable_cache);
    let profile = engine.profile(&hypergraph, &mut cache);
    let normalized = profile.normalized()?;

    let n = hypergraph.universe_size();
    let mut contributions = TupleScores::new();
    let mut gamma = Vec::with_capacity(n);
    for (element, share) in profile.elements.iter().zip(normalized) {
        let tuple = hypergraph.element(element.element).clone();
        contributions.insert(tuple.clone(), share * m as f64);
        gamma.push(GammaRecord {
            constraint: family.unit_id.clone(),
            tuple,
            gamma: element.h_star,
            status: element.status,
            runtime_ms: u64::try_from(element.runtime.as_millis()).unwrap_or(u64::MAX),
            n_edges: element.filtered_edges,
            n_nodes: n,
        });
    }

    let exactness = profile.exactness();
    if exactness.is_approximate() {
        tracing::warn!(
            constraint = %family.unit_id,
            approximate = profile.approximate_count(),
            "RIM used approximate hitting-set sizes"
        );
    }

    Ok(ConstraintRim {
        constraint: family.unit_id.clone(),
        witness_count: m,
        contributions,
        gamma,
        cache: profile.cache,
        exactness,
    })
}

/// RIM over a set of constraints.
#[derive(Debug, Clone, Default)]
pub struct RimReport {
    /// Summed RIM score per tuple.
    pub scores: TupleScores,
    /// Per-constraint breakdown, in the order requested.
    pub constraints: Vec<ConstraintRim>,
}

impl RimReport {
    /// Folds one constraint's contributions into the report.
    pub fn absorb(&mut self, rim: ConstraintRim) {
        for (tuple, value) in &rim.contributions {
            *self.scores.entry(tuple.clone()).or_insert(0.0) += value;
        }
        self.constraints.push(rim);
    }

    /// Every gamma record of every constraint.
    pub fn gamma_records(&self) -> impl Iterator<Item = &GammaRecord> {
        self.constraints.iter().flat_map(|c| c.gamma.iter())
    }

    /// Exact only if every constraint was exact.
    #[must_use]
    pub fn exactness(&self) -> Exactness {
        self.constraints
            .iter()
            .fold(Exactness::Exact, |acc, c| acc.and(c.exactness))
    }
}

/// Sequential RIM over `constraints`; constraints without a family are skipped.
pub fn compute_rim(
    families: &ConstraintFamilies,
    constraints: &[String],
    engine: &ResponsibilityEngine,
    enable_cache: bool,
) -> Result<RimReport, ExecutionError> {
    let mut report = RimReport::default();
    for dc in constraints {
        let Some(family) = families.get(dc) else {
            continue;
        };
        report.absorb(rim_for_constraint(family, engine, enable_cache)?);
    }
    Ok(report)
}
