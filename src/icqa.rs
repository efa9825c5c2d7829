//! Inconsistency-aware query answering.
//!
//! An answer is scored by combining the tuple-level measures of the tuples
//! in its minimal supports. Three aggregators are supported:
//!
//! - **prov**: Σ measure(t) over every occurrence, keeping multiplicity.
//! - **resp**: Σ ρ(t)·measure(t) over distinct tuples, with ρ computed from
//!   the answer's own support family.
//! - **shap**: Σ φ(t)·measure(t) over distinct tuples, with φ the Shapley
//!   value in the covering game of the support family.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, ValidationError};
use crate::exactness::Exactness;
use crate::hitting_set::{CacheStats, HittingSetCache};
use crate::hypergraph::Hypergraph;
use crate::measures::MeasureKind;
use crate::responsibility::ResponsibilityEngine;
use crate::shapley::ShapleyEngine;
use crate::storage::MeasureSource;
use crate::witness::{Answer, WitnessFamily};

/// Answer-level aggregation semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorKind {
    /// Provenance sum with multiplicity.
    Prov,
    /// Responsibility-weighted sum.
    Resp,
    /// Shapley-weighted sum.
    Shap,
}

impl AggregatorKind {
    /// Every aggregator, in output order.
    pub const ALL: [Self; 3] = [Self::Prov, Self::Resp, Self::Shap];

    /// Lowercase name used in rows and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prov => "prov",
            Self::Resp => "resp",
            Self::Shap => "shap",
        }
    }
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregatorKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prov" => Ok(Self::Prov),
            "resp" => Ok(Self::Resp),
            "shap" => Ok(Self::Shap),
            _ => Err(ValidationError::UnknownKind {
                kind: "aggregator",
                value: s.to_string(),
            }),
        }
    }
}

/// One score of one answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerScore {
    /// Tuple measure being aggregated.
    pub measure: MeasureKind,
    pub aggregator: AggregatorKind,
    pub score: f64,
    /// Approximate when any h* timed out or Shapley values were sampled.
    pub exactness: Exactness,
}

/// All requested scores of one answer.
#[derive(Debug, Clone)]
pub struct ScoredAnswer {
    /// Answer id, `<query>/<index>` in generated inputs.
    pub unit_id: String,
    pub query: String,
    /// Rendered answer tuple.
    pub answer_value: String,
    /// One entry per (measure, aggregator), in request order.
    pub scores: Vec<AnswerScore>,
    /// Hitting-set cache counters of the resp computation.
    pub cache: CacheStats,
}

impl ScoredAnswer {
    /// Number of scores flagged approximate.
    #[must_use]
    pub fn approximate_count(&self) -> usize {
        self.scores
            .iter()
            .filter(|s| s.exactness.is_approximate())
            .count()
    }
}

/// prov: sum of `kind` over every tuple occurrence of `family`.
///
/// Tuples without a measure row contribute zero.
pub fn prov_score<M>(family: &WitnessFamily, measures: &M, kind: MeasureKind) -> f64
where
    M: MeasureSource + ?Sized,
{
    family
        .occurrences()
        .map(|t| measures.measure(t, kind).unwrap_or(0.0))
        .sum()
}

/// Σ weight(t)·measure(t) over the distinct tuples of `hypergraph`.
pub fn weighted_score<M>(hypergraph: &Hypergraph, weights: &[f64], measures: &M, kind: MeasureKind) -> f64
where
    M: MeasureSource + ?Sized,
{
    hypergraph
        .universe()
        .iter()
        .zip(weights)
        .map(|(t, w)| w * measures.measure(t, kind).unwrap_or(0.0))
        .sum()
}

/// Scores answers against a measure table.
#[derive(Debug, Clone, Copy)]
pub struct IcqaScorer {
    responsibility: ResponsibilityEngine,
    shapley: ShapleyEngine,
    enable_cache: bool,
}

impl Default for IcqaScorer {
    fn default() -> Self {
        Self::new(ResponsibilityEngine::default(), ShapleyEngine::default(), true)
    }
}

impl IcqaScorer {
    #[must_use]
    pub const fn new(responsibility: ResponsibilityEngine, shapley: ShapleyEngine, enable_cache: bool) -> Self {
        Self {
            responsibility,
            shapley,
            enable_cache,
        }
    }

    /// Computes every (measure, aggregator) score of `answer`.
    ///
    /// ρ and φ are computed once per answer and only when their aggregator
    /// is requested.
    pub fn score<M>(
        &self,
        answer: &Answer,
        measures: &M,
        kinds: &[MeasureKind],
        aggregators: &[AggregatorKind],
    ) -> Result<ScoredAnswer, ExecutionError>
    where
        M: MeasureSource + ?Sized,
    {
        let mut scored = ScoredAnswer {
            unit_id: answer.unit_id().to_string(),
            query: answer.query.clone(),
            answer_value: answer.answer_value.clone(),
            scores: Vec::with_capacity(kinds.len() * aggregators.len()),
            cache: CacheStats::default(),
        };

        if answer.family.is_empty() {
            tracing::warn!(unit = answer.unit_id(), "answer has no witness sets; scoring as 0");
            for &measure in kinds {
                for &aggregator in aggregators {
                    scored.scores.push(AnswerScore {
                        measure,
                        aggregator,
                        score: 0.0,
                        exactness: Exactness::Exact,
                    });
                }
            }
            return Ok(scored);
        }

        let hypergraph = Hypergraph::from_family(&answer.family);

        let resp = if aggregators.contains(&AggregatorKind::Resp) {
            let mut cache = HittingSetCache::with_enabled(self.enable_cache);
            let profile = self.responsibility.profile(&hypergraph, &mut cache);
            scored.cache = profile.cache;
            let rho: Vec<f64> = profile.elements.iter().map(|e| e.rho).collect();
            Some((rho, profile.exactness()))
        } else {
            None
        };

        let shap = if aggregators.contains(&AggregatorKind::Shap) {
            let values = self.shapley.values(&hypergraph)?;
            let exactness = values.exactness();
            Some((values.values, exactness))
        } else {
            None
        };

        for &measure in kinds {
            for &aggregator in aggregators {
                let (score, exactness) = match aggregator {
                    AggregatorKind::Prov => (prov_score(&answer.family, measures, measure), Exactness::Exact),
                    AggregatorKind::Resp => match &resp {
                        Some((rho, ex)) => (weighted_score(&hypergraph, rho, measures, measure), *ex),
                        None => (0.0, Exactness::Exact),
                    },
                    AggregatorKind::Shap => match &shap {
                        Some((phi, ex)) => (weighted_score(&hypergraph, phi, measures, measure), *ex),
                        None => (0.0, Exactness::Exact),
                    },
                };
                scored.scores.push(AnswerScore {
                    measure,
                    aggregator,
                    score,
                    exactness,
                });
            }
        }

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MeasureTable;
    use crate::tuple::{PrimaryKey, TupleId};
    use crate::witness::WitnessSet;

    fn t(rel: &str, k: i64) -> TupleId {
        TupleId::new(rel, PrimaryKey::single(k)).unwrap()
    }

    fn answer(sets: Vec<Vec<TupleId>>) -> Answer {
        Answer {
            query: "Q1".to_string(),
            answer_value: "42".to_string(),
            family: WitnessFamily::with_sets(
                "Q1/0",
                sets.into_iter()
                    .map(|s| WitnessSet::from_tuples(s).unwrap())
                    .collect(),
            ),
        }
    }

    fn table(entries: &[(TupleId, f64)]) -> MeasureTable {
        let mut table = MeasureTable::new();
        for (tuple, value) in entries {
            table.insert(tuple.clone(), MeasureKind::Cbm, *value).unwrap();
        }
        table
    }

    fn score_of(scored: &ScoredAnswer, aggregator: AggregatorKind) -> AnswerScore {
        *scored
            .scores
            .iter()
            .find(|s| s.aggregator == aggregator)
            .unwrap()
    }

    #[test]
    fn aggregator_kind_round_trips_names() {
        for kind in AggregatorKind::ALL {
            assert_eq!(kind.as_str().parse::<AggregatorKind>().unwrap(), kind);
        }
        assert_eq!(serde_json::to_string(&AggregatorKind::Shap).unwrap(), "\"shap\"");
        assert!("mean".parse::<AggregatorKind>().is_err());
    }

    #[test]
    fn repeated_support_counts_for_prov_only() {
        let a = t("part", 1);
        let ans = answer(vec![vec![a.clone()], vec![a.clone()], vec![a.clone()]]);
        let measures = table(&[(a, 2.0)]);

        let scored = IcqaScorer::default()
            .score(&ans, &measures, &[MeasureKind::Cbm], &AggregatorKind::ALL)
            .unwrap();
        assert_eq!(score_of(&scored, AggregatorKind::Prov).score, 6.0);
        assert_eq!(score_of(&scored, AggregatorKind::Resp).score, 2.0);
        assert!((score_of(&scored, AggregatorKind::Shap).score - 2.0).abs() < 1e-12);
        assert_eq!(scored.approximate_count(), 0);
    }

    #[test]
    fn two_tuple_support_splits_weights() {
        let (a, b) = (t("orders", 1), t("lineitem", 1));
        let ans = answer(vec![vec![a.clone(), b.clone()]]);
        let measures = table(&[(a, 4.0), (b, 2.0)]);

        let scored = IcqaScorer::default()
            .score(&ans, &measures, &[MeasureKind::Cbm], &AggregatorKind::ALL)
            .unwrap();
        assert_eq!(score_of(&scored, AggregatorKind::Prov).score, 6.0);
        // rho = 0.5 each, phi = 0.5 each.
        assert!((score_of(&scored, AggregatorKind::Resp).score - 3.0).abs() < 1e-12);
        assert!((score_of(&scored, AggregatorKind::Shap).score - 3.0).abs() < 1e-12);
    }

    #[test]
    fn prov_is_linear_in_multiplicity() {
        let (a, b) = (t("part", 1), t("part", 2));
        let measures = table(&[(a.clone(), 1.5), (b.clone(), 0.5)]);
        let once = answer(vec![vec![a.clone(), b.clone()]]);
        let twice = answer(vec![vec![a.clone(), b.clone()], vec![a, b]]);

        let p1 = prov_score(&once.family, &measures, MeasureKind::Cbm);
        let p2 = prov_score(&twice.family, &measures, MeasureKind::Cbm);
        assert!((p2 - 2.0 * p1).abs() < 1e-12);
    }

    #[test]
    fn missing_measures_and_empty_supports_score_zero() {
        let ans = answer(vec![vec![t("part", 5)]]);
        let scored = IcqaScorer::default()
            .score(&ans, &MeasureTable::new(), &[MeasureKind::Rim], &AggregatorKind::ALL)
            .unwrap();
        assert!(scored.scores.iter().all(|s| s.score == 0.0));

        let empty = Answer {
            query: "Q2".to_string(),
            answer_value: "x".to_string(),
            family: WitnessFamily::new("Q2/0"),
        };
        let scored = IcqaScorer::default()
            .score(&empty, &table(&[(t("part", 5), 1.0)]), &MeasureKind::ALL, &AggregatorKind::ALL)
            .unwrap();
        assert_eq!(scored.scores.len(), 12);
        assert!(scored.scores.iter().all(|s| s.score == 0.0 && s.exactness.is_exact()));
    }

    #[test]
    fn only_requested_aggregators_are_produced() {
        let ans = answer(vec![vec![t("part", 1)]]);
        let scored = IcqaScorer::default()
            .score(&ans, &MeasureTable::new(), &[MeasureKind::Cbm, MeasureKind::Pim], &[AggregatorKind::Prov])
            .unwrap();
        assert_eq!(scored.scores.len(), 2);
        assert!(scored.scores.iter().all(|s| s.aggregator == AggregatorKind::Prov));
    }
}
