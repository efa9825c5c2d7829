//! End-to-end stages.
//!
//! Two stages, each usable on its own:
//!
//! 1. **Tuple measures**: witness rows of denial constraints in, one
//!    `TupleMeasureRow` per (tuple, measure) and one `GammaRow` per
//!    (constraint, tuple) out.
//! 2. **Answers**: support rows, answer metadata and tuple measures in,
//!    one `IcqaRow` per (answer, measure, aggregator) out.
//!
//! Scoring units go through a [`ScoringRuntime`]; rows are sorted by key
//! before they are returned, so output does not depend on scheduling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::{ExecutionError, IcqaResult};
use crate::hitting_set::CacheStats;
use crate::icqa::AggregatorKind;
use crate::measures::{compute_cbm, compute_cim, compute_pim, MeasureKind, RimReport};
use crate::runtime::{ScoringHandle, ScoringRuntime};
use crate::storage::{AnswerRow, GammaRow, IcqaRow, MeasureTable, WitnessSource, WitnessStore};

/// Counters of one pipeline stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Scoring units processed (constraints or answers).
    pub units: usize,
    /// Output rows produced.
    pub rows: usize,
    /// Results flagged approximate.
    pub approximate: usize,
    pub cache: CacheStats,
    pub elapsed: Duration,
}

impl RunSummary {
    fn log(&self, stage: &str) {
        tracing::info!(
            stage,
            units = self.units,
            rows = self.rows,
            approximate = self.approximate,
            cache_hits = self.cache.hits,
            cache_misses = self.cache.misses,
            elapsed_ms = u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX),
            "stage finished"
        );
    }
}

/// Output of the tuple-measure stage.
#[derive(Debug, Clone)]
pub struct MeasureRun {
    pub table: MeasureTable,
    /// Sorted by constraint, then tuple. Empty unless RIM was requested.
    pub gamma: Vec<GammaRow>,
    pub summary: RunSummary,
}

/// Output of the answer stage.
#[derive(Debug, Clone)]
pub struct AnswerRun {
    /// Sorted by unit id, measure, then aggregator.
    pub rows: Vec<IcqaRow>,
    pub summary: RunSummary,
}

/// Runs the stages with one engine configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<EngineConfig>,
}

impl Pipeline {
    /// Validates `config`.
    pub fn new(config: EngineConfig) -> IcqaResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Computes the requested tuple measures over `constraints`.
    ///
    /// An empty constraint list selects every constraint in `store`. Repeated
    /// names count once; names without witness rows are skipped.
    pub fn tuple_measures(
        &self,
        store: &WitnessStore,
        constraints: &[String],
        kinds: &[MeasureKind],
    ) -> IcqaResult<MeasureRun> {
        let started = Instant::now();
        let selected: Vec<String> = if constraints.is_empty() {
            store.unit_ids().into_iter().map(str::to_string).collect()
        } else {
            dedup(constraints)
        };
        let kinds = dedup(kinds);
        tracing::info!(constraints = selected.len(), measures = kinds.len(), "computing tuple measures");

        let families = store.families();
        let mut table = MeasureTable::new();
        let mut gamma = Vec::new();
        let mut summary = RunSummary {
            units: selected.iter().filter(|dc| families.contains_key(*dc)).count(),
            ..RunSummary::default()
        };

        for kind in kinds {
            let scores = match kind {
                MeasureKind::Cbm => compute_cbm(families, &selected),
                MeasureKind::Cim => compute_cim(families, &selected, &self.config.weights),
                MeasureKind::Pim => compute_pim(families, &selected, &self.config.weights),
                MeasureKind::Rim => {
                    let report = self.rim(store, &selected)?;
                    for c in &report.constraints {
                        summary.cache.absorb(c.cache);
                    }
                    gamma = report.gamma_records().cloned().collect();
                    summary.approximate += gamma.iter().filter(|g| g.status.exactness().is_approximate()).count();
                    report.scores
                }
            };
            table.extend_scores(kind, &scores)?;
        }

        gamma.sort_by(|a, b| (&a.constraint, &a.tuple).cmp(&(&b.constraint, &b.tuple)));
        summary.rows = table.len();
        summary.elapsed = started.elapsed();
        summary.log("tuple_measures");

        Ok(MeasureRun { table, gamma, summary })
    }

    fn rim(&self, store: &WitnessStore, selected: &[String]) -> Result<RimReport, ExecutionError> {
        let families: Vec<_> = selected
            .iter()
            .filter_map(|dc| store.family(dc).cloned())
            .collect();
        let runtime = ScoringRuntime::with_shared(Arc::clone(&self.config), Arc::new(MeasureTable::new()))?;
        let results = run_chunked(&runtime, families, |rt, family| rt.submit_constraint(family))?;

        let mut report = RimReport::default();
        for rim in results {
            report.absorb(rim);
        }
        Ok(report)
    }

    /// Scores every answer in `answers` against `measures`.
    pub fn answers(
        &self,
        store: &WitnessStore,
        answers: &[AnswerRow],
        measures: MeasureTable,
        kinds: &[MeasureKind],
        aggregators: &[AggregatorKind],
    ) -> IcqaResult<AnswerRun> {
        let started = Instant::now();
        let answers = store.answers(answers)?;
        let kinds = dedup(kinds);
        let aggregators = dedup(aggregators);
        tracing::info!(
            answers = answers.len(),
            measures = kinds.len(),
            aggregators = aggregators.len(),
            "scoring answers"
        );

        let runtime = ScoringRuntime::with_shared(Arc::clone(&self.config), Arc::new(measures))?;
        let scored = run_chunked(&runtime, answers, |rt, answer| {
            rt.submit_answer(answer, &kinds, &aggregators)
        })?;

        let mut summary = RunSummary {
            units: scored.len(),
            ..RunSummary::default()
        };
        let mut rows = Vec::with_capacity(scored.len() * kinds.len() * aggregators.len());
        for answer in scored {
            summary.approximate += answer.approximate_count();
            summary.cache.absorb(answer.cache);
            for s in &answer.scores {
                rows.push(IcqaRow {
                    unit_id: answer.unit_id.clone(),
                    query: answer.query.clone(),
                    answer_value: answer.answer_value.clone(),
                    measure: s.measure,
                    aggregator: s.aggregator,
                    score: s.score,
                    exactness: s.exactness,
                });
            }
        }

        rows.sort_by(|a, b| (&a.unit_id, a.measure, a.aggregator).cmp(&(&b.unit_id, b.measure, b.aggregator)));
        summary.rows = rows.len();
        summary.elapsed = started.elapsed();
        summary.log("answers");

        Ok(AnswerRun { rows, summary })
    }
}

fn dedup<T: Ord + Clone>(items: &[T]) -> Vec<T> {
    let mut out = items.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

/// Submits `items` in windows no larger than the queue, joining each window
/// before the next, and returns results in submission order.
fn run_chunked<I, T, F>(runtime: &ScoringRuntime, items: Vec<I>, submit: F) -> Result<Vec<T>, ExecutionError>
where
    F: Fn(&ScoringRuntime, I) -> Result<ScoringHandle<T>, ExecutionError>,
{
    let window = runtime.queue_capacity().max(1);
    let mut out = Vec::with_capacity(items.len());
    let mut pending = items.into_iter().peekable();
    while pending.peek().is_some() {
        let handles = pending
            .by_ref()
            .take(window)
            .map(|item| submit(runtime, item))
            .collect::<Result<Vec<_>, _>>()?;
        for handle in handles {
            out.push(handle.join()?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MeasureSource, WitnessRow};
    use crate::tuple::{PrimaryKey, TupleId};

    fn wrow(unit: &str, witness: &str, rel: &str, key: i64) -> WitnessRow {
        WitnessRow {
            unit_id: unit.to_string(),
            witness_id: witness.to_string(),
            relation: rel.to_string(),
            primary_key: PrimaryKey::single(key),
        }
    }

    fn t(rel: &str, k: i64) -> TupleId {
        TupleId::new(rel, PrimaryKey::single(k)).unwrap()
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(EngineConfig {
            workers: 2,
            queue_capacity: 2,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn constraint_store() -> WitnessStore {
        WitnessStore::from_rows(vec![
            wrow("DC1", "1", "lineitem", 7),
            wrow("DC2", "1", "orders", 1),
            wrow("DC2", "1", "lineitem", 7),
            wrow("DC2", "2", "orders", 1),
            wrow("DC2", "2", "lineitem", 8),
            wrow("DC3", "1", "orders", 2),
            wrow("DC3", "1", "lineitem", 9),
        ])
        .unwrap()
    }

    #[test]
    fn tuple_measures_cover_every_requested_kind() {
        let run = pipeline()
            .tuple_measures(&constraint_store(), &[], &MeasureKind::ALL)
            .unwrap();
        assert_eq!(run.summary.units, 3);
        assert_eq!(run.summary.approximate, 0);
        // 5 distinct tuples, 4 measures each.
        assert_eq!(run.table.len(), 20);
        assert_eq!(run.gamma.len(), 1 + 3 + 2);

        // RIM over all constraints distributes one unit per MIS.
        let rim_total: f64 = run
            .table
            .rows()
            .iter()
            .filter(|r| r.measure == MeasureKind::Rim)
            .map(|r| r.value)
            .sum();
        assert!((rim_total - 4.0).abs() < 1e-9);
        assert_eq!(run.table.measure(&t("lineitem", 7), MeasureKind::Cbm), Some(2.0));
    }

    #[test]
    fn constraint_selection_and_duplicate_kinds() {
        let dcs = vec!["DC2".to_string(), "DC9".to_string()];
        let run = pipeline()
            .tuple_measures(&constraint_store(), &dcs, &[MeasureKind::Pim, MeasureKind::Pim])
            .unwrap();
        assert_eq!(run.summary.units, 1);
        assert_eq!(run.table.len(), 3);
        assert!(run.gamma.is_empty());
        assert_eq!(run.table.measure(&t("orders", 1), MeasureKind::Pim), Some(1.0));
    }

    #[test]
    fn repeated_constraint_names_count_once() {
        let twice = vec!["DC1".to_string(), "DC1".to_string()];
        let run = pipeline()
            .tuple_measures(&constraint_store(), &twice, &MeasureKind::ALL)
            .unwrap();
        let once = pipeline()
            .tuple_measures(&constraint_store(), &["DC1".to_string()], &MeasureKind::ALL)
            .unwrap();
        assert_eq!(run.summary.units, 1);
        assert_eq!(run.table.rows(), once.table.rows());
        let li = t("lineitem", 7);
        assert_eq!(run.table.measure(&li, MeasureKind::Cbm), Some(1.0));
        assert_eq!(run.table.measure(&li, MeasureKind::Rim), Some(1.0));
        assert_eq!(run.gamma.len(), 1);
        assert!(crate::storage::jsonl::write_rows(Vec::new(), &run.gamma, "gamma").is_ok());
    }

    #[test]
    fn gamma_rows_are_sorted() {
        let run = pipeline()
            .tuple_measures(&constraint_store(), &[], &[MeasureKind::Rim])
            .unwrap();
        let keys: Vec<(String, TupleId)> = run.gamma.iter().map(|g| (g.constraint.clone(), g.tuple.clone())).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn answers_are_scored_and_sorted() {
        let supports = WitnessStore::from_rows(vec![
            wrow("Q1/1", "0", "part", 1),
            wrow("Q1/0", "0", "part", 1),
            wrow("Q1/0", "1", "part", 1),
            wrow("Q1/0", "2", "part", 1),
        ])
        .unwrap();
        let mut measures = MeasureTable::new();
        measures.insert(t("part", 1), MeasureKind::Cbm, 2.0).unwrap();
        let answers = vec![
            AnswerRow {
                unit_id: "Q1/1".to_string(),
                query: "Q1".to_string(),
                answer_value: "b".to_string(),
            },
            AnswerRow {
                unit_id: "Q1/0".to_string(),
                query: "Q1".to_string(),
                answer_value: "a".to_string(),
            },
            AnswerRow {
                unit_id: "Q1/2".to_string(),
                query: "Q1".to_string(),
                answer_value: "c".to_string(),
            },
        ];

        let run = pipeline()
            .answers(&supports, &answers, measures, &[MeasureKind::Cbm], &AggregatorKind::ALL)
            .unwrap();
        assert_eq!(run.summary.units, 3);
        assert_eq!(run.rows.len(), 9);
        assert_eq!(run.rows[0].unit_id, "Q1/0");
        assert_eq!(run.rows[0].aggregator, AggregatorKind::Prov);
        assert_eq!(run.rows[0].score, 6.0);
        assert_eq!(run.rows[1].score, 2.0);
        assert!(run.rows.iter().filter(|r| r.unit_id == "Q1/2").all(|r| r.score == 0.0));
    }
}
