//! Bounded scoring runtime.
//!
//! Scoring units (one constraint's MIS family, or one answer's supports) are
//! independent. This module runs them on a fixed pool of worker threads fed
//! by a bounded queue. Workers share only the read-only engine config and
//! measure table; each job builds its own hitting-set cache.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::config::EngineConfig;
use crate::error::{ExecutionError, IcqaResult};
use crate::icqa::{AggregatorKind, IcqaScorer, ScoredAnswer};
use crate::measures::{rim_for_constraint, ConstraintRim, MeasureKind};
use crate::responsibility::ResponsibilityEngine;
use crate::shapley::ShapleyEngine;
use crate::storage::MeasureTable;
use crate::witness::{Answer, WitnessFamily};

type Reply<T> = Sender<Result<T, ExecutionError>>;

enum Job {
    Constraint {
        family: WitnessFamily,
        reply: Reply<ConstraintRim>,
    },
    Answer {
        answer: Answer,
        kinds: Vec<MeasureKind>,
        aggregators: Vec<AggregatorKind>,
        reply: Reply<ScoredAnswer>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

/// State every worker reads.
struct Shared {
    config: Arc<EngineConfig>,
    measures: Arc<MeasureTable>,
    responsibility: ResponsibilityEngine,
    icqa: IcqaScorer,
}

impl Shared {
    fn new(config: Arc<EngineConfig>, measures: Arc<MeasureTable>) -> Self {
        let responsibility = ResponsibilityEngine::new(config.hitting_set_solver());
        let icqa = IcqaScorer::new(
            responsibility,
            ShapleyEngine::new(config.shapley()),
            config.enable_cache,
        );
        Self {
            config,
            measures,
            responsibility,
            icqa,
        }
    }

    fn run(&self, job: Job) {
        match job {
            Job::Constraint { family, reply } => {
                let result = rim_for_constraint(&family, &self.responsibility, self.config.enable_cache);
                let _ = reply.send(result);
            }
            Job::Answer {
                answer,
                kinds,
                aggregators,
                reply,
            } => {
                let result = self.icqa.score(&answer, self.measures.as_ref(), &kinds, &aggregators);
                let _ = reply.send(result);
            }

            #[cfg(test)]
            Job::Sleep { duration, reply } => {
                thread::sleep(duration);
                let _ = reply.send(());
            }
        }
    }
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize, shared: Arc<Shared>) -> Result<Self, ExecutionError> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("icqa-scorer-{idx}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        shared.run(job);
                    }
                })
                .map_err(|e| ExecutionError::WorkerSpawn {
                    message: e.to_string(),
                })?;
            handles.push(handle);
        }

        Ok(Self {
            tx,
            workers: handles,
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job) -> Result<(), ExecutionError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ExecutionError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(ExecutionError::Disconnected),
        }
    }

    fn shutdown(self) {
        // Closing the channel lets workers drain queued jobs, then exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Pending result of one submitted scoring unit.
pub struct ScoringHandle<T> {
    unit_id: String,
    rx: Receiver<Result<T, ExecutionError>>,
}

impl<T> ScoringHandle<T> {
    /// Scoring unit this handle waits for.
    #[must_use]
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// Waits for the unit to finish.
    pub fn join(self) -> Result<T, ExecutionError> {
        self.rx.recv().map_err(|_| ExecutionError::Disconnected)?
    }

    /// Waits for the unit to finish, at most `timeout`.
    pub fn join_timeout(self, timeout: Duration) -> Result<T, ExecutionError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => ExecutionError::Disconnected,
        })?
    }
}

/// Worker pool that scores constraints and answers.
pub struct ScoringRuntime {
    shared: Arc<Shared>,
    pool: Option<WorkerPool>,
}

impl ScoringRuntime {
    /// Validates `config` and starts `config.workers` workers.
    pub fn new(config: EngineConfig, measures: MeasureTable) -> IcqaResult<Self> {
        config.validate()?;
        Ok(Self::with_shared(Arc::new(config), Arc::new(measures))?)
    }

    /// Starts a runtime over already-shared state.
    ///
    /// The config is assumed valid.
    pub fn with_shared(config: Arc<EngineConfig>, measures: Arc<MeasureTable>) -> Result<Self, ExecutionError> {
        let shared = Arc::new(Shared::new(config, measures));
        let pool = WorkerPool::start(
            shared.config.workers,
            shared.config.queue_capacity,
            Arc::clone(&shared),
        )?;
        tracing::debug!(
            workers = shared.config.workers,
            queue_capacity = shared.config.queue_capacity,
            "scoring runtime started"
        );
        Ok(Self {
            shared,
            pool: Some(pool),
        })
    }

    /// Engine configuration shared by the workers.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Measure table shared by the workers.
    #[must_use]
    pub fn measures(&self) -> &MeasureTable {
        &self.shared.measures
    }

    /// Maximum number of queued units.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.queue_capacity)
    }

    fn submit(&self, job: Job) -> Result<(), ExecutionError> {
        self.pool
            .as_ref()
            .ok_or(ExecutionError::Disconnected)?
            .try_submit(job)
    }

    /// Queues RIM scoring of one constraint.
    pub fn submit_constraint(&self, family: WitnessFamily) -> Result<ScoringHandle<ConstraintRim>, ExecutionError> {
        let unit_id = family.unit_id.clone();
        let (reply, rx) = bounded(1);
        self.submit(Job::Constraint { family, reply })?;
        Ok(ScoringHandle { unit_id, rx })
    }

    /// Queues ICQA scoring of one answer.
    pub fn submit_answer(
        &self,
        answer: Answer,
        kinds: &[MeasureKind],
        aggregators: &[AggregatorKind],
    ) -> Result<ScoringHandle<ScoredAnswer>, ExecutionError> {
        let unit_id = answer.unit_id().to_string();
        let (reply, rx) = bounded(1);
        self.submit(Job::Answer {
            answer,
            kinds: kinds.to_vec(),
            aggregators: aggregators.to_vec(),
            reply,
        })?;
        Ok(ScoringHandle { unit_id, rx })
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> Result<Receiver<()>, ExecutionError> {
        let (reply, rx) = bounded(1);
        self.submit(Job::Sleep { duration, reply })?;
        Ok(rx)
    }
}

impl Drop for ScoringRuntime {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MeasureSource;
    use crate::tuple::{PrimaryKey, TupleId};
    use crate::witness::WitnessSet;

    fn t(rel: &str, k: i64) -> TupleId {
        TupleId::new(rel, PrimaryKey::single(k)).unwrap()
    }

    fn family(unit: &str, sets: Vec<Vec<TupleId>>) -> WitnessFamily {
        WitnessFamily::with_sets(
            unit,
            sets.into_iter()
                .map(|s| WitnessSet::from_tuples(s).unwrap())
                .collect(),
        )
    }

    fn runtime(workers: usize, queue_capacity: usize, measures: MeasureTable) -> ScoringRuntime {
        ScoringRuntime::new(
            EngineConfig {
                workers,
                queue_capacity,
                ..EngineConfig::default()
            },
            measures,
        )
        .unwrap()
    }

    #[test]
    fn constraint_jobs_return_rim_contributions() {
        let rt = runtime(2, 8, MeasureTable::new());
        let handle = rt
            .submit_constraint(family("DC2", vec![vec![t("orders", 1), t("lineitem", 1)]]))
            .unwrap();
        assert_eq!(handle.unit_id(), "DC2");
        let rim = handle.join_timeout(Duration::from_secs(5)).unwrap();
        assert!((rim.contributions.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn answer_jobs_read_the_shared_measure_table() {
        let mut measures = MeasureTable::new();
        measures.insert(t("part", 1), MeasureKind::Cbm, 2.0).unwrap();
        let rt = runtime(1, 4, measures);
        assert_eq!(rt.measures().measure(&t("part", 1), MeasureKind::Cbm), Some(2.0));

        let answer = Answer {
            query: "Q1".to_string(),
            answer_value: "x".to_string(),
            family: family("Q1/0", vec![vec![t("part", 1)], vec![t("part", 1)]]),
        };
        let scored = rt
            .submit_answer(answer, &[MeasureKind::Cbm], &[AggregatorKind::Prov])
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(scored.scores[0].score, 4.0);
    }

    #[test]
    fn full_queue_is_reported() {
        let rt = runtime(1, 1, MeasureTable::new());
        // Occupy the single worker, then fill the single queue slot.
        let busy = rt.submit_sleep(Duration::from_millis(300)).unwrap();
        thread::sleep(Duration::from_millis(50));
        let queued = rt.submit_sleep(Duration::from_millis(1)).unwrap();

        let err = rt
            .submit_constraint(family("DC1", vec![vec![t("lineitem", 1)]]))
            .err()
            .unwrap();
        assert!(matches!(err, ExecutionError::QueueFull { capacity: 1 }));

        busy.recv_timeout(Duration::from_secs(2)).unwrap();
        queued.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn join_reports_disconnected_when_reply_sender_dropped() {
        let (tx, rx) = bounded::<Result<ConstraintRim, ExecutionError>>(1);
        drop(tx);
        let handle = ScoringHandle {
            unit_id: "DC3".to_string(),
            rx,
        };
        assert!(matches!(handle.join(), Err(ExecutionError::Disconnected)));
    }

    #[test]
    fn join_timeout_reports_timeout_while_sender_alive() {
        let (_tx, rx) = bounded::<Result<ConstraintRim, ExecutionError>>(1);
        let handle = ScoringHandle {
            unit_id: "DC3".to_string(),
            rx,
        };
        let err = handle.join_timeout(Duration::from_millis(10)).err().unwrap();
        assert!(matches!(err, ExecutionError::Timeout { duration_ms: 10 }));
    }

    #[test]
    fn invalid_config_is_rejected_before_start() {
        let err = ScoringRuntime::new(
            EngineConfig {
                workers: 0,
                ..EngineConfig::default()
            },
            MeasureTable::new(),
        )
        .err()
        .unwrap();
        assert!(err.is_validation());
    }
}
