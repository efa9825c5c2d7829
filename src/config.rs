//! Engine configuration.
//!
//! A plain struct with defaults and explicit validation. It can be
//! deserialized from JSON; missing fields take their default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, IcqaResult, ValidationError};
use crate::hitting_set::HittingSetSolver;
use crate::measures::WeightTables;
use crate::shapley::ShapleyConfig;

/// Largest universe for which exact Shapley enumeration may be requested.
///
/// Exact mode materializes `2^n` coalition values.
pub const MAX_EXACT_SHAPLEY_THRESHOLD: usize = 20;

/// Configuration shared read-only by every scoring worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock budget per exact hitting-set call.
    pub hitting_set_budget_ms: u64,
    /// Whether responsibility scoring reuses results for identical filtered edge sets.
    pub enable_cache: bool,
    /// Universes up to this size get exact Shapley values.
    pub shapley_exact_threshold: usize,
    /// Monte-Carlo permutations above the threshold.
    pub shapley_samples: usize,
    /// Base seed for Monte-Carlo sampling.
    pub shapley_seed: u64,
    /// Number of scoring workers.
    pub workers: usize,
    /// Maximum queued scoring units.
    pub queue_capacity: usize,
    /// CIM/PIM weight tables.
    pub weights: WeightTables,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hitting_set_budget_ms: 1000,
            enable_cache: true,
            shapley_exact_threshold: 14,
            shapley_samples: 5000,
            shapley_seed: 0,
            workers: 4,
            queue_capacity: 1024,
            weights: WeightTables::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// This must be called before handing the config to a runtime.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidConfig {
            reason: reason.to_string(),
        };
        if self.hitting_set_budget_ms == 0 {
            return Err(invalid("hitting_set_budget_ms must be > 0"));
        }
        if self.shapley_exact_threshold > MAX_EXACT_SHAPLEY_THRESHOLD {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "shapley_exact_threshold must be <= {MAX_EXACT_SHAPLEY_THRESHOLD}"
                ),
            });
        }
        if self.shapley_samples == 0 {
            return Err(invalid("shapley_samples must be > 0"));
        }
        if self.workers == 0 {
            return Err(invalid("workers must be > 0"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be > 0"));
        }
        self.weights.validate()
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> IcqaResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: &Path) -> IcqaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ExecutionError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Per-call hitting-set budget.
    #[must_use]
    pub const fn hitting_set_budget(&self) -> Duration {
        Duration::from_millis(self.hitting_set_budget_ms)
    }

    /// Solver configured with this budget.
    #[must_use]
    pub const fn hitting_set_solver(&self) -> HittingSetSolver {
        HittingSetSolver::new(self.hitting_set_budget())
    }

    /// Shapley engine settings.
    #[must_use]
    pub const fn shapley(&self) -> ShapleyConfig {
        ShapleyConfig {
            exact_threshold: self.shapley_exact_threshold,
            samples: self.shapley_samples,
            seed: self.shapley_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn config_rejects_zero_limits() {
        let mut c = EngineConfig::default();
        c.hitting_set_budget_ms = 0;
        assert!(c.validate().is_err());

        let mut c = EngineConfig::default();
        c.shapley_samples = 0;
        assert!(c.validate().is_err());

        let mut c = EngineConfig::default();
        c.workers = 0;
        assert!(c.validate().is_err());

        let mut c = EngineConfig::default();
        c.queue_capacity = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn config_rejects_oversized_exact_threshold() {
        let c = EngineConfig {
            shapley_exact_threshold: MAX_EXACT_SHAPLEY_THRESHOLD + 1,
            ..EngineConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = EngineConfig::from_json_str(r#"{"workers": 2, "shapley_seed": 7}"#).unwrap();
        assert_eq!(c.workers, 2);
        assert_eq!(c.shapley_seed, 7);
        assert_eq!(c.shapley_exact_threshold, 14);
        assert_eq!(c.weights.pim_weight("DC2"), 0.5);
    }

    #[test]
    fn invalid_json_config_is_a_validation_error() {
        let err = EngineConfig::from_json_str(r#"{"workers": 0}"#).unwrap_err();
        assert!(err.is_validation());
        let err = EngineConfig::from_json_str("not json").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig {
            hitting_set_budget_ms: 250,
            ..EngineConfig::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(EngineConfig::from_json_file(&path).unwrap(), config);
    }
}
