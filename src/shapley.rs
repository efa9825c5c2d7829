//! Shapley attribution over the covering game of a hypergraph.
//!
//! The coalition value is v(C) = 1 if C intersects every edge, else 0. The
//! game is monotone, so along any ordering of the players v flips from 0 to
//! 1 exactly once, and only the element causing the flip has a nonzero
//! marginal contribution.
//!
//! Small universes are solved exactly by enumerating all `2^n` coalitions.
//! Larger ones are estimated from uniformly random permutations, using a
//! ChaCha stream seeded from the configured seed and the scoring-unit id so
//! that results do not depend on which worker ran the unit.

use blake3::Hasher;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::MAX_EXACT_SHAPLEY_THRESHOLD;
use crate::error::ExecutionError;
use crate::exactness::Exactness;
use crate::hypergraph::Hypergraph;

/// Tolerance for the efficiency check Σφ = v(U) − v(∅).
pub const EFFICIENCY_TOLERANCE: f64 = 1e-9;

/// Shapley engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapleyConfig {
    /// Universes up to this size are enumerated exactly.
    pub exact_threshold: usize,
    /// Permutations sampled above the threshold.
    pub samples: usize,
    /// Base seed, mixed with the unit id.
    pub seed: u64,
}

impl Default for ShapleyConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 14,
            samples: 5000,
            seed: 0,
        }
    }
}

/// How a set of Shapley values was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapleyMode {
    /// Full coalition enumeration.
    Exact,
    /// Monte-Carlo over random permutations.
    Sampled {
        /// Permutations drawn.
        samples: usize,
        /// Seed of the ChaCha stream.
        seed: u64,
    },
}

/// Shapley value of every element of one hypergraph.
#[derive(Debug, Clone)]
pub struct ShapleyValues {
    /// Scoring unit the values belong to.
    pub unit_id: String,
    /// φ per universe index.
    pub values: Vec<f64>,
    /// Exact or sampled.
    pub mode: ShapleyMode,
}

impl ShapleyValues {
    /// φ of the element at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// Σφ over the universe.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Exact for enumeration, approximate for sampling.
    #[must_use]
    pub const fn exactness(&self) -> Exactness {
        match self.mode {
            ShapleyMode::Exact => Exactness::Exact,
            ShapleyMode::Sampled { .. } => Exactness::Approximate,
        }
    }
}

/// Derives the sampling seed of one scoring unit.
#[must_use]
pub fn unit_seed(base: u64, unit_id: &str) -> u64 {
    let mut h = Hasher::new();
    h.update(&base.to_le_bytes());
    h.update(unit_id.as_bytes());
    let bytes = h.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&bytes.as_bytes()[..8]);
    u64::from_le_bytes(first)
}

/// Computes Shapley values, picking exact or sampled mode by universe size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapleyEngine {
    config: ShapleyConfig,
}

impl ShapleyEngine {
    /// Creates an engine with `config`.
    #[must_use]
    pub const fn new(config: ShapleyConfig) -> Self {
        Self { config }
    }

    /// Shapley values of every element of `hypergraph`.
    ///
    /// Thresholds above [`MAX_EXACT_SHAPLEY_THRESHOLD`] are capped, so larger
    /// universes are always sampled. Fails only when the efficiency property
    /// does not hold, which means the hypergraph is broken.
    pub fn values(&self, hypergraph: &Hypergraph) -> Result<ShapleyValues, ExecutionError> {
        let n = hypergraph.universe_size();
        let threshold = self.config.exact_threshold.min(MAX_EXACT_SHAPLEY_THRESHOLD);
        if n <= threshold {
            let values = exact_shapley(hypergraph)?;
            return Ok(ShapleyValues {
                unit_id: hypergraph.unit_id().to_string(),
                values,
                mode: ShapleyMode::Exact,
            });
        }

        let seed = unit_seed(self.config.seed, hypergraph.unit_id());
        let values = sampled_shapley(hypergraph, self.config.samples, seed)?;
        tracing::debug!(
            unit = hypergraph.unit_id(),
            n,
            samples = self.config.samples,
            seed,
            "sampled Shapley values"
        );
        Ok(ShapleyValues {
            unit_id: hypergraph.unit_id().to_string(),
            values,
            mode: ShapleyMode::Sampled {
                samples: self.config.samples,
                seed,
            },
        })
    }
}

/// Exact Shapley values by coalition enumeration.
///
/// Universes larger than [`MAX_EXACT_SHAPLEY_THRESHOLD`] are rejected.
pub fn exact_shapley(hypergraph: &Hypergraph) -> Result<Vec<f64>, ExecutionError> {
    let n = hypergraph.universe_size();
    if n == 0 {
        return Ok(Vec::new());
    }
    if n > MAX_EXACT_SHAPLEY_THRESHOLD {
        return Err(ExecutionError::invariant(
            hypergraph.unit_id(),
            format!(
                "exact Shapley requested for universe of size {n} (limit {MAX_EXACT_SHAPLEY_THRESHOLD})"
            ),
        ));
    }
    if hypergraph.edge_count() == 0 {
        return Ok(vec![0.0; n]);
    }

    let edge_masks: Vec<u64> = hypergraph.edges().iter().map(|e| e.mask()).collect();
    let size = 1usize << n;
    let covers: Vec<bool> = (0..size as u64)
        .map(|c| edge_masks.iter().all(|&em| c & em != 0))
        .collect();

    // weight[k] = k!(n-k-1)!/n! = 1 / (n * C(n-1, k))
    let mut weight = Vec::with_capacity(n);
    let mut binom = 1.0f64;
    for k in 0..n {
        weight.push(1.0 / (n as f64 * binom));
        binom = binom * (n - 1 - k) as f64 / (k + 1) as f64;
    }

    let mut phi = vec![0.0; n];
    for (t, slot) in phi.iter_mut().enumerate() {
        let bit = 1usize << t;
        let mut acc = 0.0;
        for mask in 0..size {
            if mask & bit != 0 || covers[mask] || !covers[mask | bit] {
                continue;
            }
            acc += weight[mask.count_ones() as usize];
        }
        *slot = acc;
    }

    check_efficiency(hypergraph, &phi)?;
    Ok(phi)
}

/// Monte-Carlo Shapley estimate from `samples` random permutations.
///
/// Each permutation credits the single element whose arrival first covers
/// every edge, so the estimates always sum to one.
pub fn sampled_shapley(
    hypergraph: &Hypergraph,
    samples: usize,
    seed: u64,
) -> Result<Vec<f64>, ExecutionError> {
    let n = hypergraph.universe_size();
    let m = hypergraph.edge_count();
    if n == 0 {
        return Ok(Vec::new());
    }
    if m == 0 || samples == 0 {
        return Ok(vec![0.0; n]);
    }

    let incidence = hypergraph.incidence();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    let mut hits = vec![0u32; m];
    let mut credits = vec![0u64; n];

    for _ in 0..samples {
        order.shuffle(&mut rng);
        hits.iter_mut().for_each(|h| *h = 0);

        let mut uncovered = m;
        let mut pivot = None;
        for &v in &order {
            for &ei in &incidence[v] {
                if hits[ei] == 0 {
                    uncovered -= 1;
                }
                hits[ei] += 1;
            }
            if uncovered == 0 {
                pivot = Some(v);
                break;
            }
        }

        let Some(v) = pivot else {
            return Err(ExecutionError::invariant(
                hypergraph.unit_id(),
                format!("{uncovered} edges stay uncovered by the full universe"),
            ));
        };
        credits[v] += 1;
    }

    let phi: Vec<f64> = credits
        .into_iter()
        .map(|c| c as f64 / samples as f64)
        .collect();
    check_efficiency(hypergraph, &phi)?;
    Ok(phi)
}

fn check_efficiency(hypergraph: &Hypergraph, phi: &[f64]) -> Result<(), ExecutionError> {
    // v(U) = 1 and v(∅) = 0 whenever there is at least one (non-empty) edge.
    let expected = if hypergraph.edge_count() == 0 { 0.0 } else { 1.0 };
    let total: f64 = phi.iter().sum();
    if (total - expected).abs() > EFFICIENCY_TOLERANCE {
        return Err(ExecutionError::invariant(
            hypergraph.unit_id(),
            format!("Shapley values sum to {total}, expected {expected}"),
        ));
    }
    Ok(())
}
