//! Causal responsibility of universe elements.
//!
//! For an element t, let E⁻ₜ be the edges that do not contain t, and h*(t)
//! the minimum hitting-set size of E⁻ₜ (zero when E⁻ₜ is empty). The
//! responsibility of t is ρ(t) = 1 / (1 + h*(t)). It equals 1 exactly when t
//! belongs to every edge, and it is never below 1 / (1 + n).

use std::time::Duration;

use crate::error::ExecutionError;
use crate::exactness::Exactness;
use crate::hitting_set::{CacheStats, CachedSolve, EdgeSignature, HittingSetCache, HittingSetSolver, SolveStatus};
use crate::hypergraph::Hypergraph;

/// Responsibility diagnostics for one universe element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementResponsibility {
    /// Universe index.
    pub element: usize,
    /// Minimum hitting-set size of the edges avoiding this element.
    pub h_star: usize,
    /// `1 / (1 + h_star)`.
    pub rho: f64,
    /// Solver status behind `h_star`.
    pub status: SolveStatus,
    /// Solver time (zero on a cache hit).
    pub runtime: Duration,
    /// Number of edges avoiding this element.
    pub filtered_edges: usize,
    /// Whether `h_star` came from the cache.
    pub cached: bool,
}

/// Responsibility of every element of one hypergraph.
#[derive(Debug, Clone)]
pub struct ResponsibilityProfile {
    /// Scoring unit the profile belongs to.
    pub unit_id: String,
    /// Universe size `n`.
    pub universe_size: usize,
    /// Edge count `m`.
    pub edge_count: usize,
    /// One entry per universe element, in index order.
    pub elements: Vec<ElementResponsibility>,
    /// Cache counters for this unit.
    pub cache: CacheStats,
}

impl ResponsibilityProfile {
    /// ρ of the element at `index`.
    #[must_use]
    pub fn rho(&self, index: usize) -> f64 {
        self.elements[index].rho
    }

    /// Exact only if every h* was proven optimal.
    #[must_use]
    pub fn exactness(&self) -> Exactness {
        self.elements
            .iter()
            .fold(Exactness::Exact, |acc, e| acc.and(e.status.exactness()))
    }

    /// Number of elements whose h* is approximate.
    #[must_use]
    pub fn approximate_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| e.status.exactness().is_approximate())
            .count()
    }

    /// ρ normalized to sum to one over the universe.
    ///
    /// A non-positive total on a non-empty universe means the hypergraph was
    /// built wrong and is reported, not clamped.
    pub fn normalized(&self) -> Result<Vec<f64>, ExecutionError> {
        if self.elements.is_empty() {
            return Ok(Vec::new());
        }
        let total: f64 = self.elements.iter().map(|e| e.rho).sum();
        if !(total > 0.0) || !total.is_finite() {
            return Err(ExecutionError::invariant(
                &self.unit_id,
                format!("sum of responsibilities is {total} over {} elements", self.elements.len()),
            ));
        }
        Ok(self.elements.iter().map(|e| e.rho / total).collect())
    }
}

/// Computes responsibility profiles with a bounded hitting-set solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsibilityEngine {
    solver: HittingSetSolver,
}

impl ResponsibilityEngine {
    /// Creates an engine around `solver`.
    #[must_use]
    pub const fn new(solver: HittingSetSolver) -> Self {
        Self { solver }
    }

    /// Computes ρ for every element of `hypergraph`.
    ///
    /// `cache` must be private to this scoring unit.
    #[must_use]
    pub fn profile(&self, hypergraph: &Hypergraph, cache: &mut HittingSetCache) -> ResponsibilityProfile {
        let n = hypergraph.universe_size();
        let mut elements = Vec::with_capacity(n);
        let before = cache.stats();

        for t in 0..n {
            let filtered = hypergraph.edges_excluding(t);
            let signature = EdgeSignature::of(&filtered);

            let (solve, runtime, cached) = match cache.get(&signature) {
                Some(hit) => (hit, Duration::ZERO, true),
                None => {
                    let sol = self.solver.solve(&filtered);
                    let solve = CachedSolve::from(&sol);
                    cache.insert(signature, solve);
                    (solve, sol.elapsed, false)
                }
            };

            elements.push(ElementResponsibility {
                element: t,
                h_star: solve.size,
                rho: 1.0 / (1.0 + solve.size as f64),
                status: solve.status,
                runtime,
                filtered_edges: filtered.len(),
                cached,
            });
        }

        let after = cache.stats();
        let stats = CacheStats {
            hits: after.hits - before.hits,
            misses: after.misses - before.misses,
        };
        tracing::debug!(
            unit = hypergraph.unit_id(),
            n,
            m = hypergraph.edge_count(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "responsibility profile computed"
        );

        ResponsibilityProfile {
            unit_id: hypergraph.unit_id().to_string(),
            universe_size: n,
            edge_count: hypergraph.edge_count(),
            elements,
            cache: stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(n: usize, edges: Vec<Vec<usize>>) -> ResponsibilityProfile {
        let hg = Hypergraph::from_index_edges("unit", n, edges).unwrap();
        ResponsibilityEngine::default().profile(&hg, &mut HittingSetCache::new())
    }

    #[test]
    fn single_pair_splits_responsibility() {
        let p = profile(2, vec![vec![0, 1]]);
        assert_eq!(p.elements[0].h_star, 1);
        assert_eq!(p.rho(0), 0.5);
        assert_eq!(p.rho(1), 0.5);
        assert!(p.exactness().is_exact());
    }

    #[test]
    fn element_in_every_edge_has_full_responsibility() {
        // {A,B}, {A,C}: A is in every edge, B and C each leave one edge hit by A.
        let p = profile(3, vec![vec![0, 1], vec![0, 2]]);
        assert_eq!(p.elements[0].h_star, 0);
        assert_eq!(p.elements[0].status, SolveStatus::Trivial);
        assert_eq!(p.rho(0), 1.0);
        assert_eq!(p.rho(1), 0.5);
        assert_eq!(p.rho(2), 0.5);
    }

    #[test]
    fn responsibility_is_in_unit_interval() {
        let edges = vec![vec![0, 1, 2], vec![2, 3], vec![3, 4], vec![4, 0], vec![1, 5]];
        let p = profile(6, edges.clone());
        for e in &p.elements {
            assert!(e.rho > 0.0 && e.rho <= 1.0);
            assert!(e.rho >= 1.0 / 7.0);
            let in_every_edge = edges.iter().all(|edge| edge.contains(&e.element));
            assert_eq!(e.rho == 1.0, in_every_edge);
        }
    }

    #[test]
    fn identical_filtered_edge_sets_hit_the_cache() {
        // Removing 1 or 2 leaves the same single edge {0, 3}.
        let p = profile(4, vec![vec![0, 3], vec![1, 2]]);
        assert_eq!(p.cache.misses + p.cache.hits, 4);
        assert!(p.cache.hits >= 1);
        assert!(p.elements.iter().any(|e| e.cached));
    }

    #[test]
    fn disabled_cache_solves_every_element() {
        let hg = Hypergraph::from_index_edges("unit", 4, vec![vec![0, 3], vec![1, 2]]).unwrap();
        let p = ResponsibilityEngine::default().profile(&hg, &mut HittingSetCache::with_enabled(false));
        assert_eq!(p.cache, CacheStats::default());
        assert!(p.elements.iter().all(|e| !e.cached));
    }

    #[test]
    fn normalized_responsibility_sums_to_one() {
        let p = profile(3, vec![vec![0, 1], vec![0, 2]]);
        let norm = p.normalized().unwrap();
        assert!((norm.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((norm[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_total_is_an_invariant_violation() {
        let mut p = profile(2, vec![vec![0, 1]]);
        for e in &mut p.elements {
            e.rho = 0.0;
        }
        assert!(matches!(
            p.normalized(),
            Err(ExecutionError::InvariantViolation { .. })
        ));
    }
}
