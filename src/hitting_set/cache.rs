//! Per-unit hitting-set cache.
//!
//! Responsibility scoring solves one hitting-set instance per universe
//! element, and different elements often leave the very same filtered edge
//! collection behind. Results are keyed by a canonical signature of that
//! collection. A cache belongs to exactly one scoring unit.

use std::collections::HashMap;

use blake3::Hasher;

use crate::hitting_set::{HittingSetSolution, SolveStatus};
use crate::hypergraph::Edge;

/// Canonical digest of an edge multiset.
///
/// Edge order does not matter; edge multiplicity does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeSignature([u8; 32]);

impl EdgeSignature {
    /// Computes the signature of `edges`.
    #[must_use]
    pub fn of(edges: &[&Edge]) -> Self {
        let mut canonical: Vec<&[usize]> = edges.iter().map(|e| e.members()).collect();
        canonical.sort_unstable();

        let mut h = Hasher::new();
        h.update(&(canonical.len() as u64).to_le_bytes());
        for edge in canonical {
            h.update(&(edge.len() as u64).to_le_bytes());
            for &v in edge {
                h.update(&(v as u64).to_le_bytes());
            }
        }
        Self(*h.finalize().as_bytes())
    }
}

/// Cached `(size, status)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedSolve {
    /// Hitting-set size.
    pub size: usize,
    /// Status of the solve that produced it.
    pub status: SolveStatus,
}

impl From<&HittingSetSolution> for CachedSolve {
    fn from(sol: &HittingSetSolution) -> Self {
        Self {
            size: sol.size,
            status: sol.status,
        }
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required a solve.
    pub misses: u64,
}

impl CacheStats {
    /// Adds another unit's counters.
    pub fn absorb(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
    }
}

/// Signature-keyed cache of solver results for one scoring unit.
#[derive(Debug)]
pub struct HittingSetCache {
    enabled: bool,
    entries: HashMap<EdgeSignature, CachedSolve>,
    stats: CacheStats,
}

impl Default for HittingSetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HittingSetCache {
    /// Creates an enabled cache.
    #[must_use]
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// Creates a cache; a disabled cache never stores or returns anything.
    #[must_use]
    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Looks up a signature, counting the hit or miss.
    pub fn get(&mut self, signature: &EdgeSignature) -> Option<CachedSolve> {
        if !self.enabled {
            return None;
        }
        let found = self.entries.get(signature).copied();
        if found.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        found
    }

    /// Stores a solve result.
    pub fn insert(&mut self, signature: EdgeSignature, solve: CachedSolve) {
        if self.enabled {
            self.entries.insert(signature, solve);
        }
    }

    /// Number of cached signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit/miss counters so far.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }
}
