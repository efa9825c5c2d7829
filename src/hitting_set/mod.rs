//! Minimal hitting sets.
//!
//! `HittingSetSolver` returns the smallest number of universe elements that
//! intersect every edge of a hypergraph. It first computes a greedy upper
//! bound, then runs an exact branch-and-bound search seeded with the greedy
//! solution as incumbent, under a wall-clock budget. When the budget runs out
//! the best solution found so far is returned and flagged as approximate.

mod cache;
mod search;

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::exactness::Exactness;
use crate::hypergraph::Edge;

pub use cache::{CacheStats, CachedSolve, EdgeSignature, HittingSetCache};

/// Terminal state of one solver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// No edges: the empty set hits everything.
    Trivial,
    /// Search finished; the size is proven minimal.
    Optimal,
    /// Search timed out after improving on the greedy bound.
    Feasible,
    /// Search timed out without improving; the greedy bound is returned.
    Timeout,
}

impl SolveStatus {
    /// Exactness of a result with this status.
    #[must_use]
    pub const fn exactness(self) -> Exactness {
        match self {
            Self::Trivial | Self::Optimal => Exactness::Exact,
            Self::Feasible | Self::Timeout => Exactness::Approximate,
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trivial => write!(f, "TRIVIAL"),
            Self::Optimal => write!(f, "OPTIMAL"),
            Self::Feasible => write!(f, "FEASIBLE"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Result of one hitting-set computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HittingSetSolution {
    /// Size of the returned hitting set.
    pub size: usize,
    /// A hitting set of exactly `size` elements, ascending.
    pub members: Vec<usize>,
    /// How the search ended.
    pub status: SolveStatus,
    /// Size of the greedy solution used as upper bound.
    pub greedy_bound: usize,
    /// Branch-and-bound nodes visited.
    pub nodes: u64,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl HittingSetSolution {
    /// Exactness of this solution.
    #[must_use]
    pub const fn exactness(&self) -> Exactness {
        self.status.exactness()
    }
}

/// Greedy hitting set: repeatedly take the element hitting the most
/// uncovered edges (lowest index on ties).
#[must_use]
pub fn greedy_hitting_set(edges: &[&Edge]) -> Vec<usize> {
    let width = edges
        .iter()
        .flat_map(|e| e.members().last().copied())
        .max()
        .map_or(0, |m| m + 1);

    let mut uncovered: Vec<&Edge> = edges.to_vec();
    let mut picked = Vec::new();
    let mut freq = vec![0usize; width];

    while !uncovered.is_empty() {
        freq.iter_mut().for_each(|f| *f = 0);
        for edge in &uncovered {
            for &v in edge.members() {
                freq[v] += 1;
            }
        }

        let mut best = 0usize;
        for (v, &f) in freq.iter().enumerate() {
            if f > freq[best] {
                best = v;
            }
        }

        picked.push(best);
        uncovered.retain(|e| !e.contains(best));
    }

    picked.sort_unstable();
    picked
}

/// Exact minimal-hitting-set solver with a per-call time budget.
#[derive(Debug, Clone, Copy)]
pub struct HittingSetSolver {
    budget: Duration,
}

impl Default for HittingSetSolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl HittingSetSolver {
    /// Creates a solver that gives up after `budget` per call.
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Per-call wall-clock budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Computes a minimum hitting set of `edges`.
    #[must_use]
    pub fn solve(&self, edges: &[&Edge]) -> HittingSetSolution {
        let started = Instant::now();
        if edges.is_empty() {
            return HittingSetSolution {
                size: 0,
                members: Vec::new(),
                status: SolveStatus::Trivial,
                greedy_bound: 0,
                nodes: 0,
                elapsed: started.elapsed(),
            };
        }

        let greedy = greedy_hitting_set(edges);
        let greedy_bound = greedy.len();
        let deadline = started + self.budget;

        let outcome = search::BranchAndBound::new(edges, greedy, deadline).run();

        let status = match (outcome.timed_out, outcome.best.len() < greedy_bound) {
            (false, _) => SolveStatus::Optimal,
            (true, true) => SolveStatus::Feasible,
            (true, false) => SolveStatus::Timeout,
        };
        if outcome.timed_out {
            tracing::debug!(
                edges = edges.len(),
                greedy_bound,
                best = outcome.best.len(),
                nodes = outcome.nodes,
                %status,
                "hitting-set search hit its time budget"
            );
        }

        let mut members = outcome.best;
        members.sort_unstable();
        HittingSetSolution {
            size: members.len(),
            members,
            status,
            greedy_bound,
            nodes: outcome.nodes,
            elapsed: started.elapsed(),
        }
    }
}
