//! Branch-and-bound search for a minimum hitting set.
//!
//! The incumbent starts as the greedy solution, so only strictly smaller
//! covers are ever explored (the `Σxᵢ ≤ upper_bound` cut). Nodes are pruned
//! with a disjoint-edge packing lower bound, and branching happens on the
//! uncovered edge with the fewest selectable elements. After a branch on an
//! element finishes, that element is forbidden for its siblings so that no
//! cover is enumerated twice.

use std::time::Instant;

use crate::hypergraph::Edge;

/// Deadline is polled once per this many nodes.
const DEADLINE_POLL_INTERVAL: u64 = 256;

pub(super) struct SearchOutcome {
    pub best: Vec<usize>,
    pub nodes: u64,
    pub timed_out: bool,
}

pub(super) struct BranchAndBound {
    edges: Vec<Vec<usize>>,
    incidence: Vec<Vec<usize>>,
    hit_count: Vec<u32>,
    forbidden: Vec<bool>,
    chosen: Vec<usize>,
    best: Vec<usize>,
    deadline: Instant,
    nodes: u64,
    timed_out: bool,
}

impl BranchAndBound {
    pub fn new(edges: &[&Edge], incumbent: Vec<usize>, deadline: Instant) -> Self {
        let edges = reduce(edges);
        let width = edges
            .iter()
            .flat_map(|e| e.last().copied())
            .max()
            .map_or(0, |m| m + 1);

        let mut incidence = vec![Vec::new(); width];
        for (ei, edge) in edges.iter().enumerate() {
            for &v in edge {
                incidence[v].push(ei);
            }
        }

        Self {
            hit_count: vec![0; edges.len()],
            forbidden: vec![false; width],
            edges,
            incidence,
            chosen: Vec::new(),
            best: incumbent,
            deadline,
            nodes: 0,
            timed_out: false,
        }
    }

    pub fn run(mut self) -> SearchOutcome {
        self.branch();
        SearchOutcome {
            best: self.best,
            nodes: self.nodes,
            timed_out: self.timed_out,
        }
    }

    fn branch(&mut self) {
        if self.timed_out {
            return;
        }
        if self.nodes % DEADLINE_POLL_INTERVAL == 0 && Instant::now() >= self.deadline {
            self.timed_out = true;
            return;
        }
        self.nodes += 1;

        // Smallest uncovered edge, counting only selectable elements.
        let mut pick: Option<(usize, usize)> = None;
        for (ei, edge) in self.edges.iter().enumerate() {
            if self.hit_count[ei] > 0 {
                continue;
            }
            let free = edge.iter().filter(|&&v| !self.forbidden[v]).count();
            if free == 0 {
                // This edge can no longer be hit in this subtree.
                return;
            }
            if pick.map_or(true, |(_, f)| free < f) {
                pick = Some((ei, free));
            }
        }

        let Some((edge_idx, _)) = pick else {
            if self.chosen.len() < self.best.len() {
                self.best = self.chosen.clone();
            }
            return;
        };

        if self.chosen.len() + self.packing_bound() >= self.best.len() {
            return;
        }

        let mut candidates: Vec<usize> = self.edges[edge_idx]
            .iter()
            .copied()
            .filter(|&v| !self.forbidden[v])
            .collect();
        candidates.sort_by_key(|&v| std::cmp::Reverse(self.uncovered_degree(v)));

        let mut excluded = Vec::with_capacity(candidates.len());
        for v in candidates {
            self.select(v);
            self.branch();
            self.deselect(v);
            if self.timed_out {
                break;
            }
            self.forbidden[v] = true;
            excluded.push(v);
        }
        for v in excluded {
            self.forbidden[v] = false;
        }
    }

    fn select(&mut self, v: usize) {
        self.chosen.push(v);
        for &ei in &self.incidence[v] {
            self.hit_count[ei] += 1;
        }
    }

    fn deselect(&mut self, v: usize) {
        self.chosen.pop();
        for &ei in &self.incidence[v] {
            self.hit_count[ei] -= 1;
        }
    }

    fn uncovered_degree(&self, v: usize) -> usize {
        self.incidence[v]
            .iter()
            .filter(|&&ei| self.hit_count[ei] == 0)
            .count()
    }

    /// Number of pairwise-disjoint uncovered edges found greedily (shortest
    /// first). Each needs its own element, so this bounds the remaining cost.
    fn packing_bound(&self) -> usize {
        let mut order: Vec<usize> = (0..self.edges.len())
            .filter(|&ei| self.hit_count[ei] == 0)
            .collect();
        order.sort_by_key(|&ei| self.edges[ei].len());

        let mut used = vec![false; self.forbidden.len()];
        let mut packed = 0;
        for ei in order {
            let free = self.edges[ei].iter().filter(|&&v| !self.forbidden[v]);
            if free.clone().any(|&v| used[v]) {
                continue;
            }
            for &v in free {
                used[v] = true;
            }
            packed += 1;
        }
        packed
    }
}

/// Drops duplicate edges and edges that are supersets of another edge;
/// neither changes the minimum.
fn reduce(edges: &[&Edge]) -> Vec<Vec<usize>> {
    let mut sorted: Vec<&Edge> = edges.to_vec();
    sorted.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    sorted.dedup();

    let mut kept: Vec<&Edge> = Vec::with_capacity(sorted.len());
    for edge in sorted {
        if kept.iter().any(|k| k.is_subset_of(edge)) {
            continue;
        }
        kept.push(edge);
    }
    kept.into_iter().map(|e| e.members().to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_drops_duplicates_and_supersets() {
        let a = Edge::new(vec![0, 1]).unwrap();
        let b = Edge::new(vec![0, 1, 2]).unwrap();
        let c = Edge::new(vec![3]).unwrap();
        let reduced = reduce(&[&b, &a, &a, &c]);
        assert_eq!(reduced, vec![vec![3], vec![0, 1]]);
    }

    #[test]
    fn packing_bound_counts_disjoint_edges() {
        let e1 = Edge::new(vec![0, 1]).unwrap();
        let e2 = Edge::new(vec![2, 3]).unwrap();
        let e3 = Edge::new(vec![1, 2]).unwrap();
        let far = Instant::now() + std::time::Duration::from_secs(60);
        let bnb = BranchAndBound::new(&[&e1, &e2, &e3], vec![0, 1, 2], far);
        assert_eq!(bnb.packing_bound(), 2);
    }
}
