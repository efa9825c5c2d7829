//! Index-compressed hypergraphs over one scoring unit's universe.
//!
//! The universe is the union of a family's witness sets. Elements get dense
//! 0-based indices in sorted `TupleId` order, so every algorithm downstream
//! sees the same numbering on every run.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::tuple::TupleId;
use crate::witness::WitnessFamily;

/// A non-empty, sorted, duplicate-free set of universe indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge(Vec<usize>);

impl Edge {
    /// Builds an edge from raw indices. Empty edges cannot be hit and are rejected.
    pub fn new(mut members: Vec<usize>) -> Result<Self, ValidationError> {
        members.sort_unstable();
        members.dedup();
        if members.is_empty() {
            return Err(ValidationError::EmptyWitnessSet {
                unit: "<hypergraph>".to_string(),
                witness: "<edge>".to_string(),
            });
        }
        Ok(Self(members))
    }

    /// Member indices in ascending order.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.0
    }

    /// Returns true if `element` belongs to this edge.
    #[must_use]
    pub fn contains(&self, element: usize) -> bool {
        self.0.binary_search(&element).is_ok()
    }

    /// Number of members (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed edge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit mask of the edge. Only meaningful when every member is below 64.
    #[must_use]
    pub fn mask(&self) -> u64 {
        self.0
            .iter()
            .filter(|&&i| i < 64)
            .fold(0u64, |acc, &i| acc | (1u64 << i))
    }

    /// Returns true if every member of `self` is also a member of `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Edge) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        let mut rest = other.0.iter();
        'outer: for &x in &self.0 {
            for &y in rest.by_ref() {
                if y == x {
                    continue 'outer;
                }
                if y > x {
                    return false;
                }
            }
            return false;
        }
        true
    }
}

/// Hypergraph over a dense universe.
#[derive(Debug, Clone)]
pub struct Hypergraph {
    unit_id: String,
    universe: Vec<TupleId>,
    index: HashMap<TupleId, usize>,
    edges: Vec<Edge>,
}

impl Hypergraph {
    /// Builds the hypergraph of a witness family.
    ///
    /// Duplicate witness sets become duplicate edges.
    #[must_use]
    pub fn from_family(family: &WitnessFamily) -> Self {
        let universe: Vec<TupleId> = family.universe().into_iter().cloned().collect();
        let index: HashMap<TupleId, usize> = universe
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        // Witness sets are non-empty and their members sorted, so the mapped
        // index lists are already valid edges.
        let edges = family
            .sets
            .iter()
            .map(|set| Edge(set.iter().map(|t| index[t]).collect()))
            .collect();

        Self {
            unit_id: family.unit_id.clone(),
            universe,
            index,
            edges,
        }
    }

    /// Builds a hypergraph directly from index edges over `n` anonymous elements.
    ///
    /// Elements are named `_:<i>`. Indices must be below `n`.
    pub fn from_index_edges(
        unit_id: impl Into<String>,
        n: usize,
        edges: Vec<Vec<usize>>,
    ) -> Result<Self, ValidationError> {
        let unit_id = unit_id.into();
        let mut built = Vec::with_capacity(edges.len());
        for (i, raw) in edges.into_iter().enumerate() {
            if let Some(&bad) = raw.iter().find(|&&x| x >= n) {
                return Err(ValidationError::MalformedRow {
                    line: i,
                    reason: format!("edge member {bad} outside universe of size {n}"),
                });
            }
            let edge = Edge::new(raw).map_err(|_| ValidationError::EmptyWitnessSet {
                unit: unit_id.clone(),
                witness: i.to_string(),
            })?;
            built.push(edge);
        }

        let universe: Vec<TupleId> = (0..n)
            .map(|i| TupleId {
                relation: "_".to_string(),
                key: crate::tuple::PrimaryKey::single(i64::try_from(i).unwrap_or(i64::MAX)),
            })
            .collect();
        let index = universe
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Ok(Self {
            unit_id,
            universe,
            index,
            edges: built,
        })
    }

    /// Scoring-unit identity.
    #[must_use]
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// Universe size `n`.
    #[must_use]
    pub fn universe_size(&self) -> usize {
        self.universe.len()
    }

    /// Tuple at a universe index.
    #[must_use]
    pub fn element(&self, index: usize) -> &TupleId {
        &self.universe[index]
    }

    /// Universe in index order.
    #[must_use]
    pub fn universe(&self) -> &[TupleId] {
        &self.universe
    }

    /// Index of a tuple, if it belongs to the universe.
    #[must_use]
    pub fn index_of(&self, tuple: &TupleId) -> Option<usize> {
        self.index.get(tuple).copied()
    }

    /// All edges, in family order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of edges `m`.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Borrowed view of every edge.
    #[must_use]
    pub fn edge_refs(&self) -> Vec<&Edge> {
        self.edges.iter().collect()
    }

    /// Edges that do not contain `element` (the E⁻ₜ of responsibility).
    #[must_use]
    pub fn edges_excluding(&self, element: usize) -> Vec<&Edge> {
        self.edges.iter().filter(|e| !e.contains(element)).collect()
    }

    /// For each element, the indices of the edges containing it.
    #[must_use]
    pub fn incidence(&self) -> Vec<Vec<usize>> {
        let mut inc = vec![Vec::new(); self.universe.len()];
        for (ei, edge) in self.edges.iter().enumerate() {
            for &v in edge.members() {
                inc[v].push(ei);
            }
        }
        inc
    }
}

/// Returns true if `members` intersects every edge.
#[must_use]
pub fn hits_all(members: &[usize], edges: &[&Edge]) -> bool {
    edges
        .iter()
        .all(|e| members.iter().any(|&m| e.contains(m)))
}
