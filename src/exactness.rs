//! Exact-versus-approximate flag carried alongside every weight and score.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a value was proven exact or is a bounded approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Exactness {
    /// Proven optimal (or trivially known).
    #[default]
    Exact,

    /// Greedy fallback, unproven incumbent, or a sampled estimate.
    Approximate,
}

impl Exactness {
    /// Returns `true` if this is `Exact`.
    pub const fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }

    /// Returns `true` if this is `Approximate`.
    pub const fn is_approximate(&self) -> bool {
        matches!(self, Self::Approximate)
    }

    /// Joins two flags: one approximate input makes the result approximate.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Exact, Self::Exact) => Self::Exact,
            _ => Self::Approximate,
        }
    }
}

impl fmt::Display for Exactness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Approximate => write!(f, "approximate"),
        }
    }
}
