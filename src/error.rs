//! Error types for the attribution engine.
//!
//! All errors are strongly typed using thiserror. Malformed input is a
//! `ValidationError` and is rejected before any computation starts.
//! Broken invariants and runtime plumbing failures are `ExecutionError`s.
//!
//! Solver timeouts and missing measure rows are *not* errors: the former
//! degrade to an approximate result, the latter contribute zero.

use thiserror::Error;

/// Validation errors that occur while constructing inputs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Witness set {witness} of unit '{unit}' is empty")]
    EmptyWitnessSet {
        unit: String,
        witness: String,
    },

    #[error("Primary key '{raw}' cannot be normalized to an integer tuple: {reason}")]
    InvalidPrimaryKey {
        raw: String,
        reason: String,
    },

    #[error("Relation name cannot be empty")]
    EmptyRelation,

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Unknown {kind} '{value}'")]
    UnknownKind {
        kind: &'static str,
        value: String,
    },

    #[error("Duplicate key: {key}")]
    DuplicateKey {
        key: String,
    },

    #[error("Value of {what} is not finite")]
    NonFiniteValue {
        what: String,
    },

    #[error("Value of {what} is negative: {value}")]
    NegativeValue {
        what: String,
        value: f64,
    },

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow {
        line: usize,
        reason: String,
    },
}

/// Execution errors that occur while scoring.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Invariant violated in {unit}: {reason}")]
    InvariantViolation {
        unit: String,
        reason: String,
    },

    #[error("Scoring queue is full (capacity: {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Scoring worker disconnected before replying")]
    Disconnected,

    #[error("Failed to spawn scoring worker: {message}")]
    WorkerSpawn {
        message: String,
    },

    #[error("Scoring timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("I/O error on {path}: {message}")]
    Io {
        path: String,
        message: String,
    },
}

impl ExecutionError {
    /// Creates an invariant violation for the given scoring unit.
    #[must_use]
    pub fn invariant(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            unit: unit.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum IcqaError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl IcqaError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}

/// Result type alias for engine operations.
pub type IcqaResult<T> = Result<T, IcqaError>;
