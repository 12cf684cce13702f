use std::fmt;

use thiserror::Error;

/// Identifies which vector an error refers to.
///
/// Stored vectors are addressed by their dense identifier; query vectors are
/// not part of any store and have no identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorRef {
    Stored(usize),
    Query,
}

impl fmt::Display for VectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorRef::Stored(id) => write!(f, "vector {}", id),
            VectorRef::Query => write!(f, "query vector"),
        }
    }
}

/// Top-level error type for rxnsim.
///
/// The similarity core (store, index, pairwise engine, statistics) reports
/// every failure through one of these variants and never logs. All variants
/// are recoverable; the host decides how to present them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    #[error("Dimension mismatch for {vector}: expected {expected}, found {found}")]
    DimensionMismatch {
        vector: VectorRef,
        expected: usize,
        found: usize,
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Degenerate vector {id}: zero norm cannot be normalized")]
    DegenerateVector { id: usize },

    #[error("Degenerate query vector: zero norm cannot be normalized")]
    DegenerateQuery,

    #[error("Invalid value in {vector} at component {component}: NaN or infinite")]
    InvalidVector { vector: VectorRef, component: usize },

    #[error("Vector {id} not found (store holds {size} vectors)")]
    NotFound { id: usize, size: usize },

    #[error("Invalid k: {0} (must be positive)")]
    InvalidK(i64),

    /// `group` names the offending side: "group", "a", "b" or "rest".
    #[error("Insufficient size for {group}: need at least {required}, found {found}")]
    InsufficientGroupSize {
        group: &'static str,
        required: usize,
        found: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        SimError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SimError {
    fn from(err: toml::ser::Error) -> Self {
        SimError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for SimError {
    fn from(err: bincode::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for rxnsim operations.
pub type Result<T> = std::result::Result<T, SimError>;
