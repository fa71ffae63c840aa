//! Errors raised by the persistence gateway.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Failures of a [`PersistRepository`](crate::PersistRepository) call or of
/// the typed services layered on it.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state store: {0}")]
    Open(String),

    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("state table unavailable: {0}")]
    Table(String),

    #[error("state read failed: {0}")]
    Read(String),

    #[error("state write failed: {0}")]
    Write(String),

    #[error("failed to encode value: {0}")]
    Serialize(String),

    #[error("failed to decode value at {path}: {reason}")]
    Deserialize { path: String, reason: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
