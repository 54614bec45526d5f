//! Error types for the store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Permission-set column (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity or relationship absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness or state conflict.
    #[error("{0}")]
    Conflict(String),

    /// The CREATOR membership cannot be removed, promoted, or demoted.
    #[error("creator membership is immutable")]
    CreatorImmutable,

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    Corrupt(String),

    /// Store lock poisoned.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// True if the underlying SQLite error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
