//! Object store error types.

use thiserror::Error;

/// Object store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object hash: {0}")]
    InvalidHash(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns whether this is the not-found sentinel, which callers treat as a miss.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for object store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
