//! Error types for the store boundary.
//!
//! [`StoreError`] is the single error type returned by all store
//! operations, small enough for exhaustive matching at the call sites that
//! care (missing-key vs. transient failure).

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The addressed key does not exist (`update`/`delete`).
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The backend is unreachable or a worker task died.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the operation could succeed.
    ///
    /// Missing keys and malformed documents are permanent; everything else
    /// is treated as transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::KeyNotFound(_) | Self::Serde(_))
    }
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
