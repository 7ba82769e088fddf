//! Storage backend error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by an [`AtomicStore`](super::AtomicStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Operation timed out
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Gave up after repeatedly losing a write race on a key
    #[error("Too much contention on key {0}")]
    Contention(String),

    /// COMMIT was sent but its acknowledgement never arrived. The write may
    /// or may not have been applied, so it must not be repeated blindly.
    #[error("Commit outcome unknown for key {key}: {reason}")]
    CommitUnknown { key: String, reason: String },
}

impl StoreError {
    /// Whether the failed operation certainly left the store unchanged, so
    /// running it again cannot apply it twice.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::Timeout(_) | StoreError::Contention(_)
        )
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
