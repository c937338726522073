//! Storage error types.

use thiserror::Error;

/// Persisted store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Field could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Commit was rejected by the backend
    #[error("Commit to block {block} failed: {reason}")]
    CommitFailed { block: String, reason: String },

    /// Stored field does not match the expected shape
    #[error("Corrupted field {field} in block {block}")]
    CorruptedField { block: String, field: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
