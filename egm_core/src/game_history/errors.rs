//! Game history error types.

use crate::storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

/// Game history errors
#[derive(Debug, Error)]
pub enum GameHistoryError {
    /// Underlying store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// No game round has been logged yet
    #[error("No current game round log")]
    NoCurrentLog,

    /// Cash-out trace id is unknown to the current round
    #[error("Cash-out not found: {0}")]
    CashOutNotFound(Uuid),

    /// Transaction amount does not fit in one value
    #[error("Amount of transaction {0} overflows")]
    AmountOverflow(u64),
}

/// Result type for game history operations
pub type GameHistoryResult<T> = Result<T, GameHistoryError>;
