//! Cash-out recovery error types.

use crate::{
    game_history::GameHistoryError, history::HistoryError, ledger::LedgerError,
    storage::StorageError,
};
use thiserror::Error;
use uuid::Uuid;

/// Transfer-out handler errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// Underlying store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Transaction history could not be read
    #[error("Transaction history error: {0}")]
    History(#[from] HistoryError),

    /// Payout device is unavailable
    #[error("Transfer device unavailable: {0}")]
    Unavailable(String),
}

/// Result type for transfer-out operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Cash-out recovery errors
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Transaction history error: {0}")]
    History(#[from] HistoryError),

    #[error("Game history error: {0}")]
    GameHistory(#[from] GameHistoryError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Operator abandoned the key-off for a large payout
    #[error("Key-off aborted for cash-out {0}")]
    KeyOffAborted(Uuid),
}

impl RecoveryError {
    /// Whether the host must halt game play
    pub fn is_fatal(&self) -> bool {
        match self {
            RecoveryError::Ledger(e) => e.is_fatal(),
            RecoveryError::History(HistoryError::Storage(_))
            | RecoveryError::GameHistory(GameHistoryError::Storage(_))
            | RecoveryError::Transfer(TransferError::Storage(_))
            | RecoveryError::Transfer(TransferError::History(HistoryError::Storage(_))) => true,
            _ => false,
        }
    }
}

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;
