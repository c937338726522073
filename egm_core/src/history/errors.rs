//! Transaction history error types.

use crate::{Money, storage::StorageError};
use thiserror::Error;

/// Transaction history errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Underlying store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// No record with this id
    #[error("Transaction not found: {0}")]
    TransactionNotFound(u64),

    /// Amounts must not be negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// Account split does not fit in one amount
    #[error("Transaction amount overflows")]
    AmountOverflow,
}

/// Result type for transaction history operations
pub type HistoryResult<T> = Result<T, HistoryError>;
