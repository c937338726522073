//! Currency ledger error types.

use crate::{Money, storage::StorageError};
use thiserror::Error;

/// Currency ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Commit could not be durably applied
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid amount (must not be negative)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// Balance overflow
    #[error("Pending amount would overflow")]
    BalanceOverflow,
}

impl LedgerError {
    /// Whether the host must halt game play
    ///
    /// A storage failure leaves the balance unconfirmed, so it is treated as
    /// a crash condition rather than retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::Storage(_) | LedgerError::BalanceOverflow)
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
