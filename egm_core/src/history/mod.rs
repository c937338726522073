//! Append-only, globally ordered record of completed financial transactions.
//!
//! Every bill, voucher, hand-pay, wallet transfer and bonus gets a
//! monotonically increasing transaction id and carries the trace id of the
//! request it settles. Recovery reads this log to find out what was
//! physically paid before a crash.

use async_trait::async_trait;
use uuid::Uuid;

pub mod errors;
pub mod models;
pub mod persisted;

pub use errors::{HistoryError, HistoryResult};
pub use models::{
    AccountSplit, AccountType, BonusMode, HandpayKind, KeyedDirection, PayMethod, Transaction,
    TransactionDetail, TransferOutReason,
};
pub use persisted::PersistedTransactionHistory;

/// Read contract of the transaction history
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    /// All transactions in ascending id order
    async fn recall_transactions(&self, completed_only: bool) -> HistoryResult<Vec<Transaction>>;

    /// Completed transactions settling one trace id
    async fn recall_by_trace(&self, trace_id: Uuid) -> HistoryResult<Vec<Transaction>> {
        Ok(self
            .recall_transactions(true)
            .await?
            .into_iter()
            .filter(|transaction| transaction.trace_id == trace_id)
            .collect())
    }
}
