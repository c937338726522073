//! Storage-backed transaction history.

use super::{
    TransactionHistory,
    errors::{HistoryError, HistoryResult},
    models::{Transaction, TransactionDetail},
};
use crate::storage::PersistentStorage;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_BLOCK: &str = "TransactionHistory";
const DEFAULT_CAPACITY: usize = 1000;
const FIELD_NEXT_ID: &str = "next_transaction_id";
const FIELD_TRANSACTIONS: &str = "transactions";

/// Transaction history persisted in a single storage block
pub struct PersistedTransactionHistory {
    storage: Arc<dyn PersistentStorage>,
    block: String,
    capacity: usize,
    /// Serializes id assignment
    write_lock: Mutex<()>,
}

impl PersistedTransactionHistory {
    pub fn new(storage: Arc<dyn PersistentStorage>) -> Self {
        Self::with_block(storage, DEFAULT_BLOCK, DEFAULT_CAPACITY)
    }

    /// # Arguments
    ///
    /// * `storage` - Persisted store
    /// * `block` - Block name holding the records
    /// * `capacity` - Oldest completed records beyond this count are dropped
    pub fn with_block(storage: Arc<dyn PersistentStorage>, block: &str, capacity: usize) -> Self {
        Self {
            storage,
            block: block.to_string(),
            capacity: capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Record a new transaction and assign it the next id
    ///
    /// The record and the id counter are written in one commit.
    ///
    /// # Errors
    ///
    /// * `HistoryError::InvalidAmount` - A negative amount was supplied
    /// * `HistoryError::AmountOverflow` - The split total overflows
    /// * `HistoryError::Storage` - The commit failed
    pub async fn add_transaction(
        &self,
        trace_id: Uuid,
        detail: TransactionDetail,
        completed: bool,
    ) -> HistoryResult<Transaction> {
        let split = detail.split();
        for amount in [split.cashable, split.promo, split.non_cashable] {
            if amount < 0 {
                return Err(HistoryError::InvalidAmount(amount));
            }
        }
        let amount = split.total().ok_or(HistoryError::AmountOverflow)?;

        let _guard = self.write_lock.lock().await;
        let (next_id, mut transactions) = self.load().await?;

        let transaction = Transaction {
            transaction_id: next_id,
            trace_id,
            timestamp: Utc::now(),
            completed,
            detail,
        };
        transactions.push(transaction.clone());
        self.trim(&mut transactions);

        let mut tx = self.storage.start_transaction(&self.block);
        tx.set(FIELD_NEXT_ID, &(next_id + 1))?;
        tx.set(FIELD_TRANSACTIONS, &transactions)?;
        tx.commit().await?;

        info!(
            "Recorded {} transaction {} (trace {}, amount {})",
            transaction.detail.kind_name(),
            transaction.transaction_id,
            trace_id,
            amount
        );
        Ok(transaction)
    }

    /// Mark an in-flight transaction completed
    ///
    /// # Errors
    ///
    /// * `HistoryError::TransactionNotFound` - No record with this id
    pub async fn complete_transaction(&self, transaction_id: u64) -> HistoryResult<Transaction> {
        let _guard = self.write_lock.lock().await;
        let (next_id, mut transactions) = self.load().await?;

        let record = transactions
            .iter_mut()
            .find(|t| t.transaction_id == transaction_id)
            .ok_or(HistoryError::TransactionNotFound(transaction_id))?;
        if record.completed {
            return Ok(record.clone());
        }
        record.completed = true;
        record.timestamp = Utc::now();
        let completed = record.clone();

        let mut tx = self.storage.start_transaction(&self.block);
        tx.set(FIELD_NEXT_ID, &next_id)?;
        tx.set(FIELD_TRANSACTIONS, &transactions)?;
        tx.commit().await?;

        debug!("Transaction {transaction_id} completed");
        Ok(completed)
    }

    async fn load(&self) -> HistoryResult<(u64, Vec<Transaction>)> {
        let Some(block) = self.storage.read_block(&self.block).await? else {
            return Ok((1, Vec::new()));
        };
        let next_id = block.field::<u64>(FIELD_NEXT_ID)?.unwrap_or(1);
        let transactions = block
            .field::<Vec<Transaction>>(FIELD_TRANSACTIONS)?
            .unwrap_or_default();
        Ok((next_id, transactions))
    }

    fn trim(&self, transactions: &mut Vec<Transaction>) {
        while transactions.len() > self.capacity {
            match transactions.iter().position(|t| t.completed) {
                Some(oldest) => {
                    let dropped = transactions.remove(oldest);
                    debug!("History full, dropped transaction {}", dropped.transaction_id);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl TransactionHistory for PersistedTransactionHistory {
    async fn recall_transactions(&self, completed_only: bool) -> HistoryResult<Vec<Transaction>> {
        let (_, mut transactions) = self.load().await?;
        if completed_only {
            transactions.retain(|t| t.completed);
        }
        transactions.sort_by_key(|t| t.transaction_id);
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn history() -> PersistedTransactionHistory {
        PersistedTransactionHistory::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let history = history();
        let trace = Uuid::new_v4();

        let first = history
            .add_transaction(trace, TransactionDetail::BillIn { amount: 100 }, true)
            .await
            .unwrap();
        let second = history
            .add_transaction(trace, TransactionDetail::BillIn { amount: 200 }, true)
            .await
            .unwrap();

        assert_eq!(first.transaction_id, 1);
        assert_eq!(second.transaction_id, 2);
    }

    #[tokio::test]
    async fn test_completed_only_filters_in_flight() {
        let history = history();
        let pending = history
            .add_transaction(Uuid::new_v4(), TransactionDetail::BillIn { amount: 100 }, false)
            .await
            .unwrap();

        assert!(history.recall_transactions(true).await.unwrap().is_empty());
        assert_eq!(history.recall_transactions(false).await.unwrap().len(), 1);

        history
            .complete_transaction(pending.transaction_id)
            .await
            .unwrap();
        assert_eq!(history.recall_transactions(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recall_by_trace() {
        let history = history();
        let trace = Uuid::new_v4();
        history
            .add_transaction(trace, TransactionDetail::BillIn { amount: 100 }, true)
            .await
            .unwrap();
        history
            .add_transaction(Uuid::new_v4(), TransactionDetail::BillIn { amount: 300 }, true)
            .await
            .unwrap();

        let matching = history.recall_by_trace(trace).await.unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].transaction_amount(), Some(100));
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let history = history();
        let err = history
            .add_transaction(Uuid::new_v4(), TransactionDetail::BillIn { amount: -5 }, true)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::InvalidAmount(-5)));
    }

    #[tokio::test]
    async fn test_overflowing_split_rejected() {
        let history = history();
        let err = history
            .add_transaction(
                Uuid::new_v4(),
                TransactionDetail::WatOn {
                    cashable: i64::MAX,
                    promo: 1,
                    non_cashable: 0,
                },
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::AmountOverflow));
        assert!(history.recall_transactions(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest_completed() {
        let history =
            PersistedTransactionHistory::with_block(Arc::new(MemoryStorage::new()), "H", 2);
        for amount in [100, 200, 300] {
            history
                .add_transaction(Uuid::new_v4(), TransactionDetail::BillIn { amount }, true)
                .await
                .unwrap();
        }

        let ids: Vec<u64> = history
            .recall_transactions(false)
            .await
            .unwrap()
            .iter()
            .map(|t| t.transaction_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_failed_commit_does_not_consume_id() {
        let storage = Arc::new(MemoryStorage::new());
        let history = PersistedTransactionHistory::new(storage.clone());

        storage.fail_next_commit();
        assert!(
            history
                .add_transaction(Uuid::new_v4(), TransactionDetail::BillIn { amount: 1 }, true)
                .await
                .is_err()
        );

        let recorded = history
            .add_transaction(Uuid::new_v4(), TransactionDetail::BillIn { amount: 1 }, true)
            .await
            .unwrap();
        assert_eq!(recorded.transaction_id, 1);
    }
}
