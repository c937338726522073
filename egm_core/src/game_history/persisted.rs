//! Storage-backed game round log.

use super::{
    GameHistory,
    errors::{GameHistoryError, GameHistoryResult},
    models::{CashOutInfo, GameRoundLog, PlayState, TransactionRef},
};
use crate::{Money, history::TransferOutReason, storage::PersistentStorage};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_BLOCK: &str = "GameHistory";
const FIELD_CURRENT_LOG: &str = "current_log";
const FIELD_LOG_SEQUENCE: &str = "log_sequence";

/// Game round log persisted in a single storage block
pub struct PersistedGameHistory {
    storage: Arc<dyn PersistentStorage>,
    block: String,
    write_lock: Mutex<()>,
}

impl PersistedGameHistory {
    pub fn new(storage: Arc<dyn PersistentStorage>) -> Self {
        Self::with_block(storage, DEFAULT_BLOCK)
    }

    pub fn with_block(storage: Arc<dyn PersistentStorage>, block: &str) -> Self {
        Self {
            storage,
            block: block.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Open a new round, replacing the previous log
    ///
    /// # Arguments
    ///
    /// * `game_id` - Game being played
    /// * `transaction_id` - Last history transaction id before the round
    /// * `wager` - Amount wagered
    pub async fn start_round(
        &self,
        game_id: i32,
        transaction_id: u64,
        wager: Money,
    ) -> GameHistoryResult<GameRoundLog> {
        let _guard = self.write_lock.lock().await;
        let sequence = self
            .storage
            .read_field::<u64>(&self.block, FIELD_LOG_SEQUENCE)
            .await?
            .unwrap_or(0)
            + 1;

        let log = GameRoundLog {
            transaction_id,
            log_sequence: sequence,
            game_id,
            start_time: Utc::now(),
            end_time: None,
            play_state: PlayState::PrimaryGameStarted,
            cash_out_info: Vec::new(),
            transactions: Vec::new(),
            final_wager: wager,
            final_win: 0,
        };

        let mut tx = self.storage.start_transaction(&self.block);
        tx.set(FIELD_LOG_SEQUENCE, &sequence)?;
        tx.set(FIELD_CURRENT_LOG, &log)?;
        tx.commit().await?;

        info!("Game round {sequence} started for game {game_id}");
        Ok(log)
    }

    pub async fn set_play_state(&self, play_state: PlayState) -> GameHistoryResult<()> {
        self.update(|log| {
            log.play_state = play_state;
            Ok(true)
        })
        .await
    }

    /// Record the win and close the round
    pub async fn end_round(&self, final_win: Money) -> GameHistoryResult<()> {
        self.update(|log| {
            log.final_win = final_win;
            log.end_time = Some(Utc::now());
            log.play_state = PlayState::PresentationIdle;
            Ok(true)
        })
        .await
    }

    /// Register a cash-out request against the current round
    pub async fn add_cash_out(
        &self,
        trace_id: Uuid,
        amount: Money,
        reason: TransferOutReason,
        handpay: bool,
    ) -> GameHistoryResult<()> {
        self.update(|log| {
            if log.cash_out_info.iter().any(|info| info.trace_id == trace_id) {
                return Ok(false);
            }
            log.cash_out_info.push(CashOutInfo {
                trace_id,
                amount,
                reason,
                handpay,
                complete: false,
            });
            Ok(true)
        })
        .await
    }

    /// Read-modify-write of the current log; the closure returns whether to commit
    async fn update<F>(&self, apply: F) -> GameHistoryResult<()>
    where
        F: FnOnce(&mut GameRoundLog) -> GameHistoryResult<bool> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut log = self
            .storage
            .read_field::<GameRoundLog>(&self.block, FIELD_CURRENT_LOG)
            .await?
            .ok_or(GameHistoryError::NoCurrentLog)?;

        if !apply(&mut log)? {
            return Ok(());
        }

        let mut tx = self.storage.start_transaction(&self.block);
        tx.set(FIELD_CURRENT_LOG, &log)?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl GameHistory for PersistedGameHistory {
    async fn current_log(&self) -> GameHistoryResult<Option<GameRoundLog>> {
        Ok(self
            .storage
            .read_field::<GameRoundLog>(&self.block, FIELD_CURRENT_LOG)
            .await?)
    }

    async fn complete_cash_out(&self, trace_id: Uuid) -> GameHistoryResult<()> {
        self.update(|log| {
            let cash_out = log
                .cash_out_info
                .iter_mut()
                .find(|cash_out| cash_out.trace_id == trace_id)
                .ok_or(GameHistoryError::CashOutNotFound(trace_id))?;
            if cash_out.complete {
                return Ok(false);
            }
            cash_out.complete = true;
            info!("Cash-out {trace_id} complete");
            Ok(true)
        })
        .await
    }

    async fn append_transaction(&self, reference: TransactionRef) -> GameHistoryResult<()> {
        self.update(|log| {
            if log.references(reference.transaction_id) {
                debug!(
                    "Transaction {} already referenced by round {}",
                    reference.transaction_id, log.log_sequence
                );
                return Ok(false);
            }
            log.transactions.push(reference);
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn history() -> PersistedGameHistory {
        PersistedGameHistory::new(Arc::new(MemoryStorage::new()))
    }

    fn reference(transaction_id: u64) -> TransactionRef {
        TransactionRef {
            transaction_id,
            trace_id: Uuid::new_v4(),
            amount: 100,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_no_log_on_fresh_machine() {
        let history = history();
        assert!(history.current_log().await.unwrap().is_none());
        assert!(!history.is_recovery_needed().await.unwrap());
        assert!(!history.has_pending_cash_out().await.unwrap());
        assert!(matches!(
            history.complete_cash_out(Uuid::new_v4()).await,
            Err(GameHistoryError::NoCurrentLog)
        ));
    }

    #[tokio::test]
    async fn test_round_lifecycle_drives_recovery_needed() {
        let history = history();
        let first = history.start_round(3, 10, 500).await.unwrap();
        assert_eq!(first.log_sequence, 1);
        assert!(history.is_recovery_needed().await.unwrap());

        history.end_round(1200).await.unwrap();
        let log = history.current_log().await.unwrap().unwrap();
        assert_eq!(log.final_win, 1200);
        assert!(log.end_time.is_some());
        assert!(!history.is_recovery_needed().await.unwrap());

        let second = history.start_round(3, 12, 500).await.unwrap();
        assert_eq!(second.log_sequence, 2);
    }

    #[tokio::test]
    async fn test_cash_out_completion_is_monotonic() {
        let history = history();
        history.start_round(1, 0, 100).await.unwrap();
        let trace = Uuid::new_v4();
        history
            .add_cash_out(trace, 1000, TransferOutReason::CashOut, false)
            .await
            .unwrap();
        assert!(history.has_pending_cash_out().await.unwrap());

        history.complete_cash_out(trace).await.unwrap();
        history.complete_cash_out(trace).await.unwrap();
        // Re-adding the same trace id cannot reopen it
        history
            .add_cash_out(trace, 1000, TransferOutReason::CashOut, false)
            .await
            .unwrap();

        let log = history.current_log().await.unwrap().unwrap();
        assert_eq!(log.cash_out_info.len(), 1);
        assert!(log.cash_out_info[0].complete);
        assert!(!history.has_pending_cash_out().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_cash_out_trace() {
        let history = history();
        history.start_round(1, 0, 100).await.unwrap();
        let trace = Uuid::new_v4();
        assert!(matches!(
            history.complete_cash_out(trace).await,
            Err(GameHistoryError::CashOutNotFound(t)) if t == trace
        ));
    }

    #[tokio::test]
    async fn test_append_transaction_deduplicates() {
        let history = history();
        history.start_round(1, 0, 100).await.unwrap();

        history.append_transaction(reference(5)).await.unwrap();
        history.append_transaction(reference(5)).await.unwrap();
        history.append_transaction(reference(6)).await.unwrap();

        let log = history.current_log().await.unwrap().unwrap();
        assert_eq!(log.transactions.len(), 2);
        assert!(log.references(5));
        assert!(log.references(6));
    }
}
