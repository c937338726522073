//! Game round log: the current round's snapshot as seen by recovery.
//!
//! Recovery only reads the log, appends references to transactions it
//! replays, and marks cash-outs complete. Wager and win figures belong to
//! the game and are never touched here.

use async_trait::async_trait;
use uuid::Uuid;

pub mod errors;
pub mod models;
pub mod persisted;

pub use errors::{GameHistoryError, GameHistoryResult};
pub use models::{CashOutInfo, GameRoundLog, PlayState, TransactionRef};
pub use persisted::PersistedGameHistory;

/// Contract of the game history subsystem
#[async_trait]
pub trait GameHistory: Send + Sync {
    async fn current_log(&self) -> GameHistoryResult<Option<GameRoundLog>>;

    /// Mark a cash-out of the current round complete
    async fn complete_cash_out(&self, trace_id: Uuid) -> GameHistoryResult<()>;

    /// Reference a history transaction from the current round
    async fn append_transaction(&self, reference: TransactionRef) -> GameHistoryResult<()>;

    async fn is_recovery_needed(&self) -> GameHistoryResult<bool> {
        Ok(self
            .current_log()
            .await?
            .is_some_and(|log| log.play_state.in_progress()))
    }

    async fn has_pending_cash_out(&self) -> GameHistoryResult<bool> {
        Ok(self
            .current_log()
            .await?
            .is_some_and(|log| log.has_pending_cash_out()))
    }
}
