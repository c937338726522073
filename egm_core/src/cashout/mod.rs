//! Cash-out recovery: reconciles the ledger and the current game round
//! against the transaction history after an abnormal restart.
//!
//! Two passes run at startup, chosen by whether the round has a cash-out
//! that was never confirmed:
//! - backfill replays history transactions the round never saw
//! - reconciliation settles each pending cash-out from the transactions
//!   carrying its trace id, re-requesting any shortfall from the bank
//!
//! ## Example
//!
//! ```no_run
//! use egm_core::cashout::{
//!     KeyOffGate, OutboxTransferOut, RecoveryConfig, RecoveryContext, StartupRecovery,
//! };
//! use egm_core::game_history::PersistedGameHistory;
//! use egm_core::history::PersistedTransactionHistory;
//! use egm_core::ledger::{CurrencyLedger, LEDGER_BLOCK};
//! use egm_core::recovery::{GamePlayEngine, GameRecovery};
//! use egm_core::storage::{MemoryStorage, PersistentStorage};
//! use std::sync::Arc;
//!
//! struct Engine;
//!
//! impl GamePlayEngine for Engine {
//!     fn is_idle(&self) -> bool { false }
//!     fn enter_faulted(&self, _game_id: i32) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage: Arc<dyn PersistentStorage> = Arc::new(MemoryStorage::new());
//!     let history = Arc::new(PersistedTransactionHistory::new(storage.clone()));
//!     let context = RecoveryContext {
//!         ledger: Arc::new(CurrencyLedger::load(storage.clone(), LEDGER_BLOCK).await?),
//!         history: history.clone(),
//!         game_history: Arc::new(PersistedGameHistory::new(storage.clone())),
//!         bank: Arc::new(OutboxTransferOut::new(storage.clone(), history)),
//!         game_recovery: Arc::new(GameRecovery::new(Arc::new(Engine))),
//!         key_off: Arc::new(KeyOffGate::new()),
//!         config: RecoveryConfig::default(),
//!     };
//!
//!     let startup = StartupRecovery::new(context);
//!     let report = startup.run().await?;
//!     println!("Pending amount after recovery: {}", report.amount_in);
//!     Ok(())
//! }
//! ```

use crate::{Money, history::TransferOutReason};
use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

pub mod config;
pub mod engine;
pub mod errors;
pub mod key_off;
pub mod outbox;
pub mod startup;

pub use config::RecoveryConfig;
pub use engine::{CashOutRecovery, RecoveryContext};
pub use errors::{RecoveryError, RecoveryResult, TransferError, TransferResult};
pub use key_off::{KeyOffGate, KeyOffWaiter};
pub use outbox::{OutboxTransferOut, PayoutRequest};
pub use startup::{StartupRecovery, StartupReport};

/// Bank / transfer-out handler executing physical payouts
///
/// A payout accepted by `force_handpay` or `force_voucher_out` must be
/// reported by `recover` until its transaction lands in the history.
#[async_trait]
pub trait TransferOutHandler: Send + Sync {
    /// Resume outstanding transfers
    ///
    /// # Returns
    ///
    /// * `HashSet<Uuid>` - Trace ids whose payout continues asynchronously
    async fn recover(&self) -> TransferResult<HashSet<Uuid>>;

    /// Request an attendant hand-pay
    async fn force_handpay(
        &self,
        trace_id: Uuid,
        amount: Money,
        reason: TransferOutReason,
        associated_transaction_id: u64,
    ) -> TransferResult<bool>;

    /// Request a cash-out on the default device, usually a voucher
    async fn force_voucher_out(
        &self,
        trace_id: Uuid,
        amount: Money,
        reason: TransferOutReason,
        associated_transaction_id: u64,
    ) -> TransferResult<bool>;
}
