//! Currency ledger tracking the amount currently owed to the player.
//!
//! This module implements:
//! - Per-kind accounting rules for bills, vouchers, hand-pays, wallet
//!   transfers and bonuses
//! - Atomic commits of the pending amount together with its records
//! - Replay-safe crediting (a transaction id is folded in at most once)
//! - Settlement through [`CurrencyLedger::reset`]
//!
//! ## Example
//!
//! ```
//! use egm_core::history::{Transaction, TransactionDetail};
//! use egm_core::ledger::{CurrencyLedger, LEDGER_BLOCK};
//! use egm_core::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = CurrencyLedger::load(Arc::new(MemoryStorage::new()), LEDGER_BLOCK).await?;
//!
//! let bill = Transaction {
//!     transaction_id: 1,
//!     trace_id: uuid::Uuid::new_v4(),
//!     timestamp: chrono::Utc::now(),
//!     completed: true,
//!     detail: TransactionDetail::BillIn { amount: 5000 },
//! };
//! ledger.credit(&bill, None, None).await?;
//! assert_eq!(ledger.amount_in().await, 5000);
//!
//! let settled = ledger.reset().await?;
//! assert_eq!(settled, 5000);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::{Classification, CurrencyLedger, LEDGER_BLOCK, classify};
pub use models::{EntryDirection, LedgerState, TransactionKind, TransactionRecord};
