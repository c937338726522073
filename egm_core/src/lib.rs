//! # EGM Core
//!
//! Money-integrity core of an electronic gaming machine: tracks every
//! credit movement of a game round and, after a crash or power loss,
//! reconstructs the credit ledger and the transaction history to match
//! what was physically paid out.
//!
//! ## Architecture
//!
//! Components, leaves first:
//!
//! - **Persisted store**: named, versioned blocks with atomic multi-field
//!   commits. The single source of truth.
//! - **Transaction history**: globally ordered record of completed
//!   financial transactions, each with a transaction id and trace id.
//! - **Currency ledger**: persisted running total of currency owed to the
//!   player, fed by per-kind accounting rules.
//! - **Game round log**: snapshot of the current round and its cash-outs.
//! - **Game-round recovery**: state machine deciding whether the
//!   interrupted round must be resumed.
//! - **Cash-out recovery**: startup reconciliation of the round against
//!   the history, driving the bank to complete or re-request payouts.
//!
//! ## Core Modules
//!
//! - [`storage`]: Persisted store contract and backends
//! - [`history`]: Transaction history and transaction kinds
//! - [`ledger`]: Currency ledger
//! - [`game_history`]: Game round log
//! - [`recovery`]: Game-round recovery state machine
//! - [`cashout`]: Cash-out recovery engine and bank contract

/// Amount in the smallest currency unit (millicents).
pub type Money = i64;

/// Persisted store with atomic block commits.
pub mod storage;
pub use storage::{MemoryStorage, PersistentStorage, PgStorage, StorageConfig, StorageError};

/// Transaction history and the closed set of transaction kinds.
pub mod history;
pub use history::{PersistedTransactionHistory, Transaction, TransactionDetail, TransactionHistory};

/// Currency ledger.
pub mod ledger;
pub use ledger::{CurrencyLedger, LedgerError, LedgerState};

/// Game round log.
pub mod game_history;
pub use game_history::{GameHistory, GameRoundLog, PersistedGameHistory};

/// Game-round recovery state machine.
pub mod recovery;
pub use recovery::{GamePlayEngine, GameRecovery, RecoveryPhase};

/// Cash-out recovery.
pub mod cashout;
pub use cashout::{
    CashOutRecovery, KeyOffGate, RecoveryConfig, RecoveryContext, RecoveryError, StartupRecovery,
    StartupReport, TransferOutHandler,
};
