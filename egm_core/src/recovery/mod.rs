//! Game-round recovery state machine.
//!
//! Decides whether the round that was in flight at shutdown must be
//! resumed. The state lives for the process lifetime only; on restart it
//! is recomputed from the game round log.

pub mod manager;
pub mod models;

pub use manager::GameRecovery;
pub use models::{RecoveryPhase, RecoveryState};

/// Game-play engine driven by recovery
pub trait GamePlayEngine: Send + Sync {
    /// Whether the engine has no round in progress
    fn is_idle(&self) -> bool;

    /// Put the engine in its faulted posture for the given game
    fn enter_faulted(&self, game_id: i32);
}
