//! Recovery state models.

use std::fmt;

/// Flags tracked by the recovery state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryState {
    pub is_recovering: bool,
    pub was_recovering: bool,
    /// Set only while `is_recovering`
    pub game_id: Option<i32>,
}

/// Externally visible phase of game-round recovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryPhase {
    #[default]
    Idle,
    Recovering { game_id: i32 },
    Resolved,
    Aborted,
}

impl fmt::Display for RecoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryPhase::Idle => write!(f, "idle"),
            RecoveryPhase::Recovering { game_id } => write!(f, "recovering game {game_id}"),
            RecoveryPhase::Resolved => write!(f, "resolved"),
            RecoveryPhase::Aborted => write!(f, "aborted"),
        }
    }
}
