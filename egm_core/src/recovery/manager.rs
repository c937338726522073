//! Game-round recovery state machine implementation.

use super::{
    GamePlayEngine,
    models::{RecoveryPhase, RecoveryState},
};
use log::{error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    state: RecoveryState,
    phase: RecoveryPhase,
}

/// Tracks whether the current game round is being recovered
pub struct GameRecovery {
    engine: Arc<dyn GamePlayEngine>,
    inner: Mutex<Inner>,
}

impl GameRecovery {
    pub fn new(engine: Arc<dyn GamePlayEngine>) -> Self {
        Self {
            engine,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Start recovering a game round
    ///
    /// # Arguments
    ///
    /// * `game_id` - Game whose round was interrupted
    /// * `verify_state` - Decline when the engine reports it is idle
    ///
    /// # Returns
    ///
    /// * `bool` - Whether recovery started
    pub fn try_start_recovery(&self, game_id: i32, verify_state: bool) -> bool {
        if verify_state && self.engine.is_idle() {
            info!("Game {game_id} engine is idle, recovery not needed");
            return false;
        }

        self.engine.enter_faulted(game_id);

        let mut inner = self.lock();
        inner.state = RecoveryState {
            is_recovering: true,
            was_recovering: true,
            game_id: Some(game_id),
        };
        inner.phase = RecoveryPhase::Recovering { game_id };
        info!("Recovery started for game {game_id}");
        true
    }

    /// Finish recovery and return to idle
    pub fn end_recovery(&self) {
        let mut inner = self.lock();
        if !inner.state.was_recovering {
            return;
        }

        let game_id = inner.state.game_id;
        inner.state = RecoveryState::default();
        inner.phase = RecoveryPhase::Resolved;
        info!("Recovery ended for game {game_id:?}");
    }

    /// Abandon an in-progress recovery
    pub fn abort_recovery(&self) {
        let mut inner = self.lock();
        inner.state.was_recovering = inner.state.is_recovering;
        if !inner.state.was_recovering {
            error!("Abort requested but no recovery is in progress");
            return;
        }

        inner.state.is_recovering = false;
        inner.phase = RecoveryPhase::Aborted;
        warn!("Recovery aborted for game {:?}", inner.state.game_id);
    }

    pub fn is_recovering(&self) -> bool {
        self.lock().state.is_recovering
    }

    pub fn was_recovering(&self) -> bool {
        self.lock().state.was_recovering
    }

    /// Game being recovered, `None` outside recovery
    pub fn game_id(&self) -> Option<i32> {
        let inner = self.lock();
        if inner.state.is_recovering {
            inner.state.game_id
        } else {
            None
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.lock().state
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.lock().phase
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
