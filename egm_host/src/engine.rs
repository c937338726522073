//! Game-play engine posture as seen by the host at startup.

use egm_core::GamePlayEngine;
use log::warn;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Engine state seeded from the persisted round log
#[derive(Debug)]
pub struct HostGameEngine {
    idle: AtomicBool,
    faulted_game: AtomicI32,
}

impl HostGameEngine {
    /// # Arguments
    ///
    /// * `round_in_progress` - The round log shows an unfinished round
    pub fn new(round_in_progress: bool) -> Self {
        Self {
            idle: AtomicBool::new(!round_in_progress),
            faulted_game: AtomicI32::new(0),
        }
    }

    /// Game held in the faulted posture, if any
    pub fn faulted_game(&self) -> Option<i32> {
        match self.faulted_game.load(Ordering::SeqCst) {
            0 => None,
            game_id => Some(game_id),
        }
    }
}

impl GamePlayEngine for HostGameEngine {
    fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    fn enter_faulted(&self, game_id: i32) {
        self.idle.store(false, Ordering::SeqCst);
        self.faulted_game.store(game_id, Ordering::SeqCst);
        warn!("Game {game_id} held in faulted state until recovery completes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_faulted() {
        let engine = HostGameEngine::new(false);
        assert!(engine.is_idle());
        assert_eq!(engine.faulted_game(), None);

        engine.enter_faulted(12);
        assert!(!engine.is_idle());
        assert_eq!(engine.faulted_game(), Some(12));
    }
}
