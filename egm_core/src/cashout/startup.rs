//! Startup recovery sequence.

use super::{
    engine::{CashOutRecovery, RecoveryContext},
    errors::RecoveryResult,
};
use crate::Money;
use log::info;

/// Outcome of the startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    /// Game-round recovery is still in progress
    pub game_recovering: bool,
    /// A cash-out of the current round needed recovery
    pub cash_out_pending: bool,
    /// Pending amount after recovery
    pub amount_in: Money,
}

impl StartupReport {
    /// Whether the lobby may present the balance as settled
    pub fn balance_settled(&self) -> bool {
        !self.game_recovering && !self.cash_out_pending
    }
}

/// Runs once at process start, before any new game round may begin
pub struct StartupRecovery {
    cash_out: CashOutRecovery,
}

impl StartupRecovery {
    pub fn new(ctx: RecoveryContext) -> Self {
        Self {
            cash_out: CashOutRecovery::new(ctx),
        }
    }

    /// Start game-round recovery if the round was interrupted, then
    /// reconcile its cash-outs
    pub async fn run(&self) -> RecoveryResult<StartupReport> {
        let ctx = self.cash_out.context();

        if let Some(log) = ctx.game_history.current_log().await?
            && log.play_state.in_progress()
        {
            info!(
                "Round {} of game {} interrupted in {:?}",
                log.log_sequence, log.game_id, log.play_state
            );
            ctx.game_recovery.try_start_recovery(log.game_id, true);
        }

        let cash_out_pending = self.cash_out.recover().await?;
        let report = StartupReport {
            game_recovering: ctx.game_recovery.is_recovering(),
            cash_out_pending,
            amount_in: ctx.ledger.amount_in().await,
        };
        info!(
            "Startup recovery finished: game recovering {}, cash-out pending {}, amount in {}",
            report.game_recovering, report.cash_out_pending, report.amount_in
        );
        Ok(report)
    }
}
