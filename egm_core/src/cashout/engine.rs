//! Cash-out recovery engine.

use super::{
    TransferOutHandler,
    config::RecoveryConfig,
    errors::RecoveryResult,
    key_off::KeyOffGate,
};
use crate::{
    Money,
    game_history::{CashOutInfo, GameHistory, GameRoundLog, TransactionRef},
    history::{Transaction, TransactionHistory},
    ledger::{CurrencyLedger, LedgerError},
    recovery::GameRecovery,
};
use log::{debug, error, info, warn};
use std::{cmp::Ordering, collections::HashSet, sync::Arc};
use uuid::Uuid;

/// Collaborators shared by the recovery components
#[derive(Clone)]
pub struct RecoveryContext {
    pub ledger: Arc<CurrencyLedger>,
    pub history: Arc<dyn TransactionHistory>,
    pub game_history: Arc<dyn GameHistory>,
    pub bank: Arc<dyn TransferOutHandler>,
    pub game_recovery: Arc<GameRecovery>,
    pub key_off: Arc<KeyOffGate>,
    pub config: RecoveryConfig,
}

/// Outcome of reconciling one pending cash-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Complete,
    Unresolved,
}

/// Reconciles the current game round against the transaction history
pub struct CashOutRecovery {
    ctx: RecoveryContext,
}

impl CashOutRecovery {
    pub fn new(ctx: RecoveryContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RecoveryContext {
        &self.ctx
    }

    /// Run the startup reconciliation
    ///
    /// Without a round log there is nothing to do. A round without pending
    /// cash-outs gets its missing history transactions backfilled; a round
    /// with pending cash-outs has each one reconciled.
    ///
    /// # Returns
    ///
    /// * `RecoveryResult<bool>` - Whether any cash-out needed recovery
    ///
    /// # Errors
    ///
    /// * `RecoveryError::Ledger` - A replayed credit could not be committed,
    ///   or the amounts paid against a cash-out overflow
    /// * `RecoveryError::Transfer` - The bank could not queue a re-request
    /// * `RecoveryError::KeyOffAborted` - Operator abandoned a large payout
    pub async fn recover(&self) -> RecoveryResult<bool> {
        let Some(log) = self.ctx.game_history.current_log().await? else {
            debug!("No game round log, nothing to recover");
            return Ok(false);
        };

        if log.has_pending_cash_out() {
            self.reconcile_cash_outs(&log).await
        } else {
            self.backfill(&log).await?;
            Ok(false)
        }
    }

    /// Replay history transactions newer than the round that it never saw
    async fn backfill(&self, log: &GameRoundLog) -> RecoveryResult<()> {
        let mut candidates: Vec<Transaction> = self
            .ctx
            .history
            .recall_transactions(true)
            .await?
            .into_iter()
            .filter(|transaction| transaction.transaction_id > log.transaction_id)
            .collect();
        candidates.sort_by_key(|transaction| transaction.transaction_id);

        let mut replayed = 0;
        for transaction in candidates
            .iter()
            .take_while(|transaction| !log.references(transaction.transaction_id))
        {
            self.replay(transaction).await?;
            replayed += 1;
        }

        if replayed > 0 {
            info!(
                "Backfilled {} transactions into round {}",
                replayed, log.log_sequence
            );
        }
        Ok(())
    }

    async fn reconcile_cash_outs(&self, log: &GameRoundLog) -> RecoveryResult<bool> {
        let in_flight = self.ctx.bank.recover().await?;
        let mut history = self.ctx.history.recall_transactions(true).await?;
        history.sort_by_key(|transaction| transaction.transaction_id);

        let mut unresolved = false;
        for cash_out in log.pending_cash_outs() {
            let settlement = self
                .reconcile_cash_out(log, cash_out, &history, &in_flight)
                .await?;
            if settlement == Settlement::Unresolved {
                unresolved = true;
            }
        }

        if unresolved {
            info!("Round {} is still recovering", log.log_sequence);
        } else {
            self.ctx.game_recovery.end_recovery();
        }
        Ok(true)
    }

    async fn reconcile_cash_out(
        &self,
        log: &GameRoundLog,
        cash_out: &CashOutInfo,
        history: &[Transaction],
        in_flight: &HashSet<Uuid>,
    ) -> RecoveryResult<Settlement> {
        let trace_id = cash_out.trace_id;
        if in_flight.contains(&trace_id) {
            info!("Cash-out {trace_id} is being resumed by the bank");
            return Ok(Settlement::Unresolved);
        }

        let mut paid: Money = 0;
        for transaction in history.iter().filter(|t| t.trace_id == trace_id) {
            paid = transaction
                .transaction_amount()
                .and_then(|amount| paid.checked_add(amount))
                .ok_or(LedgerError::BalanceOverflow)?;
            if !log.references(transaction.transaction_id) {
                self.replay(transaction).await?;
            }
        }
        debug!(
            "Cash-out {} requested {}, history shows {} paid",
            trace_id, cash_out.amount, paid
        );

        match paid.cmp(&cash_out.amount) {
            Ordering::Equal => {
                self.ctx.game_history.complete_cash_out(trace_id).await?;
                Ok(Settlement::Complete)
            }
            Ordering::Greater => {
                error!(
                    "Cash-out {} overpaid: requested {}, paid {}",
                    trace_id, cash_out.amount, paid
                );
                self.ctx.game_history.complete_cash_out(trace_id).await?;
                Ok(Settlement::Complete)
            }
            Ordering::Less => {
                self.request_shortfall(log, cash_out, cash_out.amount - paid)
                    .await?;
                Ok(Settlement::Unresolved)
            }
        }
    }

    /// Ask the bank for the unpaid remainder under the original trace id
    async fn request_shortfall(
        &self,
        log: &GameRoundLog,
        cash_out: &CashOutInfo,
        shortfall: Money,
    ) -> RecoveryResult<()> {
        let trace_id = cash_out.trace_id;
        let bank = &self.ctx.bank;

        let accepted = if cash_out.handpay {
            info!("Re-requesting hand-pay {trace_id} for {shortfall}");
            bank.force_handpay(trace_id, shortfall, cash_out.reason, log.transaction_id)
                .await?
        } else if shortfall > self.ctx.config.large_payout_limit {
            let waiter = self.ctx.key_off.register(trace_id);
            warn!(
                "Lockup: cash-out {} shortfall {} exceeds limit {}, waiting for key-off",
                waiter.trace_id(),
                shortfall,
                self.ctx.config.large_payout_limit
            );
            if let Err(e) = waiter.wait().await {
                self.ctx.game_recovery.abort_recovery();
                return Err(e);
            }
            info!("Key-off received for {trace_id}, paying {shortfall} by hand-pay");
            bank.force_handpay(trace_id, shortfall, cash_out.reason, log.transaction_id)
                .await?
        } else {
            info!("Re-requesting cash-out {trace_id} for {shortfall}");
            bank.force_voucher_out(trace_id, shortfall, cash_out.reason, log.transaction_id)
                .await?
        };

        if !accepted {
            error!("Bank rejected re-request of {shortfall} for cash-out {trace_id}");
        }
        Ok(())
    }

    /// Credit a transaction and reference it from the round
    ///
    /// The ledger skips ids it already holds, so a crash between the two
    /// writes is replayed safely.
    async fn replay(&self, transaction: &Transaction) -> RecoveryResult<()> {
        let reference = TransactionRef::try_from(transaction)?;
        if reference.amount > 0 {
            self.ctx.ledger.credit(transaction, None, None).await?;
        }
        self.ctx.game_history.append_transaction(reference).await?;
        debug!(
            "Replayed transaction {} (trace {})",
            transaction.transaction_id, transaction.trace_id
        );
        Ok(())
    }
}
