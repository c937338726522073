//! Game round log data models.

use super::errors::GameHistoryError;
use crate::{Money, history::Transaction, history::TransferOutReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress of the game round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    Idle,
    Initiated,
    PrimaryGameStarted,
    PrimaryGameEnded,
    SecondaryGameStarted,
    SecondaryGameEnded,
    PayGameResults,
    GameEnded,
    /// Results shown, round fully over
    PresentationIdle,
    FatalError,
}

impl PlayState {
    /// Whether a round in this state was interrupted mid-flight
    pub fn in_progress(self) -> bool {
        !matches!(self, PlayState::Idle | PlayState::PresentationIdle)
    }
}

/// One requested cash-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashOutInfo {
    pub trace_id: Uuid,
    pub amount: Money,
    pub reason: TransferOutReason,
    pub handpay: bool,
    /// Only ever moves from false to true
    pub complete: bool,
}

/// Reference to a history transaction folded into the round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub transaction_id: u64,
    pub trace_id: Uuid,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<&Transaction> for TransactionRef {
    type Error = GameHistoryError;

    fn try_from(transaction: &Transaction) -> Result<Self, Self::Error> {
        let amount = transaction
            .transaction_amount()
            .ok_or(GameHistoryError::AmountOverflow(transaction.transaction_id))?;
        Ok(Self {
            transaction_id: transaction.transaction_id,
            trace_id: transaction.trace_id,
            amount,
            timestamp: transaction.timestamp,
        })
    }
}

/// Snapshot of the current game round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRoundLog {
    /// Last history transaction id when the round started
    pub transaction_id: u64,
    pub log_sequence: u64,
    pub game_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub play_state: PlayState,
    pub cash_out_info: Vec<CashOutInfo>,
    pub transactions: Vec<TransactionRef>,
    pub final_wager: Money,
    pub final_win: Money,
}

impl GameRoundLog {
    pub fn has_pending_cash_out(&self) -> bool {
        self.cash_out_info.iter().any(|info| !info.complete)
    }

    /// Whether a history transaction is already referenced by the round
    pub fn references(&self, transaction_id: u64) -> bool {
        self.transactions
            .iter()
            .any(|reference| reference.transaction_id == transaction_id)
    }

    pub fn pending_cash_outs(&self) -> impl Iterator<Item = &CashOutInfo> {
        self.cash_out_info.iter().filter(|info| !info.complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TransactionDetail;

    fn transaction(detail: TransactionDetail) -> Transaction {
        Transaction {
            transaction_id: 4,
            trace_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            completed: true,
            detail,
        }
    }

    #[test]
    fn test_reference_carries_amount() {
        let bill = transaction(TransactionDetail::BillIn { amount: 2500 });
        let reference = TransactionRef::try_from(&bill).unwrap();
        assert_eq!(reference.transaction_id, 4);
        assert_eq!(reference.trace_id, bill.trace_id);
        assert_eq!(reference.amount, 2500);
    }

    #[test]
    fn test_overflowing_transaction_has_no_reference() {
        let wat = transaction(TransactionDetail::WatOn {
            cashable: Money::MAX,
            promo: 0,
            non_cashable: 1,
        });
        assert!(matches!(
            TransactionRef::try_from(&wat),
            Err(GameHistoryError::AmountOverflow(4))
        ));
    }
}
