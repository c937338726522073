//! Currency ledger data models.

use crate::{Money, history::HandpayKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl EntryDirection {
    pub fn sign(self) -> Money {
        match self {
            EntryDirection::Credit => 1,
            EntryDirection::Debit => -1,
        }
    }
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

/// Kinds of transaction the ledger accounts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    BillIn,
    VoucherIn,
    WatOn,
    Bonus,
    VoucherOut,
    HandpayOut,
    WatOff,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::BillIn => write!(f, "bill_in"),
            TransactionKind::VoucherIn => write!(f, "voucher_in"),
            TransactionKind::WatOn => write!(f, "wat_on"),
            TransactionKind::Bonus => write!(f, "bonus"),
            TransactionKind::VoucherOut => write!(f, "voucher_out"),
            TransactionKind::HandpayOut => write!(f, "handpay_out"),
            TransactionKind::WatOff => write!(f, "wat_off"),
        }
    }
}

/// Summary of one transaction folded into the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
    pub kind: TransactionKind,
    pub direction: EntryDirection,
    /// Recorded for history only, never moves `amount_in`
    pub excluded: bool,
    pub transaction_id: u64,
    pub trace_id: Uuid,
    pub cashable_amount: Money,
    pub cashable_promo_amount: Money,
    pub non_cashable_promo_amount: Money,
    pub handpay_type: Option<HandpayKind>,
}

impl TransactionRecord {
    /// Contribution of this record to `amount_in`
    pub fn signed_amount(&self) -> Money {
        if self.excluded {
            0
        } else {
            self.direction.sign() * self.amount
        }
    }
}

/// Persisted ledger contents
///
/// `amount_in` always equals the sum of [`TransactionRecord::signed_amount`]
/// over `transactions`; both are committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub amount_in: Money,
    pub transactions: Vec<TransactionRecord>,
}

impl LedgerState {
    pub fn is_empty(&self) -> bool {
        self.amount_in == 0 && self.transactions.is_empty()
    }

    pub fn contains(&self, transaction_id: u64) -> bool {
        self.transactions
            .iter()
            .any(|record| record.transaction_id == transaction_id)
    }

    /// Recompute the pending amount from the records
    pub fn net_amount(&self) -> Money {
        self.transactions.iter().map(TransactionRecord::signed_amount).sum()
    }
}
