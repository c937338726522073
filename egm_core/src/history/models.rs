//! Transaction history data models.

use crate::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credit account a value moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Cashable,
    Promo,
    NonCashable,
}

/// Why credits are leaving the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutReason {
    CashOut,
    LargeWin,
    BonusPay,
    CashWin,
}

impl std::fmt::Display for TransferOutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferOutReason::CashOut => write!(f, "cash_out"),
            TransferOutReason::LargeWin => write!(f, "large_win"),
            TransferOutReason::BonusPay => write!(f, "bonus_pay"),
            TransferOutReason::CashWin => write!(f, "cash_win"),
        }
    }
}

/// Category of an attendant hand-pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandpayKind {
    GameWin,
    BonusPay,
    CancelledCredit,
}

/// How a bonus award relates to the game round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusMode {
    Standard,
    NonDeductible,
    WagerMatch,
    /// Paid as part of the game win
    GameWin,
}

/// Device used to pay a bonus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayMethod {
    Credit,
    Handpay,
    Voucher,
    Wat,
}

/// Direction of an operator keyed credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyedDirection {
    On,
    Off,
}

/// Per-kind payload of a financial transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetail {
    BillIn {
        amount: Money,
    },
    VoucherIn {
        amount: Money,
        account: AccountType,
        barcode: String,
    },
    WatOn {
        cashable: Money,
        promo: Money,
        non_cashable: Money,
    },
    Bonus {
        cashable: Money,
        promo: Money,
        non_cashable: Money,
        mode: BonusMode,
        pay_method: PayMethod,
    },
    VoucherOut {
        amount: Money,
        account: AccountType,
        barcode: String,
        reason: TransferOutReason,
    },
    HandpayOut {
        cashable: Money,
        promo: Money,
        non_cashable: Money,
        handpay_type: HandpayKind,
    },
    WatOff {
        cashable: Money,
        promo: Money,
        non_cashable: Money,
        reason: TransferOutReason,
    },
    KeyedCredit {
        amount: Money,
        direction: KeyedDirection,
    },
    /// Written by a build that knows more kinds than this one
    #[serde(other)]
    Unsupported,
}

/// Amount split across the three credit accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSplit {
    pub cashable: Money,
    pub promo: Money,
    pub non_cashable: Money,
}

impl AccountSplit {
    /// Sum of the three accounts, `None` on overflow
    pub fn total(&self) -> Option<Money> {
        self.cashable
            .checked_add(self.promo)?
            .checked_add(self.non_cashable)
    }

    fn single(account: AccountType, amount: Money) -> Self {
        match account {
            AccountType::Cashable => Self {
                cashable: amount,
                ..Self::default()
            },
            AccountType::Promo => Self {
                promo: amount,
                ..Self::default()
            },
            AccountType::NonCashable => Self {
                non_cashable: amount,
                ..Self::default()
            },
        }
    }
}

impl TransactionDetail {
    /// Stable name of the kind, used in logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            TransactionDetail::BillIn { .. } => "bill_in",
            TransactionDetail::VoucherIn { .. } => "voucher_in",
            TransactionDetail::WatOn { .. } => "wat_on",
            TransactionDetail::Bonus { .. } => "bonus",
            TransactionDetail::VoucherOut { .. } => "voucher_out",
            TransactionDetail::HandpayOut { .. } => "handpay_out",
            TransactionDetail::WatOff { .. } => "wat_off",
            TransactionDetail::KeyedCredit { .. } => "keyed_credit",
            TransactionDetail::Unsupported => "unsupported",
        }
    }

    /// Value moved by the transaction, split per account
    pub fn split(&self) -> AccountSplit {
        match self {
            TransactionDetail::BillIn { amount } => AccountSplit::single(AccountType::Cashable, *amount),
            TransactionDetail::VoucherIn {
                amount, account, ..
            }
            | TransactionDetail::VoucherOut {
                amount, account, ..
            } => AccountSplit::single(*account, *amount),
            TransactionDetail::WatOn {
                cashable,
                promo,
                non_cashable,
            }
            | TransactionDetail::Bonus {
                cashable,
                promo,
                non_cashable,
                ..
            }
            | TransactionDetail::HandpayOut {
                cashable,
                promo,
                non_cashable,
                ..
            }
            | TransactionDetail::WatOff {
                cashable,
                promo,
                non_cashable,
                ..
            } => AccountSplit {
                cashable: *cashable,
                promo: *promo,
                non_cashable: *non_cashable,
            },
            TransactionDetail::KeyedCredit { amount, .. } => {
                AccountSplit::single(AccountType::Cashable, *amount)
            }
            TransactionDetail::Unsupported => AccountSplit::default(),
        }
    }

    /// Total value moved by the transaction, `None` on overflow
    pub fn amount(&self) -> Option<Money> {
        self.split().total()
    }
}

/// A completed (or in-flight) financial transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Globally ordered, monotonically increasing
    pub transaction_id: u64,
    /// Correlates the transaction with the request it settles
    pub trace_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub completed: bool,
    pub detail: TransactionDetail,
}

impl Transaction {
    pub fn transaction_amount(&self) -> Option<Money> {
        self.detail.amount()
    }
}
