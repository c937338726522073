//! Currency ledger implementation with write-through persistence.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{EntryDirection, LedgerState, TransactionKind, TransactionRecord},
};
use crate::{
    Money,
    history::{AccountSplit, BonusMode, HandpayKind, PayMethod, Transaction, TransactionDetail},
    storage::PersistentStorage,
};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default storage block for the ledger
pub const LEDGER_BLOCK: &str = "CurrencyInContainer";
const DEFAULT_CAPACITY_WARNING: usize = 200;
const FIELD_AMOUNT_IN: &str = "amount_in";
const FIELD_TRANSACTIONS: &str = "transactions";

/// Effect of one transaction on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: TransactionKind,
    pub direction: EntryDirection,
    pub excluded: bool,
    pub amount: Money,
    pub split: AccountSplit,
    pub handpay_type: Option<HandpayKind>,
}

/// Apply the accounting rules for a transaction kind
///
/// Returns `None` for kinds that must not move the pending amount, and
/// `LedgerError::BalanceOverflow` when the account split does not sum.
///
/// * Bill-in, voucher-in and WAT-on credit their full amount.
/// * A bonus credits its paid amount, except a `GameWin` bonus which is
///   already part of the game win and is recorded but excluded.
/// * Voucher-out, hand-pay and WAT-off debit their full amount.
pub fn classify(
    detail: &TransactionDetail,
    paid_amount: Option<Money>,
) -> LedgerResult<Option<Classification>> {
    let split = detail.split();
    let total = split.total().ok_or(LedgerError::BalanceOverflow)?;
    let (kind, direction) = match detail {
        TransactionDetail::BillIn { .. } => (TransactionKind::BillIn, EntryDirection::Credit),
        TransactionDetail::VoucherIn { .. } => (TransactionKind::VoucherIn, EntryDirection::Credit),
        TransactionDetail::WatOn { .. } => (TransactionKind::WatOn, EntryDirection::Credit),
        TransactionDetail::Bonus {
            mode, pay_method, ..
        } => {
            let handpay_type = match (pay_method, mode) {
                (PayMethod::Handpay, BonusMode::GameWin) => Some(HandpayKind::GameWin),
                (PayMethod::Handpay, _) => Some(HandpayKind::BonusPay),
                _ => None,
            };
            return Ok(Some(Classification {
                kind: TransactionKind::Bonus,
                direction: EntryDirection::Credit,
                excluded: *mode == BonusMode::GameWin,
                amount: paid_amount.unwrap_or(total),
                split,
                handpay_type,
            }));
        }
        TransactionDetail::VoucherOut { .. } => {
            (TransactionKind::VoucherOut, EntryDirection::Debit)
        }
        TransactionDetail::HandpayOut { handpay_type, .. } => {
            return Ok(Some(Classification {
                kind: TransactionKind::HandpayOut,
                direction: EntryDirection::Debit,
                excluded: false,
                amount: total,
                split,
                handpay_type: Some(*handpay_type),
            }));
        }
        TransactionDetail::WatOff { .. } => (TransactionKind::WatOff, EntryDirection::Debit),
        TransactionDetail::KeyedCredit { .. } | TransactionDetail::Unsupported => return Ok(None),
    };

    Ok(Some(Classification {
        kind,
        direction,
        excluded: false,
        amount: total,
        split,
        handpay_type: None,
    }))
}

/// Running total of currency owed to the player
///
/// Every mutation commits `amount_in` and the record list together before
/// the in-memory copy is updated, so the store stays authoritative.
pub struct CurrencyLedger {
    storage: Arc<dyn PersistentStorage>,
    block: String,
    capacity_warning: usize,
    state: Mutex<LedgerState>,
}

impl CurrencyLedger {
    /// Load the ledger from its storage block
    ///
    /// # Arguments
    ///
    /// * `storage` - Persisted store
    /// * `block` - Block name, usually [`LEDGER_BLOCK`]
    ///
    /// # Errors
    ///
    /// * `LedgerError::Storage` - The block could not be read or decoded
    pub async fn load(storage: Arc<dyn PersistentStorage>, block: &str) -> LedgerResult<Self> {
        let state = match storage.read_block(block).await? {
            Some(stored) => LedgerState {
                amount_in: stored.field(FIELD_AMOUNT_IN)?.unwrap_or_default(),
                transactions: stored.field(FIELD_TRANSACTIONS)?.unwrap_or_default(),
            },
            None => LedgerState::default(),
        };

        if state.amount_in != state.net_amount() {
            warn!(
                "Ledger {} amount_in {} disagrees with record sum {}",
                block,
                state.amount_in,
                state.net_amount()
            );
        }
        debug!(
            "Loaded ledger {} with amount_in {} and {} records",
            block,
            state.amount_in,
            state.transactions.len()
        );

        Ok(Self {
            storage,
            block: block.to_string(),
            capacity_warning: DEFAULT_CAPACITY_WARNING,
            state: Mutex::new(state),
        })
    }

    /// Record count above which every credit logs a warning
    #[must_use]
    pub fn with_capacity_warning(mut self, capacity_warning: usize) -> Self {
        self.capacity_warning = capacity_warning;
        self
    }

    /// Fold a completed transaction into the ledger
    ///
    /// # Arguments
    ///
    /// * `transaction` - Completed transaction
    /// * `paid_amount` - Amount actually paid, overrides a bonus award amount
    /// * `transaction_id` - Overrides the id recorded for the transaction
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Money>` - Signed change applied to `amount_in`
    ///
    /// Kinds without accounting rules and transaction ids already in the
    /// ledger are skipped and return `0`.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Negative amount
    /// * `LedgerError::BalanceOverflow` - The transaction total or `amount_in`
    ///   would overflow
    /// * `LedgerError::Storage` - Commit failed; the ledger is unchanged
    pub async fn credit(
        &self,
        transaction: &Transaction,
        paid_amount: Option<Money>,
        transaction_id: Option<u64>,
    ) -> LedgerResult<Money> {
        let Some(classification) = classify(&transaction.detail, paid_amount)? else {
            debug!(
                "Ignoring {} transaction {}",
                transaction.detail.kind_name(),
                transaction.transaction_id
            );
            return Ok(0);
        };
        if classification.amount < 0 {
            return Err(LedgerError::InvalidAmount(classification.amount));
        }

        let transaction_id = transaction_id.unwrap_or(transaction.transaction_id);
        let mut state = self.state.lock().await;

        if transaction_id != 0 && state.contains(transaction_id) {
            debug!("Transaction {transaction_id} already in ledger, skipping");
            return Ok(0);
        }

        let record = TransactionRecord {
            amount: classification.amount,
            timestamp: transaction.timestamp,
            kind: classification.kind,
            direction: classification.direction,
            excluded: classification.excluded,
            transaction_id,
            trace_id: transaction.trace_id,
            cashable_amount: classification.split.cashable,
            cashable_promo_amount: classification.split.promo,
            non_cashable_promo_amount: classification.split.non_cashable,
            handpay_type: classification.handpay_type,
        };
        let delta = record.signed_amount();
        let amount_in = state
            .amount_in
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow)?;

        let mut transactions = state.transactions.clone();
        transactions.push(record);

        let mut tx = self.storage.start_transaction(&self.block);
        tx.set(FIELD_AMOUNT_IN, &amount_in)?;
        tx.set(FIELD_TRANSACTIONS, &transactions)?;
        tx.commit().await?;

        state.amount_in = amount_in;
        state.transactions = transactions;

        info!(
            "Ledger {} {} transaction {} (trace {}): delta {}, amount_in {}",
            self.block,
            classification.kind,
            transaction_id,
            transaction.trace_id,
            delta,
            amount_in
        );
        if state.transactions.len() > self.capacity_warning {
            warn!(
                "Ledger {} holds {} records without a reset",
                self.block,
                state.transactions.len()
            );
        }

        Ok(delta)
    }

    /// Settle the ledger
    ///
    /// Returns the pending amount and clears the ledger in one commit. On an
    /// empty ledger this returns `0` without writing.
    pub async fn reset(&self) -> LedgerResult<Money> {
        let mut state = self.state.lock().await;
        if state.is_empty() {
            return Ok(0);
        }

        let mut tx = self.storage.start_transaction(&self.block);
        tx.set(FIELD_AMOUNT_IN, &0_i64)?;
        tx.set(FIELD_TRANSACTIONS, &Vec::<TransactionRecord>::new())?;
        tx.commit().await?;

        let settled = state.amount_in;
        *state = LedgerState::default();
        info!("Ledger {} reset, settled {}", self.block, settled);
        Ok(settled)
    }

    pub async fn amount_in(&self) -> Money {
        self.state.lock().await.amount_in
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().await.transactions.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }

    pub async fn contains(&self, transaction_id: u64) -> bool {
        self.state.lock().await.contains(transaction_id)
    }

    /// Snapshot of the whole ledger
    pub async fn state(&self) -> LedgerState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{AccountType, TransferOutReason};
    use crate::storage::MemoryStorage;
    use chrono::Utc;
    use uuid::Uuid;

    fn transaction(id: u64, detail: TransactionDetail) -> Transaction {
        Transaction {
            transaction_id: id,
            trace_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            completed: true,
            detail,
        }
    }

    fn voucher_out(amount: Money) -> TransactionDetail {
        TransactionDetail::VoucherOut {
            amount,
            account: AccountType::Cashable,
            barcode: "123456".to_string(),
            reason: TransferOutReason::CashOut,
        }
    }

    fn bonus(mode: BonusMode, pay_method: PayMethod, cashable: Money) -> TransactionDetail {
        TransactionDetail::Bonus {
            cashable,
            promo: 0,
            non_cashable: 0,
            mode,
            pay_method,
        }
    }

    async fn ledger(storage: Arc<MemoryStorage>) -> CurrencyLedger {
        CurrencyLedger::load(storage, LEDGER_BLOCK).await.unwrap()
    }

    #[test]
    fn test_classify_debits() {
        let c = classify(&voucher_out(100), None).unwrap().unwrap();
        assert_eq!(c.direction, EntryDirection::Debit);
        assert_eq!(c.amount, 100);

        let wat = TransactionDetail::WatOff {
            cashable: 10,
            promo: 20,
            non_cashable: 30,
            reason: TransferOutReason::CashOut,
        };
        let c = classify(&wat, None).unwrap().unwrap();
        assert_eq!(c.kind, TransactionKind::WatOff);
        assert_eq!(c.amount, 60);
    }

    #[test]
    fn test_classify_bonus_handpay_tag() {
        let c = classify(&bonus(BonusMode::Standard, PayMethod::Handpay, 500), Some(400))
            .unwrap()
            .unwrap();
        assert_eq!(c.handpay_type, Some(HandpayKind::BonusPay));
        assert_eq!(c.amount, 400);
        assert!(!c.excluded);

        let c = classify(&bonus(BonusMode::GameWin, PayMethod::Credit, 500), None).unwrap().unwrap();
        assert!(c.excluded);
        assert_eq!(c.handpay_type, None);
    }

    #[test]
    fn test_classify_ignores_keyed_and_unsupported() {
        let keyed = TransactionDetail::KeyedCredit {
            amount: 100,
            direction: crate::history::KeyedDirection::On,
        };
        assert!(classify(&keyed, None).unwrap().is_none());
        assert!(classify(&TransactionDetail::Unsupported, None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bill_then_voucher_out_then_reset() {
        let ledger = ledger(Arc::new(MemoryStorage::new())).await;

        ledger
            .credit(&transaction(1, TransactionDetail::BillIn { amount: 5000 }), None, None)
            .await
            .unwrap();
        ledger
            .credit(&transaction(2, voucher_out(2000)), None, None)
            .await
            .unwrap();
        assert_eq!(ledger.amount_in().await, 3000);

        assert_eq!(ledger.reset().await.unwrap(), 3000);
        assert_eq!(ledger.amount_in().await, 0);
        assert!(ledger.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_game_win_bonus_recorded_but_excluded() {
        let ledger = ledger(Arc::new(MemoryStorage::new())).await;

        let delta = ledger
            .credit(
                &transaction(7, bonus(BonusMode::GameWin, PayMethod::Credit, 900)),
                None,
                None,
            )
            .await
            .unwrap();

        assert_eq!(delta, 0);
        assert_eq!(ledger.amount_in().await, 0);
        let records = ledger.transactions().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].excluded);
        assert_eq!(records[0].kind, TransactionKind::Bonus);
    }

    #[tokio::test]
    async fn test_overflowing_split_is_rejected_without_commit() {
        let storage = Arc::new(MemoryStorage::new());
        let ledger = ledger(storage.clone()).await;
        let wat = TransactionDetail::WatOn {
            cashable: Money::MAX,
            promo: 1,
            non_cashable: 0,
        };

        let err = ledger
            .credit(&transaction(9, wat), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::BalanceOverflow));
        assert!(err.is_fatal());
        assert!(ledger.is_empty().await);
        assert_eq!(storage.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_transaction_id_is_skipped() {
        let ledger = ledger(Arc::new(MemoryStorage::new())).await;
        let bill = transaction(3, TransactionDetail::BillIn { amount: 100 });

        assert_eq!(ledger.credit(&bill, None, None).await.unwrap(), 100);
        assert_eq!(ledger.credit(&bill, None, None).await.unwrap(), 0);
        assert_eq!(ledger.amount_in().await, 100);
        assert_eq!(ledger.transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_id_override() {
        let ledger = ledger(Arc::new(MemoryStorage::new())).await;
        let bill = transaction(3, TransactionDetail::BillIn { amount: 100 });

        ledger.credit(&bill, None, Some(42)).await.unwrap();
        assert!(ledger.contains(42).await);
        assert!(!ledger.contains(3).await);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_ledger_unchanged() {
        let storage = Arc::new(MemoryStorage::new());
        let ledger = ledger(storage.clone()).await;

        storage.fail_next_commit();
        let err = ledger
            .credit(&transaction(1, TransactionDetail::BillIn { amount: 100 }), None, None)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(ledger.amount_in().await, 0);
        assert!(ledger.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_on_empty_ledger_does_not_write() {
        let storage = Arc::new(MemoryStorage::new());
        let ledger = ledger(storage.clone()).await;

        assert_eq!(ledger.reset().await.unwrap(), 0);
        assert_eq!(ledger.reset().await.unwrap(), 0);
        assert_eq!(storage.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_restores_committed_state() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let ledger = ledger(storage.clone()).await;
            ledger
                .credit(&transaction(1, TransactionDetail::BillIn { amount: 2500 }), None, None)
                .await
                .unwrap();
        }

        let reloaded = ledger(storage).await;
        assert_eq!(reloaded.amount_in().await, 2500);
        assert!(reloaded.contains(1).await);
    }

    #[tokio::test]
    async fn test_negative_paid_amount_rejected() {
        let ledger = ledger(Arc::new(MemoryStorage::new())).await;
        let err = ledger
            .credit(
                &transaction(1, bonus(BonusMode::Standard, PayMethod::Credit, 100)),
                Some(-1),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(-1)));
    }
}
