//! Transfer-out handler that queues payout requests in the persisted store.
//!
//! The payout hardware service drains the queue. A request stays queued
//! until completed transactions carrying its trace id, recorded after the
//! request was queued, cover its amount. `recover` drops such requests and
//! reports the trace ids of the rest.

use super::{TransferOutHandler, errors::TransferResult};
use crate::{
    Money,
    history::{Transaction, TransactionHistory, TransferOutReason},
    storage::PersistentStorage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_BLOCK: &str = "TransferOutbox";
const FIELD_REQUESTS: &str = "requests";

/// Queued payout request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub trace_id: Uuid,
    pub amount: Money,
    pub reason: TransferOutReason,
    pub associated_transaction_id: u64,
    pub handpay: bool,
    pub requested_at: DateTime<Utc>,
    /// Highest history transaction id when the request was queued
    #[serde(default)]
    pub history_mark: u64,
}

/// Persisted payout queue
pub struct OutboxTransferOut {
    storage: Arc<dyn PersistentStorage>,
    history: Arc<dyn TransactionHistory>,
    block: String,
    write_lock: Mutex<()>,
}

impl OutboxTransferOut {
    pub fn new(storage: Arc<dyn PersistentStorage>, history: Arc<dyn TransactionHistory>) -> Self {
        Self::with_block(storage, history, DEFAULT_BLOCK)
    }

    pub fn with_block(
        storage: Arc<dyn PersistentStorage>,
        history: Arc<dyn TransactionHistory>,
        block: &str,
    ) -> Self {
        Self {
            storage,
            history,
            block: block.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Requests still queued, oldest first
    pub async fn requests(&self) -> TransferResult<Vec<PayoutRequest>> {
        Ok(self
            .storage
            .read_field::<Vec<PayoutRequest>>(&self.block, FIELD_REQUESTS)
            .await?
            .unwrap_or_default())
    }

    /// Amount paid against a request since it was queued
    async fn landed_amount(&self, request: &PayoutRequest) -> TransferResult<Money> {
        // Saturating: anything past Money::MAX covers the request anyway
        Ok(self
            .history
            .recall_by_trace(request.trace_id)
            .await?
            .iter()
            .filter(|transaction| transaction.transaction_id > request.history_mark)
            .filter_map(Transaction::transaction_amount)
            .fold(0, Money::saturating_add))
    }

    async fn enqueue(&self, mut request: PayoutRequest) -> TransferResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut requests = self.requests().await?;
        if requests.iter().any(|queued| queued.trace_id == request.trace_id) {
            warn!(
                "Payout {} already queued, ignoring new request",
                request.trace_id
            );
            return Ok(false);
        }

        request.history_mark = self
            .history
            .recall_transactions(false)
            .await?
            .iter()
            .map(|transaction| transaction.transaction_id)
            .max()
            .unwrap_or(0);
        info!(
            "Queued {} payout {} of {} ({})",
            if request.handpay { "hand-pay" } else { "voucher" },
            request.trace_id,
            request.amount,
            request.reason
        );
        requests.push(request);

        let mut tx = self.storage.start_transaction(&self.block);
        tx.set(FIELD_REQUESTS, &requests)?;
        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl TransferOutHandler for OutboxTransferOut {
    async fn recover(&self) -> TransferResult<HashSet<Uuid>> {
        let _guard = self.write_lock.lock().await;
        let requests = self.requests().await?;
        let queued = requests.len();

        let mut outstanding = Vec::with_capacity(queued);
        for request in requests {
            let landed = self.landed_amount(&request).await?;
            if landed >= request.amount {
                info!(
                    "Payout {} landed ({} of {}), removing request",
                    request.trace_id, landed, request.amount
                );
            } else {
                debug!(
                    "Payout {} outstanding ({} of {} landed)",
                    request.trace_id, landed, request.amount
                );
                outstanding.push(request);
            }
        }

        if outstanding.len() < queued {
            let mut tx = self.storage.start_transaction(&self.block);
            tx.set(FIELD_REQUESTS, &outstanding)?;
            tx.commit().await?;
        }
        Ok(outstanding
            .into_iter()
            .map(|request| request.trace_id)
            .collect())
    }

    async fn force_handpay(
        &self,
        trace_id: Uuid,
        amount: Money,
        reason: TransferOutReason,
        associated_transaction_id: u64,
    ) -> TransferResult<bool> {
        self.enqueue(PayoutRequest {
            trace_id,
            amount,
            reason,
            associated_transaction_id,
            handpay: true,
            requested_at: Utc::now(),
            history_mark: 0,
        })
        .await
    }

    async fn force_voucher_out(
        &self,
        trace_id: Uuid,
        amount: Money,
        reason: TransferOutReason,
        associated_transaction_id: u64,
    ) -> TransferResult<bool> {
        self.enqueue(PayoutRequest {
            trace_id,
            amount,
            reason,
            associated_transaction_id,
            handpay: false,
            requested_at: Utc::now(),
            history_mark: 0,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        history::{AccountType, PersistedTransactionHistory, TransactionDetail},
        storage::MemoryStorage,
    };

    fn outbox() -> (OutboxTransferOut, Arc<PersistedTransactionHistory>) {
        let storage: Arc<dyn PersistentStorage> = Arc::new(MemoryStorage::new());
        let history = Arc::new(PersistedTransactionHistory::new(storage.clone()));
        (OutboxTransferOut::new(storage, history.clone()), history)
    }

    async fn voucher_out(history: &PersistedTransactionHistory, trace: Uuid, amount: Money) {
        history
            .add_transaction(
                trace,
                TransactionDetail::VoucherOut {
                    amount,
                    account: AccountType::Cashable,
                    barcode: "000987".to_string(),
                    reason: TransferOutReason::CashOut,
                },
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_queued_request_is_recovered_until_it_lands() {
        let (outbox, history) = outbox();
        let trace = Uuid::new_v4();

        assert!(
            outbox
                .force_voucher_out(trace, 6000, TransferOutReason::CashOut, 3)
                .await
                .unwrap()
        );
        assert!(outbox.recover().await.unwrap().contains(&trace));

        let requests = outbox.requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount, 6000);
        assert_eq!(requests[0].associated_transaction_id, 3);
        assert!(!requests[0].handpay);

        voucher_out(&history, trace, 6000).await;
        assert!(outbox.recover().await.unwrap().is_empty());
        assert!(outbox.requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payments_before_the_request_do_not_count() {
        let (outbox, history) = outbox();
        let trace = Uuid::new_v4();
        voucher_out(&history, trace, 4000).await;

        outbox
            .force_voucher_out(trace, 6000, TransferOutReason::CashOut, 0)
            .await
            .unwrap();
        assert_eq!(outbox.requests().await.unwrap()[0].history_mark, 1);
        assert!(outbox.recover().await.unwrap().contains(&trace));

        // A partial landing keeps the request queued
        voucher_out(&history, trace, 2500).await;
        assert!(outbox.recover().await.unwrap().contains(&trace));

        voucher_out(&history, trace, 3500).await;
        assert!(outbox.recover().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_traces_stay_queued() {
        let (outbox, history) = outbox();
        let landed = Uuid::new_v4();
        let waiting = Uuid::new_v4();
        outbox
            .force_handpay(landed, 100, TransferOutReason::LargeWin, 0)
            .await
            .unwrap();
        outbox
            .force_voucher_out(waiting, 200, TransferOutReason::CashOut, 0)
            .await
            .unwrap();
        voucher_out(&history, landed, 100).await;

        let in_flight = outbox.recover().await.unwrap();
        assert_eq!(in_flight, HashSet::from([waiting]));
        assert_eq!(outbox.requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_trace_is_rejected() {
        let (outbox, _history) = outbox();
        let trace = Uuid::new_v4();

        assert!(
            outbox
                .force_handpay(trace, 100, TransferOutReason::LargeWin, 0)
                .await
                .unwrap()
        );
        assert!(
            !outbox
                .force_voucher_out(trace, 100, TransferOutReason::CashOut, 0)
                .await
                .unwrap()
        );
        assert_eq!(outbox.requests().await.unwrap().len(), 1);
    }
}
