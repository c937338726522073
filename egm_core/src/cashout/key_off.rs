//! Operator key-off gate for payouts above the hand-pay limit.

use super::errors::{RecoveryError, RecoveryResult};
use log::{debug, warn};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    KeyedOff,
    Aborted,
}

/// One-shot key-off channels keyed by cash-out trace id
///
/// A waiter has no timeout. It resolves when the operator keys off, and
/// fails when the wait is aborted, replaced, or the gate is dropped.
#[derive(Debug, Default)]
pub struct KeyOffGate {
    waiters: Mutex<HashMap<Uuid, oneshot::Sender<Signal>>>,
}

/// Registered wait for a single key-off
#[derive(Debug)]
#[must_use = "a key-off waiter does nothing unless awaited"]
pub struct KeyOffWaiter {
    trace_id: Uuid,
    receiver: oneshot::Receiver<Signal>,
}

impl KeyOffWaiter {
    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// Block until the key-off arrives
    ///
    /// # Errors
    ///
    /// * `RecoveryError::KeyOffAborted` - The wait was aborted
    pub async fn wait(self) -> RecoveryResult<()> {
        match self.receiver.await {
            Ok(Signal::KeyedOff) => Ok(()),
            Ok(Signal::Aborted) | Err(_) => Err(RecoveryError::KeyOffAborted(self.trace_id)),
        }
    }
}

impl KeyOffGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a key-off before announcing the lockup
    ///
    /// Registering the same trace id again aborts the earlier waiter.
    pub fn register(&self, trace_id: Uuid) -> KeyOffWaiter {
        let (sender, receiver) = oneshot::channel();
        if self.lock().insert(trace_id, sender).is_some() {
            warn!("Replaced pending key-off wait for {trace_id}");
        }
        KeyOffWaiter { trace_id, receiver }
    }

    /// Register and wait in one step
    pub async fn wait(&self, trace_id: Uuid) -> RecoveryResult<()> {
        self.register(trace_id).wait().await
    }

    /// Deliver the operator key-off
    ///
    /// # Returns
    ///
    /// * `bool` - Whether a waiter was released
    pub fn key_off(&self, trace_id: Uuid) -> bool {
        self.signal(trace_id, Signal::KeyedOff)
    }

    /// Abandon a pending key-off wait
    pub fn abort(&self, trace_id: Uuid) -> bool {
        self.signal(trace_id, Signal::Aborted)
    }

    /// Trace ids currently waiting for a key-off
    pub fn pending(&self) -> Vec<Uuid> {
        let mut pending: Vec<Uuid> = self.lock().keys().copied().collect();
        pending.sort();
        pending
    }

    fn signal(&self, trace_id: Uuid, signal: Signal) -> bool {
        let Some(sender) = self.lock().remove(&trace_id) else {
            debug!("No key-off wait pending for {trace_id}");
            return false;
        };
        // A dropped receiver means the waiter already gave up
        sender.send(signal).is_ok()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, oneshot::Sender<Signal>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_key_off_releases_waiter() {
        let gate = KeyOffGate::new();
        let trace = Uuid::new_v4();
        let waiter = gate.register(trace);
        assert_eq!(gate.pending(), vec![trace]);

        assert!(gate.key_off(trace));
        assert!(waiter.wait().await.is_ok());
        assert!(gate.pending().is_empty());
    }

    #[tokio::test]
    async fn test_abort_fails_waiter() {
        let gate = KeyOffGate::new();
        let trace = Uuid::new_v4();
        let waiter = gate.register(trace);

        assert!(gate.abort(trace));
        assert!(matches!(
            waiter.wait().await,
            Err(RecoveryError::KeyOffAborted(t)) if t == trace
        ));
    }

    #[tokio::test]
    async fn test_key_off_without_waiter() {
        let gate = KeyOffGate::new();
        assert!(!gate.key_off(Uuid::new_v4()));
        assert!(!gate.abort(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_reregistering_aborts_previous_waiter() {
        let gate = KeyOffGate::new();
        let trace = Uuid::new_v4();
        let first = gate.register(trace);
        let second = gate.register(trace);

        assert!(first.wait().await.is_err());
        assert!(gate.key_off(trace));
        assert!(second.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_across_tasks() {
        let gate = Arc::new(KeyOffGate::new());
        let trace = Uuid::new_v4();

        let handle = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait(trace).await })
        };
        while gate.pending().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(gate.key_off(trace));
        assert!(handle.await.unwrap().is_ok());
    }
}
