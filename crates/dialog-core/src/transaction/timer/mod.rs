//! # Timer Service
//!
//! One-shot, cancellable delayed callbacks on the tokio runtime. Every
//! stateful component in this crate expresses waiting as a scheduled
//! callback through this service — nothing blocks for a network reply.
//!
//! The [`TimerManager`] is an explicitly constructed handle passed down to
//! the components that need it; its lifecycle belongs to the embedding
//! application, not to ambient global state.
//!
//! Cancellation is idempotent: cancelling an already-fired or
//! already-cancelled timer is a no-op, and firing races with cancellation
//! benignly (the callback either runs once or not at all).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Standard RFC 3261 timer values plus local policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSettings {
    /// T1: RTT estimate; initial retransmission interval.
    pub t1: Duration,
    /// T2: retransmission interval ceiling for non-INVITE requests.
    pub t2: Duration,
    /// Overall transaction deadline (Timer B/F), conventionally 64*T1.
    pub transaction_timeout: Duration,
    /// How long a terminated transaction lingers in the map to absorb
    /// retransmissions on unreliable transports (Timer D/J class).
    pub linger: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        let t1 = Duration::from_millis(500);
        TimerSettings {
            t1,
            t2: Duration::from_secs(4),
            transaction_timeout: t1 * 64,
            linger: Duration::from_secs(32),
        }
    }
}

impl TimerSettings {
    /// Settings scaled down for tests that drive real (short) waits.
    pub fn fast() -> Self {
        let t1 = Duration::from_millis(10);
        TimerSettings {
            t1,
            t2: Duration::from_millis(40),
            transaction_timeout: t1 * 64,
            linger: Duration::from_millis(50),
        }
    }
}

/// Handle to one scheduled callback.
pub struct TimerHandle {
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl TimerHandle {
    /// Cancel the callback if it has not fired. Safe to call repeatedly.
    pub fn cancel(&self) {
        if let Some(tx) = self.cancel.lock().take() {
            // The receiver may already be gone if the timer fired.
            let _ = tx.send(());
        }
    }

    /// Whether `cancel` has already consumed this handle's cancel channel.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Schedules one-shot callbacks as tokio tasks.
#[derive(Debug, Clone, Default)]
pub struct TimerManager;

impl TimerManager {
    pub fn new() -> Arc<Self> {
        Arc::new(TimerManager)
    }

    /// Run `callback` after `delay` unless the returned handle is
    /// cancelled first. The handle may be dropped without cancelling the
    /// timer (detached timers are allowed).
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Arc<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => callback(),
                _ = cancel_rx => {}
            }
        });
        Arc::new(TimerHandle { cancel: Mutex::new(Some(cancel_tx)) })
    }
}
