//! # Client Transaction
//!
//! Owns one outbound request: retransmission on unreliable transports,
//! the overall deadline, and delivery of exactly one terminal outcome to
//! the owner. Mutable state is touched only through this type's own entry
//! points (`start`, `on_response`, `on_timer`, `halt`), which the manager
//! serializes per key.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sipline_sip_core::{Message, Method, Request, Response};

use crate::events::TransactionEvent;
use crate::transport::SipTransport;

use super::manager::{TimerFired, TimerKind};
use super::timer::{TimerHandle, TimerManager, TimerSettings};
use super::{TransactionKey, TransactionKind, TransactionState};

/// What the manager should do with the transaction after an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Keep,
    Remove,
}

/// A single in-flight client transaction.
pub struct ClientTransaction {
    key: TransactionKey,
    kind: TransactionKind,
    request: Request,
    reliable: bool,
    settings: TimerSettings,
    transport: Arc<dyn SipTransport>,
    timers: Arc<TimerManager>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,

    state: Mutex<TransactionState>,
    /// Taken when the terminal event is emitted; `None` afterwards, which
    /// is what makes a second terminal emission unrepresentable.
    events: Mutex<Option<mpsc::Sender<TransactionEvent>>>,
    retransmit_timer: Mutex<Option<Arc<TimerHandle>>>,
    timeout_timer: Mutex<Option<Arc<TimerHandle>>>,
    retransmit_interval: Mutex<Duration>,
}

impl ClientTransaction {
    pub(crate) fn new(
        request: Request,
        events: mpsc::Sender<TransactionEvent>,
        transport: Arc<dyn SipTransport>,
        timers: Arc<TimerManager>,
        settings: TimerSettings,
        timer_tx: mpsc::UnboundedSender<TimerFired>,
    ) -> Arc<Self> {
        let key = TransactionKey::client(&request);
        let kind = if request.method.is_invite() {
            TransactionKind::InviteClient
        } else {
            TransactionKind::NonInviteClient
        };
        let reliable = transport.is_reliable();
        let t1 = settings.t1;
        Arc::new(ClientTransaction {
            key,
            kind,
            request,
            reliable,
            settings,
            transport,
            timers,
            timer_tx,
            state: Mutex::new(TransactionState::Calling),
            events: Mutex::new(Some(events)),
            retransmit_timer: Mutex::new(None),
            timeout_timer: Mutex::new(None),
            retransmit_interval: Mutex::new(t1),
        })
    }

    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    /// Send the request and arm timers. A transport error becomes the
    /// terminal `TransportError` outcome, not an `Err`.
    pub(crate) async fn start(&self) -> Disposition {
        if let Err(e) = self.transport.send_message(Message::Request(self.request.clone())).await {
            debug!(key = %self.key, "send failed, failing transaction: {}", e);
            self.emit_terminal(TransactionEvent::TransportError {
                key: self.key.clone(),
                reason: e.to_string(),
            })
            .await;
            *self.state.lock() = TransactionState::Terminated;
            return Disposition::Remove;
        }

        if !self.reliable {
            self.arm_timer(&self.retransmit_timer, self.settings.t1, TimerKind::Retransmit);
        }
        self.arm_timer(&self.timeout_timer, self.settings.transaction_timeout, TimerKind::Timeout);
        Disposition::Keep
    }

    /// An inbound response matched this transaction's key.
    pub(crate) async fn on_response(&self, response: Response) -> Disposition {
        let state = *self.state.lock();
        match state {
            TransactionState::Calling | TransactionState::Proceeding => {
                if response.status.is_provisional() {
                    *self.state.lock() = TransactionState::Proceeding;
                    // Retransmitting under a provisional response only adds load.
                    self.cancel_timer(&self.retransmit_timer);
                    self.emit(TransactionEvent::Provisional {
                        key: self.key.clone(),
                        response,
                    })
                    .await;
                    Disposition::Keep
                } else {
                    self.complete(response).await
                }
            }
            TransactionState::Completed | TransactionState::Terminated => {
                // Retransmitted final response. For INVITE-class the ACK
                // itself may have been lost, so answer it again.
                if self.kind.is_invite() && response.status.is_failure() {
                    self.send_ack(&response).await;
                }
                Disposition::Keep
            }
        }
    }

    /// A timer armed by this transaction fired.
    pub(crate) async fn on_timer(&self, kind: TimerKind) -> Disposition {
        match kind {
            TimerKind::Retransmit => {
                if *self.state.lock() != TransactionState::Calling {
                    return Disposition::Keep;
                }
                if let Err(e) = self
                    .transport
                    .send_message(Message::Request(self.request.clone()))
                    .await
                {
                    debug!(key = %self.key, "retransmission send failed: {}", e);
                    self.cancel_all_timers();
                    *self.state.lock() = TransactionState::Terminated;
                    self.emit_terminal(TransactionEvent::TransportError {
                        key: self.key.clone(),
                        reason: e.to_string(),
                    })
                    .await;
                    return Disposition::Remove;
                }
                // Back off: double up to T2.
                let next = {
                    let mut interval = self.retransmit_interval.lock();
                    *interval = (*interval * 2).min(self.settings.t2);
                    *interval
                };
                self.arm_timer(&self.retransmit_timer, next, TimerKind::Retransmit);
                Disposition::Keep
            }
            TimerKind::Timeout => {
                let state = *self.state.lock();
                if matches!(state, TransactionState::Completed | TransactionState::Terminated) {
                    return Disposition::Keep;
                }
                warn!(key = %self.key, "transaction timed out without a final response");
                self.cancel_all_timers();
                *self.state.lock() = TransactionState::Terminated;
                self.emit_terminal(TransactionEvent::Timeout { key: self.key.clone() }).await;
                Disposition::Remove
            }
            TimerKind::Linger => {
                *self.state.lock() = TransactionState::Terminated;
                Disposition::Remove
            }
        }
    }

    /// Stop everything without emitting any further event. Idempotent.
    pub(crate) fn halt(&self) {
        self.cancel_all_timers();
        self.events.lock().take();
        *self.state.lock() = TransactionState::Terminated;
    }

    /// Fail the transaction from outside (transport-level termination).
    pub(crate) async fn fail(&self, reason: &str) {
        self.cancel_all_timers();
        *self.state.lock() = TransactionState::Terminated;
        self.emit_terminal(TransactionEvent::TransportError {
            key: self.key.clone(),
            reason: reason.to_string(),
        })
        .await;
    }

    async fn complete(&self, response: Response) -> Disposition {
        self.cancel_all_timers();

        let success = response.status.is_success();
        if self.kind.is_invite() && !success {
            // ACK the non-2xx final before reporting failure.
            self.send_ack(&response).await;
        }

        let event = if success {
            TransactionEvent::Success { key: self.key.clone(), response }
        } else {
            TransactionEvent::Failure { key: self.key.clone(), response }
        };
        self.emit_terminal(event).await;

        if self.reliable {
            *self.state.lock() = TransactionState::Terminated;
            Disposition::Remove
        } else {
            // Linger to absorb response retransmissions.
            *self.state.lock() = TransactionState::Completed;
            self.arm_timer(&self.timeout_timer, self.settings.linger, TimerKind::Linger);
            Disposition::Keep
        }
    }

    /// ACK a non-2xx final response on the same branch as the INVITE
    /// (RFC 3261 Section 17.1.1.3). Send errors are only logged: the
    /// transaction already has its outcome.
    async fn send_ack(&self, response: &Response) {
        let mut ack = self.request.clone();
        ack.method = Method::Ack;
        ack.cseq.method = Method::Ack;
        ack.to = response.to.clone();
        ack.body = Vec::new();
        if let Err(e) = self.transport.send_message(Message::Request(ack)).await {
            debug!(key = %self.key, "ACK send failed: {}", e);
        }
    }

    async fn emit(&self, event: TransactionEvent) {
        let sender = self.events.lock().as_ref().cloned();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    async fn emit_terminal(&self, event: TransactionEvent) {
        let sender = self.events.lock().take();
        match sender {
            Some(sender) => {
                let _ = sender.send(event).await;
            }
            None => debug!(key = %self.key, "terminal outcome already delivered, dropping event"),
        }
    }

    fn arm_timer(
        &self,
        slot: &Mutex<Option<Arc<TimerHandle>>>,
        delay: Duration,
        kind: TimerKind,
    ) {
        let timer_tx = self.timer_tx.clone();
        let key = self.key.clone();
        let handle = self.timers.schedule(delay, move || {
            let _ = timer_tx.send(TimerFired { key, kind });
        });
        if let Some(old) = slot.lock().replace(handle) {
            old.cancel();
        }
    }

    fn cancel_timer(&self, slot: &Mutex<Option<Arc<TimerHandle>>>) {
        if let Some(handle) = slot.lock().take() {
            handle.cancel();
        }
    }

    fn cancel_all_timers(&self) {
        self.cancel_timer(&self.retransmit_timer);
        self.cancel_timer(&self.timeout_timer);
    }
}
