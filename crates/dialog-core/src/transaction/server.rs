//! # Server Transaction
//!
//! Owns one inbound request: absorbs request retransmissions by replaying
//! the last response sent, and lingers after the final response so late
//! retransmissions still get answered instead of spawning a new
//! transaction.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use sipline_sip_core::{Message, Method, Request, Response};

use crate::errors::{DialogError, DialogResult};
use crate::transport::SipTransport;

use super::client::Disposition;
use super::manager::{TimerFired, TimerKind};
use super::timer::{TimerHandle, TimerManager, TimerSettings};
use super::{TransactionKey, TransactionKind, TransactionState};

/// A single in-flight server transaction.
pub struct ServerTransaction {
    key: TransactionKey,
    kind: TransactionKind,
    request: Request,
    reliable: bool,
    settings: TimerSettings,
    transport: Arc<dyn SipTransport>,
    timers: Arc<TimerManager>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,

    state: Mutex<TransactionState>,
    last_response: Mutex<Option<Response>>,
    linger_timer: Mutex<Option<Arc<TimerHandle>>>,
}

impl ServerTransaction {
    pub(crate) fn new(
        request: Request,
        transport: Arc<dyn SipTransport>,
        timers: Arc<TimerManager>,
        settings: TimerSettings,
        timer_tx: mpsc::UnboundedSender<TimerFired>,
    ) -> Arc<Self> {
        let key = TransactionKey::server(&request);
        let kind = if request.method.is_invite() {
            TransactionKind::InviteServer
        } else {
            TransactionKind::NonInviteServer
        };
        let reliable = transport.is_reliable();
        Arc::new(ServerTransaction {
            key,
            kind,
            request,
            reliable,
            settings,
            transport,
            timers,
            timer_tx,
            state: Mutex::new(TransactionState::Calling),
            last_response: Mutex::new(None),
            linger_timer: Mutex::new(None),
        })
    }

    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    /// The request that created this transaction.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Send a response through this transaction. Provisional responses may
    /// be followed by more responses; a final response completes the
    /// transaction.
    pub(crate) async fn respond(&self, response: Response) -> DialogResult<Disposition> {
        {
            let state = self.state.lock();
            if matches!(*state, TransactionState::Completed | TransactionState::Terminated) {
                return Err(DialogError::protocol_error("transaction already completed"));
            }
        }

        let is_final = response.status.is_final();
        self.transport
            .send_message(Message::Response(response.clone()))
            .await
            .map_err(|e| DialogError::protocol_error(&format!("response send failed: {e}")))?;
        *self.last_response.lock() = Some(response);

        if !is_final {
            *self.state.lock() = TransactionState::Proceeding;
            return Ok(Disposition::Keep);
        }

        if self.reliable {
            *self.state.lock() = TransactionState::Terminated;
            Ok(Disposition::Remove)
        } else {
            *self.state.lock() = TransactionState::Completed;
            self.arm_linger();
            Ok(Disposition::Keep)
        }
    }

    /// A request matched this transaction's key after creation: either a
    /// retransmission of the original, or the ACK closing an INVITE
    /// transaction.
    pub(crate) async fn on_request(&self, request: &Request) -> Disposition {
        if request.method == Method::Ack && self.kind.is_invite() {
            // ACK for our final response: stop replaying it.
            self.cancel_linger();
            *self.state.lock() = TransactionState::Terminated;
            return Disposition::Remove;
        }

        let cached = self.last_response.lock().clone();
        match cached {
            Some(response) => {
                debug!(key = %self.key, "retransmitted request, replaying last response");
                if let Err(e) = self.transport.send_message(Message::Response(response)).await {
                    debug!(key = %self.key, "replay send failed: {}", e);
                }
            }
            None => debug!(key = %self.key, "retransmitted request before any response, absorbing"),
        }
        Disposition::Keep
    }

    pub(crate) async fn on_timer(&self, kind: TimerKind) -> Disposition {
        match kind {
            TimerKind::Linger => {
                *self.state.lock() = TransactionState::Terminated;
                Disposition::Remove
            }
            // Server transactions only arm the linger timer.
            TimerKind::Retransmit | TimerKind::Timeout => Disposition::Keep,
        }
    }

    /// Stop timers. Idempotent.
    pub(crate) fn halt(&self) {
        self.cancel_linger();
        *self.state.lock() = TransactionState::Terminated;
    }

    fn arm_linger(&self) {
        let timer_tx = self.timer_tx.clone();
        let key = self.key.clone();
        let handle = self.timers.schedule(self.settings.linger, move || {
            let _ = timer_tx.send(TimerFired { key, kind: TimerKind::Linger });
        });
        if let Some(old) = self.linger_timer.lock().replace(handle) {
            old.cancel();
        }
    }

    fn cancel_linger(&self) {
        if let Some(handle) = self.linger_timer.lock().take() {
            handle.cancel();
        }
    }
}
