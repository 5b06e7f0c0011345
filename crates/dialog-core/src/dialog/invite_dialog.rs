//! # INVITE Dialog
//!
//! The call-shaped dialog: established by an INVITE exchange, ended by
//! BYE, optionally carrying further in-dialog request types (REFER,
//! NOTIFY) and transparent challenge retry. The optional behaviors are
//! capability flags on one type rather than a hierarchy of dialog
//! subtypes; a plain call and a transfer-capable call differ only in
//! configuration.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use sipline_auth_core::Credentials;
use sipline_sip_core::{Message, Method, Request, Response, StatusCode};

use crate::auth::ChallengeRetry;
use crate::errors::{DialogError, DialogResult};
use crate::events::{DialogEvent, TransactionEvent};
use crate::routing::DialogMatcher;
use crate::transaction::TransactionManager;

use super::{Dialog, DialogId};

/// Optional in-dialog behaviors.
#[derive(Debug, Clone, Default)]
pub struct DialogCapabilities {
    /// Re-send challenged in-dialog requests with computed credentials.
    pub handle_challenges: bool,
    /// In-dialog request methods accepted and sendable beyond the base
    /// INVITE/BYE exchange (REFER, NOTIFY, ...).
    pub extra_methods: Vec<Method>,
}

impl DialogCapabilities {
    /// BYE is always part of the base exchange.
    fn allows(&self, method: &Method) -> bool {
        *method == Method::Bye || self.extra_methods.contains(method)
    }
}

/// One call-shaped dialog plus the machinery to run requests inside it.
pub struct InviteDialog {
    dialog: Dialog,
    capabilities: DialogCapabilities,
    retry: Option<ChallengeRetry>,
    transactions: Arc<TransactionManager>,
    matcher: Arc<DialogMatcher>,
    /// Sender registered with the matcher; in-dialog messages arrive on
    /// the paired receiver, which the owning task drains.
    inbound_tx: mpsc::Sender<Message>,
    events: mpsc::Sender<DialogEvent>,
    local_host: String,
}

impl InviteDialog {
    /// Wrap a UAC-side dialog created from an INVITE and its
    /// dialog-establishing response. Registers with the matcher when the
    /// identifier is already complete.
    pub fn new_uac(
        request: &Request,
        response: &Response,
        capabilities: DialogCapabilities,
        credentials: Option<(Credentials, u32)>,
        transactions: Arc<TransactionManager>,
        matcher: Arc<DialogMatcher>,
        events: mpsc::Sender<DialogEvent>,
        local_host: impl Into<String>,
    ) -> (Self, mpsc::Receiver<Message>) {
        let dialog = Dialog::from_response(request, response);
        Self::finish(dialog, capabilities, credentials, transactions, matcher, events, local_host)
    }

    /// Wrap a UAS-side dialog created from an inbound INVITE.
    pub fn new_uas(
        request: &Request,
        capabilities: DialogCapabilities,
        credentials: Option<(Credentials, u32)>,
        transactions: Arc<TransactionManager>,
        matcher: Arc<DialogMatcher>,
        events: mpsc::Sender<DialogEvent>,
        local_host: impl Into<String>,
    ) -> (Self, mpsc::Receiver<Message>) {
        let dialog = Dialog::from_request(request);
        Self::finish(dialog, capabilities, credentials, transactions, matcher, events, local_host)
    }

    fn finish(
        dialog: Dialog,
        capabilities: DialogCapabilities,
        credentials: Option<(Credentials, u32)>,
        transactions: Arc<TransactionManager>,
        matcher: Arc<DialogMatcher>,
        events: mpsc::Sender<DialogEvent>,
        local_host: impl Into<String>,
    ) -> (Self, mpsc::Receiver<Message>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        if let Some(id) = dialog.current_id() {
            matcher.bind(id, inbound_tx.clone());
        }
        let retry = capabilities
            .handle_challenges
            .then_some(())
            .and(credentials)
            .map(|(credentials, max_attempts)| ChallengeRetry::new(credentials, max_attempts));
        let invite_dialog = InviteDialog {
            dialog,
            capabilities,
            retry,
            transactions,
            matcher,
            inbound_tx,
            events,
            local_host: local_host.into(),
        };
        (invite_dialog, inbound_rx)
    }

    pub fn id(&self) -> Option<DialogId> {
        self.dialog.current_id()
    }

    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    /// Confirm the dialog (2xx seen/sent for the establishing INVITE).
    pub async fn confirm(&mut self) {
        if let Some(event) = self.dialog.confirm() {
            let _ = self.events.send(event).await;
        }
    }

    /// End the call: send BYE, then terminate regardless of the outcome.
    pub async fn bye(&mut self) -> DialogResult<TransactionEvent> {
        let outcome = self.run_request(Method::Bye, Vec::new()).await;
        self.terminate("BYE sent").await;
        outcome
    }

    /// Send a REFER naming `target` as the transfer destination.
    pub async fn refer(&mut self, target: &str) -> DialogResult<TransactionEvent> {
        self.run_request(Method::Refer, target.as_bytes().to_vec()).await
    }

    /// Send a NOTIFY carrying `body`.
    pub async fn notify(&mut self, body: Vec<u8>) -> DialogResult<TransactionEvent> {
        self.run_request(Method::Notify, body).await
    }

    /// Run one in-dialog request as its own short-lived transaction,
    /// answering at most the configured number of challenges, and return
    /// its terminal outcome.
    pub async fn run_request(
        &mut self,
        method: Method,
        body: Vec<u8>,
    ) -> DialogResult<TransactionEvent> {
        if !self.capabilities.allows(&method) {
            return Err(DialogError::protocol_error(format!(
                "method {method} not enabled for this dialog"
            )));
        }
        if let Some(retry) = &mut self.retry {
            retry.reset();
        }

        let mut request = self.dialog.create_request(method, &self.local_host)?.with_body(body);

        loop {
            let (tx, mut rx) = mpsc::channel(8);
            self.transactions.send_request(request.clone(), tx).await?;
            let outcome = loop {
                match rx.recv().await {
                    Some(event) if event.is_terminal() => break event,
                    Some(_) => continue,
                    None => return Err(DialogError::protocol_error("transaction channel closed")),
                }
            };

            if let TransactionEvent::Failure { response, .. } = &outcome {
                if response.status.is_auth_challenge() {
                    if let Some(retry) = &mut self.retry {
                        request = retry.answer(&request, response)?;
                        // CSeq advanced inside the retry; keep ours in step.
                        self.dialog.local_cseq = request.cseq.seq;
                        continue;
                    }
                }
            }
            return Ok(outcome);
        }
    }

    /// Handle one in-dialog message forwarded by the matcher.
    pub async fn handle_message(&mut self, message: Message) -> DialogResult<()> {
        self.dialog
            .update_dialog_info(false, &message, &self.matcher, &self.inbound_tx);
        let Message::Request(request) = message else {
            // In-dialog responses belong to transactions started by
            // run_request and are consumed there.
            return Ok(());
        };

        let key = crate::transaction::TransactionKey::server(&request);
        match request.method {
            Method::Bye => {
                self.transactions
                    .respond(&key, Response::to_request(&request, StatusCode::OK))
                    .await?;
                self.terminate("BYE received").await;
            }
            ref method if self.capabilities.allows(method) => {
                debug!(method = %method, "accepting in-dialog request");
                self.transactions
                    .respond(&key, Response::to_request(&request, StatusCode::OK))
                    .await?;
            }
            ref method => {
                warn!(method = %method, "rejecting in-dialog request");
                self.transactions
                    .respond(&key, Response::to_request(&request, StatusCode::METHOD_NOT_ALLOWED))
                    .await?;
            }
        }
        Ok(())
    }

    /// Terminate the dialog and drop its matcher registration. Idempotent.
    pub async fn terminate(&mut self, reason: &str) {
        if self.dialog.is_terminated() {
            return;
        }
        let id = self.dialog.current_id();
        self.dialog.terminate();
        if let Some(id) = id {
            self.matcher.unbind(&id);
            let _ = self
                .events
                .send(DialogEvent::Terminated { dialog_id: id, reason: reason.to_string() })
                .await;
        }
    }
}
