//! # Registration Client
//!
//! Keeps one contact binding alive at a registrar: a REGISTER cycle per
//! attempt, transparent digest challenge retry, renewal ahead of expiry,
//! and exponential backoff after failures. One task owns all mutable
//! state; the public handle only posts commands, and timers re-enter the
//! task through the same command channel instead of touching state from
//! their callbacks.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sipline_dialog_core::{
    ChallengeRetry, TimerHandle, TimerManager, TransactionEvent, TransactionManager,
};
use sipline_sip_core::{
    Address, CSeq, DigestChallenge, Method, Request, Uri, Via,
};

use sipline_auth_core::answer_challenge;

use crate::config::RegistrationConfig;
use crate::events::RegistrationEvent;

#[derive(Debug)]
enum Command {
    Register { expires: u32 },
    Unregister,
    UnregisterAll,
    Renew,
    Retry,
    Halt,
}

/// Handle to a running registration session.
///
/// Dropping the handle ends the session task; [`halt`](Self::halt) stops
/// timers and looping while keeping the task alive for a later
/// `register()`.
pub struct RegistrationClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl RegistrationClient {
    /// Spawn the session task. Outcomes arrive on the returned receiver,
    /// one event per completed cycle.
    pub fn new(
        config: RegistrationConfig,
        transactions: Arc<TransactionManager>,
        timers: Arc<TimerManager>,
    ) -> (Self, mpsc::Receiver<RegistrationEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(16);
        let task = RegistrationTask::new(config, transactions, timers, event_tx, cmd_tx.clone());
        tokio::spawn(task.run(cmd_rx));
        (RegistrationClient { cmd_tx }, event_rx)
    }

    /// Register the contact binding for `expires` seconds. Resets the
    /// challenge attempt counter; enables looping when configured and
    /// `expires` is non-zero.
    pub fn register(&self, expires: u32) {
        let _ = self.cmd_tx.send(Command::Register { expires });
    }

    /// Remove this session's contact binding (`register(0)`).
    pub fn unregister(&self) {
        let _ = self.cmd_tx.send(Command::Unregister);
    }

    /// Remove every binding for the address-of-record (wildcard contact).
    pub fn unregister_all(&self) {
        let _ = self.cmd_tx.send(Command::UnregisterAll);
    }

    /// Cancel the retry and renewal timers and stop looping. Takes effect
    /// even while a REGISTER attempt is in flight, in which case that
    /// attempt is abandoned without an outcome event. Idempotent and safe
    /// in any state.
    pub fn halt(&self) {
        let _ = self.cmd_tx.send(Command::Halt);
    }
}

/// Renewal interval policy: when looping, renew at the granted lifetime
/// capped by the configured renewal time (the configured time alone when
/// the grant carries no lifetime); when not looping, nothing is scheduled
/// and 0 is reported.
fn compute_renew(looping: bool, granted: u32, configured: u32) -> u32 {
    if !looping {
        0
    } else if granted > 0 {
        granted.min(configured)
    } else {
        configured
    }
}

struct RegistrationTask {
    config: RegistrationConfig,
    transactions: Arc<TransactionManager>,
    timers: Arc<TimerManager>,
    events: mpsc::Sender<RegistrationEvent>,
    cmd_tx: mpsc::UnboundedSender<Command>,

    /// Stable for the whole session; only CSeq and branch vary per attempt.
    call_id: String,
    from_tag: String,
    cseq: u32,
    retry: Option<ChallengeRetry>,
    /// Last server nonce, from a challenge or an Authentication-Info
    /// next-nonce; used for pre-emptive credentials.
    cached_challenge: Option<DigestChallenge>,
    backoff: std::time::Duration,
    looping: bool,
    requested_expires: u32,
    wildcard: bool,
    attempt_timer: Option<Arc<TimerHandle>>,
    renewal_timer: Option<Arc<TimerHandle>>,
}

impl RegistrationTask {
    fn new(
        config: RegistrationConfig,
        transactions: Arc<TransactionManager>,
        timers: Arc<TimerManager>,
        events: mpsc::Sender<RegistrationEvent>,
        cmd_tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let retry = config
            .credentials
            .clone()
            .map(|credentials| ChallengeRetry::new(credentials, config.max_attempts));
        let backoff = config.retry_backoff_min;
        let requested_expires = config.expires;
        RegistrationTask {
            config,
            transactions,
            timers,
            events,
            cmd_tx,
            call_id: Request::generate_call_id(),
            from_tag: Address::generate_tag(),
            cseq: 0,
            retry,
            cached_challenge: None,
            backoff,
            looping: false,
            requested_expires,
            wildcard: false,
            attempt_timer: None,
            renewal_timer: None,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        // Commands that arrived while a cycle was in flight, replayed in
        // order once the cycle finishes.
        let mut pending = VecDeque::new();
        loop {
            let command = match pending.pop_front() {
                Some(command) => command,
                None => match cmd_rx.recv().await {
                    Some(command) => command,
                    None => return,
                },
            };
            let halted = match command {
                Command::Register { expires } => {
                    self.cancel_timers();
                    self.looping = self.config.loop_enabled && expires > 0;
                    self.requested_expires = expires;
                    self.wildcard = false;
                    if let Some(retry) = &mut self.retry {
                        retry.reset();
                    }
                    self.cycle_watching_halt(&mut cmd_rx, &mut pending).await
                }
                Command::Unregister => {
                    self.cancel_timers();
                    self.looping = false;
                    self.requested_expires = 0;
                    self.wildcard = false;
                    self.cycle_watching_halt(&mut cmd_rx, &mut pending).await
                }
                Command::UnregisterAll => {
                    self.cancel_timers();
                    self.looping = false;
                    self.requested_expires = 0;
                    self.wildcard = true;
                    self.cycle_watching_halt(&mut cmd_rx, &mut pending).await
                }
                Command::Renew => {
                    debug!(call_id = %self.call_id, "renewal due");
                    self.cycle_watching_halt(&mut cmd_rx, &mut pending).await
                }
                Command::Retry => {
                    debug!(call_id = %self.call_id, "retry due");
                    self.cycle_watching_halt(&mut cmd_rx, &mut pending).await
                }
                Command::Halt => true,
            };
            if halted {
                self.cancel_timers();
                self.looping = false;
                pending.clear();
            }
        }
    }

    /// Run one cycle while still draining the command channel. A `Halt`
    /// posted mid-cycle drops the in-flight attempt on the spot, so no
    /// outcome is reported for it; any other command is queued and
    /// handled once the cycle finishes. Returns whether a halt was seen.
    async fn cycle_watching_halt(
        &mut self,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
        pending: &mut VecDeque<Command>,
    ) -> bool {
        let mut cycle = pin!(self.run_cycle());
        loop {
            tokio::select! {
                () = &mut cycle => return false,
                command = cmd_rx.recv() => match command {
                    Some(Command::Halt) | None => return true,
                    Some(other) => pending.push_back(other),
                },
            }
        }
    }

    /// One registration cycle: send REGISTER, answer challenges up to the
    /// attempt bound, report exactly one outcome, and schedule the next
    /// timer (renewal or retry) as policy dictates.
    async fn run_cycle(&mut self) {
        let mut request = self.build_register();

        let outcome = loop {
            let (tx, mut rx) = mpsc::channel(8);
            if let Err(e) = self.transactions.send_request(request.clone(), tx).await {
                break Err(e.to_string());
            }
            let terminal = loop {
                match rx.recv().await {
                    Some(event) if event.is_terminal() => break event,
                    Some(_) => continue,
                    None => break TransactionEvent::TransportError {
                        key: sipline_dialog_core::TransactionKey::client(&request),
                        reason: "transaction channel closed".to_string(),
                    },
                }
            };

            match terminal {
                TransactionEvent::Success { response, .. } => break Ok(response),
                TransactionEvent::Failure { response, .. }
                    if response.status.is_auth_challenge() =>
                {
                    let Some(retry) = &mut self.retry else {
                        break Err(format!("challenged ({}) without credentials", response.status));
                    };
                    match retry.answer(&request, &response) {
                        Ok(answered) => {
                            self.cached_challenge = response.challenge.clone();
                            self.cseq = answered.cseq.seq;
                            request = answered;
                        }
                        // Realm mismatch or attempt bound: terminal, no
                        // retry timer for this failure class.
                        Err(e) => {
                            self.report_failure(e.to_string()).await;
                            return;
                        }
                    }
                }
                TransactionEvent::Failure { response, .. } => {
                    break Err(format!("registrar answered {}", response.status))
                }
                TransactionEvent::Timeout { .. } => break Err("transaction timeout".to_string()),
                TransactionEvent::TransportError { reason, .. } => break Err(reason),
                // The receive loop above only hands out terminal events.
                TransactionEvent::Provisional { .. } => {
                    break Err("provisional response left pending".to_string())
                }
            }
        };

        match outcome {
            Ok(response) => {
                self.cancel_attempt_timer();
                if let Some(retry) = &mut self.retry {
                    retry.reset();
                }
                self.backoff = self.config.retry_backoff_min;
                if let Some(nonce) = &response.next_nonce {
                    self.cache_next_nonce(nonce.clone());
                }

                let granted = response.expires.unwrap_or(self.requested_expires);
                let renew = compute_renew(self.looping, granted, self.config.renew_time);
                if renew > 0 {
                    self.schedule_renewal(renew);
                }
                info!(
                    call_id = %self.call_id,
                    granted,
                    renew,
                    "registration accepted"
                );
                let _ = self
                    .events
                    .send(RegistrationEvent::Success {
                        target: self.config.from_uri.clone(),
                        contact: self.contact_uri(),
                        expires_granted: granted,
                        renew_scheduled: renew,
                        reason: response.status.reason_phrase().to_string(),
                    })
                    .await;
            }
            Err(reason) => {
                self.report_failure(reason).await;
                if self.looping {
                    self.schedule_retry();
                }
            }
        }
    }

    fn build_register(&mut self) -> Request {
        self.cseq += 1;
        let from = Address::new(self.config.from_uri.clone()).with_tag(self.from_tag.clone());
        let to = Address::new(self.config.from_uri.clone());
        let transport = if self.config.registrar_uri.is_secure() { "TLS" } else { "UDP" };
        let mut request = Request::new(
            Method::Register,
            self.config.registrar_uri.clone(),
            Via::new(transport, self.config.local_host.clone(), None, Via::generate_branch()),
            from,
            to,
            self.call_id.clone(),
            CSeq::new(self.cseq, Method::Register),
        )
        .with_contact(Address::new(self.contact_uri()))
        .with_expires(self.requested_expires);
        if let Some(route) = &self.config.route {
            request.route_set.push(route.clone());
        }
        // Pre-emptive credentials from the cached nonce save one round
        // trip when the registrar keeps challenging with the same nonce.
        if let (Some(challenge), Some(credentials)) =
            (&self.cached_challenge, &self.config.credentials)
        {
            match answer_challenge(
                challenge,
                credentials,
                &request.method.to_string(),
                &request.uri.to_string(),
                &request.body,
            ) {
                Ok(authorization) => request = request.with_authorization(authorization),
                Err(e) => warn!(call_id = %self.call_id, "pre-emptive credentials skipped: {}", e),
            }
        }
        request
    }

    fn contact_uri(&self) -> Uri {
        if self.wildcard {
            Uri::wildcard()
        } else {
            self.config.contact_uri.clone()
        }
    }

    fn cache_next_nonce(&mut self, nonce: String) {
        match &mut self.cached_challenge {
            Some(challenge) => challenge.nonce = nonce,
            None => {
                if let Some(credentials) = &self.config.credentials {
                    self.cached_challenge =
                        Some(DigestChallenge::new(credentials.realm.clone(), nonce));
                }
            }
        }
    }

    async fn report_failure(&self, reason: String) {
        warn!(call_id = %self.call_id, "registration failed: {}", reason);
        let _ = self
            .events
            .send(RegistrationEvent::Failure {
                target: self.config.from_uri.clone(),
                contact: self.contact_uri(),
                reason,
            })
            .await;
    }

    fn schedule_renewal(&mut self, renew_secs: u32) {
        let cmd_tx = self.cmd_tx.clone();
        let handle = self
            .timers
            .schedule(std::time::Duration::from_secs(u64::from(renew_secs)), move || {
                let _ = cmd_tx.send(Command::Renew);
            });
        if let Some(old) = self.renewal_timer.replace(handle) {
            old.cancel();
        }
    }

    fn schedule_retry(&mut self) {
        let cmd_tx = self.cmd_tx.clone();
        let handle = self.timers.schedule(self.backoff, move || {
            let _ = cmd_tx.send(Command::Retry);
        });
        if let Some(old) = self.attempt_timer.replace(handle) {
            old.cancel();
        }
        self.backoff = (self.backoff * 2).min(self.config.retry_backoff_max);
    }

    fn cancel_attempt_timer(&mut self) {
        if let Some(timer) = self.attempt_timer.take() {
            timer.cancel();
        }
    }

    fn cancel_timers(&mut self) {
        self.cancel_attempt_timer();
        if let Some(timer) = self.renewal_timer.take() {
            timer.cancel();
        }
    }
}
