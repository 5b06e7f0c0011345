//! # Transaction Manager
//!
//! The single owner of the key → transaction maps. Every inbound message
//! and every fired timer funnels through here, so insert, lookup, and
//! remove for a given key never race: timers deliver into an internal
//! channel drained by one task instead of mutating transactions from
//! their timer callbacks.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sipline_sip_core::{Message, Method, Request, Response};

use crate::errors::{DialogError, DialogResult};
use crate::events::{DispatchEvent, TransactionEvent};
use crate::transport::{SipTransport, TransportEvent};

use super::client::{ClientTransaction, Disposition};
use super::key::{TransactionKey, TransactionRole};
use super::server::ServerTransaction;
use super::timer::{TimerManager, TimerSettings};

/// Which of a transaction's timers fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Retransmit,
    Timeout,
    Linger,
}

/// Posted by timer callbacks into the manager's timer channel.
#[derive(Debug)]
pub(crate) struct TimerFired {
    pub key: TransactionKey,
    pub kind: TimerKind,
}

/// Matches messages to in-flight transactions and owns their lifecycles.
pub struct TransactionManager {
    transport: Arc<dyn SipTransport>,
    timers: Arc<TimerManager>,
    settings: TimerSettings,
    clients: DashMap<TransactionKey, Arc<ClientTransaction>>,
    servers: DashMap<TransactionKey, Arc<ServerTransaction>>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
    dispatch_tx: mpsc::Sender<DispatchEvent>,
}

impl TransactionManager {
    /// Create a manager over the given transport. The returned receiver
    /// carries [`DispatchEvent`]s: new server transactions and transport
    /// closure. Dropping the manager stops the internal timer task.
    pub fn new(
        transport: Arc<dyn SipTransport>,
        settings: TimerSettings,
    ) -> (Arc<Self>, mpsc::Receiver<DispatchEvent>) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::channel(64);

        let manager = Arc::new(TransactionManager {
            transport,
            timers: TimerManager::new(),
            settings,
            clients: DashMap::new(),
            servers: DashMap::new(),
            timer_tx,
            dispatch_tx,
        });

        tokio::spawn(Self::timer_loop(Arc::downgrade(&manager), timer_rx));

        (manager, dispatch_rx)
    }

    /// Start a client transaction for `request`. Events for this
    /// transaction, ending in exactly one terminal event, arrive on
    /// `events`.
    pub async fn send_request(
        &self,
        request: Request,
        events: mpsc::Sender<TransactionEvent>,
    ) -> DialogResult<TransactionKey> {
        let transaction = ClientTransaction::new(
            request,
            events,
            Arc::clone(&self.transport),
            Arc::clone(&self.timers),
            self.settings.clone(),
            self.timer_tx.clone(),
        );
        let key = transaction.key().clone();

        // Insert before sending so a fast response cannot miss the map.
        match self.clients.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(DialogError::TransactionExists(key));
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&transaction));
            }
        }

        debug!(key = %key, "client transaction created");
        if transaction.start().await == Disposition::Remove {
            self.clients.remove(&key);
        }
        Ok(key)
    }

    /// Send a response through the server transaction identified by `key`.
    pub async fn respond(&self, key: &TransactionKey, response: Response) -> DialogResult<()> {
        let transaction = self
            .servers
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DialogError::TransactionNotFound(key.clone()))?;
        if transaction.respond(response).await? == Disposition::Remove {
            self.servers.remove(key);
        }
        Ok(())
    }

    /// Feed one parsed inbound message through transaction matching.
    pub async fn handle_message(&self, message: Message) {
        match message {
            Message::Request(request) => self.handle_request(request).await,
            Message::Response(response) => self.handle_response(response).await,
        }
    }

    /// Feed one transport notification.
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::MessageReceived(message) => self.handle_message(message).await,
            TransportEvent::ConnectionTerminated(reason)
            | TransportEvent::TransportTerminated(reason) => {
                self.fail_in_flight(&reason).await;
                let _ = self
                    .dispatch_tx
                    .send(DispatchEvent::TransportClosed { reason })
                    .await;
            }
        }
    }

    /// Number of live transactions, client plus server.
    pub fn transaction_count(&self) -> usize {
        self.clients.len() + self.servers.len()
    }

    /// Cancel every timer and drop every transaction without emitting
    /// further events. Idempotent.
    pub fn halt(&self) {
        for entry in self.clients.iter() {
            entry.value().halt();
        }
        for entry in self.servers.iter() {
            entry.value().halt();
        }
        self.clients.clear();
        self.servers.clear();
    }

    async fn handle_request(&self, request: Request) {
        let key = TransactionKey::server(&request);
        let existing = self.servers.get(&key).map(|entry| Arc::clone(entry.value()));
        if let Some(transaction) = existing {
            if transaction.on_request(&request).await == Disposition::Remove {
                self.servers.remove(&key);
            }
            return;
        }

        if request.method == Method::Ack {
            // ACK closing a 2xx travels outside any transaction; an ACK
            // with no matching transaction here has nothing to close.
            debug!(key = %key, "ACK matched no transaction, discarding");
            return;
        }

        let transaction = ServerTransaction::new(
            request.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.timers),
            self.settings.clone(),
            self.timer_tx.clone(),
        );
        self.servers.insert(key.clone(), transaction);
        info!(key = %key, method = %request.method, "server transaction created");
        let _ = self
            .dispatch_tx
            .send(DispatchEvent::NewServerTransaction { key, request })
            .await;
    }

    async fn handle_response(&self, response: Response) {
        let key = TransactionKey::from_response(&response);
        let transaction = self.clients.get(&key).map(|entry| Arc::clone(entry.value()));
        match transaction {
            Some(transaction) => {
                if transaction.on_response(response).await == Disposition::Remove {
                    self.clients.remove(&key);
                }
            }
            // Stray and late responses are dropped, never errors.
            None => debug!(key = %key, status = %response.status, "response matched no transaction, discarding"),
        }
    }

    async fn fail_in_flight(&self, reason: &str) {
        warn!("transport terminated ({reason}), failing in-flight client transactions");
        let clients: Vec<_> = self
            .clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.clients.clear();
        for transaction in clients {
            transaction.fail(reason).await;
        }
        for entry in self.servers.iter() {
            entry.value().halt();
        }
        self.servers.clear();
    }

    async fn timer_loop(manager: Weak<TransactionManager>, mut rx: mpsc::UnboundedReceiver<TimerFired>) {
        while let Some(TimerFired { key, kind }) = rx.recv().await {
            let Some(manager) = manager.upgrade() else { break };
            match key.role {
                TransactionRole::Client => {
                    let transaction =
                        manager.clients.get(&key).map(|entry| Arc::clone(entry.value()));
                    if let Some(transaction) = transaction {
                        if transaction.on_timer(kind).await == Disposition::Remove {
                            manager.clients.remove(&key);
                        }
                    }
                }
                TransactionRole::Server => {
                    let transaction =
                        manager.servers.get(&key).map(|entry| Arc::clone(entry.value()));
                    if let Some(transaction) = transaction {
                        if transaction.on_timer(kind).await == Disposition::Remove {
                            manager.servers.remove(&key);
                        }
                    }
                }
            }
        }
    }
}
