//! # Transaction Layer
//!
//! One transaction owns one request/response exchange: its identity key,
//! its retransmission and timeout timers, and the delivery of its final
//! outcome. Matching is purely value equality on [`TransactionKey`]; the
//! [`TransactionManager`] holds the single shared map from key to live
//! transaction and serializes insert/remove/lookup.
//!
//! ## State machines
//!
//! Client: `Calling → Proceeding → Completed → Terminated`, with the
//! INVITE-class variant additionally ACKing non-2xx final responses.
//! Server: mirror image; a duplicate request is answered from the cached
//! response without re-dispatch to application logic.
//!
//! Owner callbacks are [`crate::events::TransactionEvent`]s; each
//! transaction delivers exactly one terminal event.

pub mod client;
pub mod key;
pub mod manager;
pub mod server;
pub mod timer;

pub use client::ClientTransaction;
pub use key::{TransactionKey, TransactionRole};
pub use manager::TransactionManager;
pub use server::ServerTransaction;
pub use timer::{TimerHandle, TimerManager, TimerSettings};

use serde::{Deserialize, Serialize};

/// Lifecycle states shared by both transaction families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// Request sent (client) or received (server); no response yet.
    Calling,
    /// A provisional response has been seen/sent.
    Proceeding,
    /// A final response has been seen/sent; absorbing retransmissions.
    Completed,
    /// Done; timers cancelled, about to leave the matching map.
    Terminated,
}

/// The four transaction families of RFC 3261 Section 17.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    InviteClient,
    NonInviteClient,
    InviteServer,
    NonInviteServer,
}

impl TransactionKind {
    pub fn is_client(&self) -> bool {
        matches!(self, TransactionKind::InviteClient | TransactionKind::NonInviteClient)
    }

    pub fn is_invite(&self) -> bool {
        matches!(self, TransactionKind::InviteClient | TransactionKind::InviteServer)
    }
}
