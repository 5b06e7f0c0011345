//! Event types delivered to transaction owners and to the embedding
//! application.
//!
//! Owner notification is a closed set of variants sent through an
//! `mpsc::Sender` rather than a listener trait: the "at most one terminal
//! callback" invariant then holds structurally, because the sender used
//! for terminal events is consumed when the first one goes out.

use serde::{Deserialize, Serialize};

use sipline_sip_core::{Request, Response};

use crate::dialog::{DialogId, DialogState};
use crate::transaction::TransactionKey;

/// Notifications from a transaction to its owner.
///
/// For any one transaction, zero or more `Provisional` events are followed
/// by exactly one of `Success`, `Failure`, `Timeout`, or `TransportError`.
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    /// A 1xx response matched the transaction.
    Provisional { key: TransactionKey, response: Response },
    /// A 2xx final response matched the transaction.
    Success { key: TransactionKey, response: Response },
    /// A 3xx..6xx final response matched the transaction.
    Failure { key: TransactionKey, response: Response },
    /// No final response arrived inside the transaction deadline.
    Timeout { key: TransactionKey },
    /// The transport failed to carry the request. Same shape and channel
    /// as a failure response, so owners handle one failure path.
    TransportError { key: TransactionKey, reason: String },
}

impl TransactionEvent {
    /// The transaction this event belongs to.
    pub fn key(&self) -> &TransactionKey {
        match self {
            TransactionEvent::Provisional { key, .. }
            | TransactionEvent::Success { key, .. }
            | TransactionEvent::Failure { key, .. }
            | TransactionEvent::Timeout { key }
            | TransactionEvent::TransportError { key, .. } => key,
        }
    }

    /// Whether this event ends the transaction.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionEvent::Provisional { .. })
    }
}

/// Events from the transaction manager to the embedding application.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A request matched no transaction and created a new server
    /// transaction; the application decides the response.
    NewServerTransaction { key: TransactionKey, request: Request },
    /// The transport collaborator reported a terminated connection; all
    /// in-flight client transactions have been failed.
    TransportClosed { reason: String },
}

/// Dialog lifecycle notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DialogEvent {
    /// Dialog state changed.
    StateChanged {
        dialog_id: DialogId,
        old_state: DialogState,
        new_state: DialogState,
    },
    /// Dialog terminated.
    Terminated { dialog_id: DialogId, reason: String },
}
