//! # Transaction Identity
//!
//! A transaction key is derived once from a message's already-parsed
//! header fields in O(1) and never changes afterwards. Two messages belong
//! to the same transaction iff their derived keys are equal — full value
//! equality, no partial or fuzzy matching.
//!
//! Client keys are {branch, CSeq number, method, Call-ID}; server keys add
//! the topmost Via sent-by, since different clients may pick colliding
//! branches. The role flag keeps the two spaces disjoint even when a stack
//! talks to itself.

use std::fmt;
use serde::{Deserialize, Serialize};

use sipline_sip_core::{Method, Request, Response};

/// Which side of the exchange this key identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionRole {
    Client,
    Server,
}

/// The immutable identity of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionKey {
    pub role: TransactionRole,
    pub branch: String,
    pub method: Method,
    pub call_id: String,
    pub cseq: u32,
    /// Topmost Via sent-by; only part of server-side identity.
    pub sent_by: Option<String>,
}

impl TransactionKey {
    /// Key of the client transaction that `request` starts.
    pub fn client(request: &Request) -> Self {
        TransactionKey {
            role: TransactionRole::Client,
            branch: request.via.branch.clone(),
            method: request.method.clone(),
            call_id: request.call_id.clone(),
            cseq: request.cseq.seq,
            sent_by: None,
        }
    }

    /// Key of the client transaction that `response` answers.
    pub fn from_response(response: &Response) -> Self {
        TransactionKey {
            role: TransactionRole::Client,
            branch: response.via.branch.clone(),
            method: response.cseq.method.clone(),
            call_id: response.call_id.clone(),
            cseq: response.cseq.seq,
            sent_by: None,
        }
    }

    /// Key of the server transaction that `request` matches.
    ///
    /// An ACK matches the INVITE server transaction it acknowledges
    /// (RFC 3261 Section 17.2.3), so its key carries the INVITE method.
    pub fn server(request: &Request) -> Self {
        let method = match request.method {
            Method::Ack => Method::Invite,
            ref m => m.clone(),
        };
        TransactionKey {
            role: TransactionRole::Server,
            branch: request.via.branch.clone(),
            method,
            call_id: request.call_id.clone(),
            cseq: request.cseq.seq,
            sent_by: Some(request.via.sent_by()),
        }
    }

}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            TransactionRole::Client => "uac",
            TransactionRole::Server => "uas",
        };
        write!(f, "{}:{}:{}:{}", role, self.method, self.cseq, self.branch)
    }
}
