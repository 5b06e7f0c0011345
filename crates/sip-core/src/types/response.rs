//! # SIP Response
//!
//! The already-parsed form of a response. Carries the request's identity
//! material back (Via branch, CSeq, Call-ID) plus the fields the dialog and
//! registration layers read: To-tag, Contact, Record-Route set, Expires,
//! challenge, and next-nonce.

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::auth::DigestChallenge;
use super::cseq::CSeq;
use super::request::Request;
use super::status::StatusCode;
use super::uri::Uri;
use super::via::Via;

/// A parsed SIP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    /// Topmost Via, copied from the request.
    pub via: Via,
    pub from: Address,
    pub to: Address,
    pub call_id: String,
    pub cseq: CSeq,
    pub contact: Option<Address>,
    pub expires: Option<u32>,
    /// Record-Route set in header order (topmost first).
    pub record_routes: Vec<Uri>,
    /// WWW-Authenticate / Proxy-Authenticate challenge on 401/407.
    pub challenge: Option<DigestChallenge>,
    /// `nextnonce` from Authentication-Info, when the server supplied one.
    pub next_nonce: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Build a response to `request`, reflecting its identity headers
    /// (Via, From, To, Call-ID, CSeq) the way a UAS would.
    pub fn to_request(request: &Request, status: StatusCode) -> Self {
        Response {
            status,
            via: request.via.clone(),
            from: request.from.clone(),
            to: request.to.clone(),
            call_id: request.call_id.clone(),
            cseq: request.cseq.clone(),
            contact: None,
            expires: None,
            record_routes: Vec::new(),
            challenge: None,
            next_nonce: None,
            body: Vec::new(),
        }
    }

    pub fn with_to_tag(mut self, tag: impl Into<String>) -> Self {
        self.to.set_tag(tag);
        self
    }

    pub fn with_contact(mut self, contact: Address) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn with_expires(mut self, expires: u32) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_challenge(mut self, challenge: DigestChallenge) -> Self {
        self.challenge = Some(challenge);
        self
    }

    pub fn with_next_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.next_nonce = Some(nonce.into());
        self
    }

    /// The branch of the topmost Via (client-side matching material).
    pub fn branch(&self) -> &str {
        &self.via.branch
    }
}
