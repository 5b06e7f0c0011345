//! # SIP Request
//!
//! The already-parsed form of a request. Header fields that matter to
//! transaction/dialog matching and to the registration workflow are typed;
//! everything else travels opaquely in `body`.

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::auth::DigestCredentials;
use super::cseq::CSeq;
use super::method::Method;
use super::uri::Uri;
use super::via::Via;

/// A parsed SIP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    /// Request-URI.
    pub uri: Uri,
    /// Topmost Via (the one this stack added or must answer through).
    pub via: Via,
    pub from: Address,
    pub to: Address,
    pub call_id: String,
    pub cseq: CSeq,
    pub contact: Option<Address>,
    /// Expires header, when present (REGISTER, SUBSCRIBE).
    pub expires: Option<u32>,
    /// Route set to traverse, nearest hop first.
    pub route_set: Vec<Uri>,
    /// Authorization / Proxy-Authorization credentials, when attached.
    pub authorization: Option<DigestCredentials>,
    pub body: Vec<u8>,
}

impl Request {
    /// A request with the mandatory header set; optional headers default empty.
    pub fn new(
        method: Method,
        uri: Uri,
        via: Via,
        from: Address,
        to: Address,
        call_id: impl Into<String>,
        cseq: CSeq,
    ) -> Self {
        Request {
            method,
            uri,
            via,
            from,
            to,
            call_id: call_id.into(),
            cseq,
            contact: None,
            expires: None,
            route_set: Vec::new(),
            authorization: None,
            body: Vec::new(),
        }
    }

    pub fn with_contact(mut self, contact: Address) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn with_expires(mut self, expires: u32) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_route_set(mut self, route_set: Vec<Uri>) -> Self {
        self.route_set = route_set;
        self
    }

    pub fn with_authorization(mut self, credentials: DigestCredentials) -> Self {
        self.authorization = Some(credentials);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// The branch of the topmost Via.
    pub fn branch(&self) -> &str {
        &self.via.branch
    }

    /// Fresh Call-ID value for a new standalone request.
    pub fn generate_call_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
