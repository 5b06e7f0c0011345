//! # SIP Request Method
//!
//! Request methods as defined in [RFC 3261 Section 7.1](https://datatracker.ietf.org/doc/html/rfc3261#section-7.1)
//! plus the extension methods this stack sends in-dialog (REFER, NOTIFY).
//!
//! The method participates in transaction identity: a response matches a
//! client transaction only if its CSeq method equals the request's method.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A SIP request method.
///
/// Methods not known to this stack are carried verbatim in
/// [`Method::Extension`] so matching still works on the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Session establishment
    Invite,
    /// Final-response acknowledgement for INVITE
    Ack,
    /// Session termination
    Bye,
    /// Pending-request cancellation
    Cancel,
    /// Contact binding registration
    Register,
    /// Capability query
    Options,
    /// Call transfer (RFC 3515)
    Refer,
    /// Event notification (RFC 6665)
    Notify,
    /// Event subscription (RFC 6665)
    Subscribe,
    /// Instant message (RFC 3428)
    Message,
    /// Mid-session information
    Info,
    /// Session parameter update (RFC 3311)
    Update,
    /// Any other method token
    Extension(String),
}

impl Method {
    /// Canonical upper-case token for this method.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Refer => "REFER",
            Method::Notify => "NOTIFY",
            Method::Subscribe => "SUBSCRIBE",
            Method::Message => "MESSAGE",
            Method::Info => "INFO",
            Method::Update => "UPDATE",
            Method::Extension(s) => s,
        }
    }

    /// Whether this method starts an INVITE-class transaction
    /// (distinct timer profile and ACK handling).
    pub fn is_invite(&self) -> bool {
        matches!(self, Method::Invite)
    }

    /// Whether a success response to this method establishes a dialog.
    pub fn creates_dialog(&self) -> bool {
        matches!(self, Method::Invite | Method::Subscribe | Method::Refer)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains(|c: char| c.is_whitespace()) {
            return Err(Error::InvalidMethod(s.to_string()));
        }
        Ok(match s {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "REGISTER" => Method::Register,
            "OPTIONS" => Method::Options,
            "REFER" => Method::Refer,
            "NOTIFY" => Method::Notify,
            "SUBSCRIBE" => Method::Subscribe,
            "MESSAGE" => Method::Message,
            "INFO" => Method::Info,
            "UPDATE" => Method::Update,
            other => Method::Extension(other.to_string()),
        })
    }
}
