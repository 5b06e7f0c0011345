//! # Via Header
//!
//! The topmost Via header value
//! ([RFC 3261 Section 8.1.1.7](https://datatracker.ietf.org/doc/html/rfc3261#section-8.1.1.7)):
//! transport, sent-by host/port, and the branch parameter.
//!
//! The branch is the per-transaction opaque token. Every branch this stack
//! generates starts with the RFC 3261 magic cookie `z9hG4bK`, which is what
//! lets the server side match purely on branch + sent-by.

use std::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Magic cookie prefixing every RFC 3261 branch value.
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// A single Via header value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Via {
    /// Transport token as it appears on the wire ("UDP", "TCP", "TLS").
    pub transport: String,
    pub sent_by_host: String,
    pub sent_by_port: Option<u16>,
    pub branch: String,
}

impl Via {
    pub fn new(
        transport: impl Into<String>,
        sent_by_host: impl Into<String>,
        sent_by_port: Option<u16>,
        branch: impl Into<String>,
    ) -> Self {
        Via {
            transport: transport.into(),
            sent_by_host: sent_by_host.into(),
            sent_by_port,
            branch: branch.into(),
        }
    }

    /// Generate a fresh branch token with the magic cookie prefix.
    pub fn generate_branch() -> String {
        format!("{}{}", BRANCH_MAGIC_COOKIE, Uuid::new_v4().simple())
    }

    /// `host` or `host:port` as used in server-side transaction keys.
    pub fn sent_by(&self) -> String {
        match self.sent_by_port {
            Some(port) => format!("{}:{}", self.sent_by_host, port),
            None => self.sent_by_host.clone(),
        }
    }

    /// Whether the branch carries the RFC 3261 magic cookie.
    pub fn has_magic_cookie(&self) -> bool {
        self.branch.starts_with(BRANCH_MAGIC_COOKIE)
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}", self.transport, self.sent_by())?;
        write!(f, ";branch={}", self.branch)
    }
}
