//! # SIP URI
//!
//! A reduced SIP/SIPS URI covering the subset of
//! [RFC 3261 Section 19.1](https://datatracker.ietf.org/doc/html/rfc3261#section-19.1)
//! this stack emits: scheme, optional user, host, optional port, optional
//! transport parameter. Anything beyond that belongs to the transport
//! collaborator, which receives fully parsed messages.
//!
//! The secure scheme matters to the registration client: when a contact is
//! derived from a `sips:` address-of-record or route, the remaining
//! registration traffic for that session is upgraded to `sips:` as well.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// URI scheme: plain or TLS-secured SIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Sip => f.write_str("sip"),
            Scheme::Sips => f.write_str("sips"),
        }
    }
}

/// A SIP or SIPS URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    /// `;transport=` parameter, when present.
    pub transport: Option<String>,
    /// `true` for the special wildcard contact `*` used by unregister-all.
    pub wildcard: bool,
}

impl Uri {
    /// A `sip:` URI with user and host.
    pub fn sip(user: impl Into<String>, host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: Some(user.into()),
            host: host.into(),
            port: None,
            transport: None,
            wildcard: false,
        }
    }

    /// A `sips:` URI with user and host.
    pub fn sips(user: impl Into<String>, host: impl Into<String>) -> Self {
        Uri { scheme: Scheme::Sips, ..Uri::sip(user, host) }
    }

    /// A host-only URI (registrar or route hop).
    pub fn domain(host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            host: host.into(),
            port: None,
            transport: None,
            wildcard: false,
        }
    }

    /// The wildcard contact `*` (only valid in REGISTER with Expires: 0).
    pub fn wildcard() -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            host: String::new(),
            port: None,
            transport: None,
            wildcard: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// Whether this URI uses the secure scheme.
    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Sips
    }

    /// Same URI with the scheme forced to `sips:`.
    pub fn into_secure(mut self) -> Self {
        self.scheme = Scheme::Sips;
        self
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            return f.write_str("*");
        }
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(transport) = &self.transport {
            write!(f, ";transport={}", transport)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Uri::wildcard());
        }
        let (scheme, rest) = if let Some(rest) = s.strip_prefix("sips:") {
            (Scheme::Sips, rest)
        } else if let Some(rest) = s.strip_prefix("sip:") {
            (Scheme::Sip, rest)
        } else {
            return Err(Error::InvalidUri(s.to_string()));
        };

        let (addr, params) = match rest.split_once(';') {
            Some((addr, params)) => (addr, Some(params)),
            None => (rest, None),
        };

        let (user, hostport) = match addr.split_once('@') {
            Some((user, hostport)) if !user.is_empty() => (Some(user.to_string()), hostport),
            Some(_) => return Err(Error::InvalidUri(s.to_string())),
            None => (None, addr),
        };

        let (host, port) = match hostport.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidUri(s.to_string()))?;
                (host.to_string(), Some(port))
            }
            None => (hostport.to_string(), None),
        };
        if host.is_empty() {
            return Err(Error::InvalidUri(s.to_string()));
        }

        let transport = params.and_then(|p| {
            p.split(';')
                .find_map(|kv| kv.strip_prefix("transport=").map(|v| v.to_string()))
        });

        Ok(Uri { scheme, user, host, port, transport, wildcard: false })
    }
}
