//! # Digest Authentication Header Values
//!
//! The parsed forms of WWW-Authenticate / Proxy-Authenticate challenges and
//! the Authorization / Proxy-Authorization credentials that answer them
//! ([RFC 2617](https://datatracker.ietf.org/doc/html/rfc2617)).
//!
//! The credential rendering order is a wire-level compatibility contract:
//! parameters appear as {username, realm, nonce, uri, algorithm?, opaque?,
//! qop?, cnonce?, nc?, response}, with optional parameters included only
//! when applicable, in that relative order. `nc` always renders as an
//! 8-hex-digit zero-padded value.

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A digest challenge carried in a 401/407 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// "MD5" (default when absent) or "MD5-sess".
    pub algorithm: Option<String>,
    /// Offered quality of protection: "auth" or "auth-int".
    pub qop: Option<String>,
    pub stale: bool,
}

impl DigestChallenge {
    pub fn new(realm: impl Into<String>, nonce: impl Into<String>) -> Self {
        DigestChallenge {
            realm: realm.into(),
            nonce: nonce.into(),
            opaque: None,
            algorithm: None,
            qop: None,
            stale: false,
        }
    }

    pub fn with_qop(mut self, qop: impl Into<String>) -> Self {
        self.qop = Some(qop.into());
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    pub fn with_opaque(mut self, opaque: impl Into<String>) -> Self {
        self.opaque = Some(opaque.into());
        self
    }

    /// Parse the parameter list of a `Digest ...` header value.
    pub fn parse(value: &str) -> Result<Self, Error> {
        let params = value
            .strip_prefix("Digest ")
            .ok_or_else(|| Error::InvalidHeader {
                header: "WWW-Authenticate",
                message: format!("not a digest challenge: {value}"),
            })?;

        let mut challenge = DigestChallenge::new("", "");
        for param in params.split(',') {
            let Some((key, val)) = param.trim().split_once('=') else {
                continue;
            };
            let val = val.trim_matches('"').to_string();
            match key.trim() {
                "realm" => challenge.realm = val,
                "nonce" => challenge.nonce = val,
                "opaque" => challenge.opaque = Some(val),
                "algorithm" => challenge.algorithm = Some(val),
                "qop" => challenge.qop = Some(val),
                "stale" => challenge.stale = val.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        if challenge.realm.is_empty() || challenge.nonce.is_empty() {
            return Err(Error::InvalidHeader {
                header: "WWW-Authenticate",
                message: "digest challenge missing realm or nonce".to_string(),
            });
        }
        Ok(challenge)
    }
}

impl fmt::Display for DigestChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest realm=\"{}\", nonce=\"{}\"", self.realm, self.nonce)?;
        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{}\"", opaque)?;
        }
        if let Some(algorithm) = &self.algorithm {
            write!(f, ", algorithm={}", algorithm)?;
        }
        if let Some(qop) = &self.qop {
            write!(f, ", qop=\"{}\"", qop)?;
        }
        if self.stale {
            write!(f, ", stale=true")?;
        }
        Ok(())
    }
}

/// Digest credentials carried in an Authorization header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestCredentials {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub algorithm: Option<String>,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub cnonce: Option<String>,
    /// Nonce count; rendered zero-padded to 8 hex digits.
    pub nc: Option<u32>,
    /// The computed digest response, lower-case hex.
    pub response: String,
}

impl fmt::Display for DigestCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\"",
            self.username, self.realm, self.nonce, self.uri
        )?;
        if let Some(algorithm) = &self.algorithm {
            write!(f, ", algorithm={}", algorithm)?;
        }
        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{}\"", opaque)?;
        }
        if let Some(qop) = &self.qop {
            write!(f, ", qop={}", qop)?;
        }
        if let Some(cnonce) = &self.cnonce {
            write!(f, ", cnonce=\"{}\"", cnonce)?;
        }
        if let Some(nc) = self.nc {
            write!(f, ", nc={:08x}", nc)?;
        }
        write!(f, ", response=\"{}\"", self.response)
    }
}
