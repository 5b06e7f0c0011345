//! # Tagged Address
//!
//! The To/From header value: an optional display name, a URI, and an
//! optional `tag` parameter
//! ([RFC 3261 Section 8.1.1.2](https://datatracker.ietf.org/doc/html/rfc3261#section-8.1.1.2)).
//!
//! Tags are the dialog-leg identifiers. Each side assigns its own tag, and
//! the pair (plus Call-ID) forms the dialog identifier, so this type is
//! where half of the dialog-matching material lives.

use std::fmt;
use serde::{Deserialize, Serialize};

use super::uri::Uri;

/// A To/From/Contact address with an optional dialog tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub tag: Option<String>,
}

impl Address {
    pub fn new(uri: Uri) -> Self {
        Address { display_name: None, uri, tag: None }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The dialog tag, if assigned.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    /// Generate a fresh opaque tag (8 hex digits).
    pub fn generate_tag() -> String {
        format!("{:08x}", rand::random::<u32>())
    }

    /// Same address with the URI scheme forced to `sips:`.
    pub fn into_secure(mut self) -> Self {
        self.uri = self.uri.into_secure();
        self
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "\"{}\" <{}>", name, self.uri)?,
            None => write!(f, "<{}>", self.uri)?,
        }
        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }
        Ok(())
    }
}
