//! Dialog identity.
//!
//! A dialog identifier is the triple {Call-ID, local tag, remote tag}. It
//! is complete only once both tags are known; until then the dialog has no
//! identifier and cannot be matched against inbound messages. Identifiers
//! are replaced, never edited: when a missing tag arrives, the dialog
//! computes a fresh identifier and re-registers under it.

use std::fmt;

use serde::{Deserialize, Serialize};

use sipline_sip_core::{Request, Response};

/// The immutable identity of one dialog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: String,
}

impl DialogId {
    pub fn new(
        call_id: impl Into<String>,
        local_tag: impl Into<String>,
        remote_tag: impl Into<String>,
    ) -> Self {
        DialogId {
            call_id: call_id.into(),
            local_tag: local_tag.into(),
            remote_tag: remote_tag.into(),
        }
    }

    /// Identity seen from the receiving (UAS) side of `request`: the
    /// sender's From tag is our remote tag. `None` until the To tag has
    /// been assigned.
    pub fn from_request(request: &Request) -> Option<Self> {
        let local_tag = request.to.tag.clone()?;
        let remote_tag = request.from.tag.clone()?;
        Some(DialogId::new(request.call_id.clone(), local_tag, remote_tag))
    }

    /// Identity seen from the sending (UAC) side: our From tag is the
    /// local tag, the peer's To tag is the remote tag.
    pub fn from_response(response: &Response) -> Option<Self> {
        let local_tag = response.from.tag.clone()?;
        let remote_tag = response.to.tag.clone()?;
        Some(DialogId::new(response.call_id.clone(), local_tag, remote_tag))
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.call_id, self.local_tag, self.remote_tag)
    }
}
