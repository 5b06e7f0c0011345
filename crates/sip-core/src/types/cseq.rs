//! # CSeq Header
//!
//! Sequence number plus method
//! ([RFC 3261 Section 8.1.1.5](https://datatracker.ietf.org/doc/html/rfc3261#section-8.1.1.5)).
//! Part of both transaction identity (number + method) and dialog state
//! (per-direction counters).

use std::fmt;
use serde::{Deserialize, Serialize};

use super::method::Method;

/// A CSeq header value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CSeq {
    pub seq: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(seq: u32, method: Method) -> Self {
        CSeq { seq, method }
    }

    /// The next CSeq for a follow-up request with the same method.
    pub fn next(&self) -> Self {
        CSeq { seq: self.seq + 1, method: self.method.clone() }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seq, self.method)
    }
}
