//! # SIP Response Status Code
//!
//! Status codes as defined in [RFC 3261 Section 7.2](https://datatracker.ietf.org/doc/html/rfc3261#section-7.2).
//!
//! The transaction layer cares only about the class of a code (provisional,
//! success, failure) and about the two authentication-challenge codes, so
//! this type keeps the raw number and derives everything else from it.

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A SIP response status code (100..=699).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const TRYING: StatusCode = StatusCode(100);
    pub const RINGING: StatusCode = StatusCode(180);
    pub const SESSION_PROGRESS: StatusCode = StatusCode(183);
    pub const OK: StatusCode = StatusCode(200);
    pub const ACCEPTED: StatusCode = StatusCode(202);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const PROXY_AUTHENTICATION_REQUIRED: StatusCode = StatusCode(407);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const INTERVAL_TOO_BRIEF: StatusCode = StatusCode(423);
    pub const BUSY_HERE: StatusCode = StatusCode(486);
    pub const REQUEST_TERMINATED: StatusCode = StatusCode(487);
    pub const SERVER_INTERNAL_ERROR: StatusCode = StatusCode(500);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);
    pub const DECLINE: StatusCode = StatusCode(603);

    /// Build a status code, rejecting values outside 100..=699.
    pub fn new(code: u16) -> Result<Self, Error> {
        if (100..=699).contains(&code) {
            Ok(StatusCode(code))
        } else {
            Err(Error::InvalidStatusCode(code))
        }
    }

    /// The raw numeric code.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// 1xx: the request is still in flight.
    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.0)
    }

    /// 2xx: the request succeeded.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// 3xx..6xx: a final non-success response.
    pub fn is_failure(&self) -> bool {
        self.0 >= 300
    }

    /// Any final response (success or failure).
    pub fn is_final(&self) -> bool {
        self.0 >= 200
    }

    /// 401 Unauthorized or 407 Proxy Authentication Required.
    pub fn is_auth_challenge(&self) -> bool {
        self.0 == 401 || self.0 == 407
    }

    /// Canonical reason phrase for codes this stack emits.
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Trying",
            180 => "Ringing",
            183 => "Session Progress",
            200 => "OK",
            202 => "Accepted",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            423 => "Interval Too Brief",
            481 => "Call/Transaction Does Not Exist",
            486 => "Busy Here",
            487 => "Request Terminated",
            500 => "Server Internal Error",
            503 => "Service Unavailable",
            603 => "Decline",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}
