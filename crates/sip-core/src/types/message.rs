//! # Message Envelope
//!
//! Either direction of the wire, as delivered by the transport collaborator.

use serde::{Deserialize, Serialize};

use super::cseq::CSeq;
use super::method::Method;
use super::request::Request;
use super::response::Response;

/// A parsed SIP message, request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    /// Call-ID of either message kind.
    pub fn call_id(&self) -> &str {
        match self {
            Message::Request(r) => &r.call_id,
            Message::Response(r) => &r.call_id,
        }
    }

    /// CSeq of either message kind.
    pub fn cseq(&self) -> &CSeq {
        match self {
            Message::Request(r) => &r.cseq,
            Message::Response(r) => &r.cseq,
        }
    }

    /// Topmost Via branch of either message kind.
    pub fn branch(&self) -> &str {
        match self {
            Message::Request(r) => r.branch(),
            Message::Response(r) => r.branch(),
        }
    }

    /// The method this message belongs to (the CSeq method for responses).
    pub fn method(&self) -> &Method {
        match self {
            Message::Request(r) => &r.method,
            Message::Response(r) => &r.cseq.method,
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}
