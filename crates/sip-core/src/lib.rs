//! # sipline-sip-core
//!
//! Message data model for the sipline SIP signaling stack.
//!
//! This crate holds the already-parsed form of the messages the rest of the
//! stack works with: requests, responses, and the identity-bearing header
//! types (Call-ID, CSeq, Via branch, To/From tags) that transaction and
//! dialog matching are computed from.
//!
//! Byte-level framing and parsing are deliberately absent. The transport
//! collaborator is assumed to deliver complete [`Message`] values and to
//! accept them back for serialization; this crate only guarantees that
//! whatever it renders with `Display` is what the digest and matching
//! layers computed over.
//!
//! ## Layout
//!
//! - [`types::method`] / [`types::status`]: request methods and response codes
//! - [`types::uri`] / [`types::address`]: SIP/SIPS URIs and tagged addresses
//! - [`types::via`] / [`types::cseq`]: per-transaction identity material
//! - [`types::auth`]: digest challenge and credential header values
//! - [`types::request`] / [`types::response`] / [`types::message`]: the
//!   message envelopes themselves

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::address::Address;
pub use types::auth::{DigestChallenge, DigestCredentials};
pub use types::cseq::CSeq;
pub use types::message::Message;
pub use types::method::Method;
pub use types::request::Request;
pub use types::response::Response;
pub use types::status::StatusCode;
pub use types::uri::{Scheme, Uri};
pub use types::via::Via;

/// Commonly used imports for working with SIP messages.
pub mod prelude {
    pub use crate::types::address::Address;
    pub use crate::types::auth::{DigestChallenge, DigestCredentials};
    pub use crate::types::cseq::CSeq;
    pub use crate::types::message::Message;
    pub use crate::types::method::Method;
    pub use crate::types::request::Request;
    pub use crate::types::response::Response;
    pub use crate::types::status::StatusCode;
    pub use crate::types::uri::{Scheme, Uri};
    pub use crate::types::via::Via;
    pub use crate::{Error, Result};
}
