//! Typed header and message values.

pub mod address;
pub mod auth;
pub mod cseq;
pub mod message;
pub mod method;
pub mod request;
pub mod response;
pub mod status;
pub mod uri;
pub mod via;
