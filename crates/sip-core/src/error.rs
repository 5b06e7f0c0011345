//! Error types for sipline-sip-core.

use thiserror::Error;

/// Errors produced while constructing or interpreting message values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A URI string did not match the subset of syntax this stack emits.
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// A method token was empty or contained separator characters.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// A status code outside the 100..=699 range.
    #[error("invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// A header value was present but malformed for its type.
    #[error("invalid header value for {header}: {message}")]
    InvalidHeader { header: &'static str, message: String },
}

/// Result type for sip-core operations.
pub type Result<T> = std::result::Result<T, Error>;
