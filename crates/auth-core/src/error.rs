//! Error types for sipline-auth-core.

use thiserror::Error;

/// Errors from digest computation setup.
///
/// The computation itself cannot fail; errors arise only when a challenge
/// does not carry what the computation needs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The challenge named an algorithm this engine does not implement.
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The challenge offered only qop values this engine does not implement.
    #[error("unsupported qop: {0}")]
    UnsupportedQop(String),

    /// The challenge was missing a required parameter.
    #[error("challenge missing {0}")]
    MissingParameter(&'static str),
}

/// Result type for auth-core operations.
pub type Result<T> = std::result::Result<T, AuthError>;
