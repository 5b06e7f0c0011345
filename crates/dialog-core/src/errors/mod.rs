//! Error types for sipline-dialog-core.
//!
//! Recoverable protocol conditions (timeouts, challenge rounds, transport
//! send errors) never appear here: they are absorbed by the components and
//! converted into event outcomes. These errors are for misuse of the API
//! and for the few operations that can legitimately refuse.

use thiserror::Error;

use crate::transaction::TransactionKey;

/// Errors surfaced by the dialog and transaction layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// An operation referenced a transaction that is not in flight.
    #[error("no such transaction: {0}")]
    TransactionNotFound(TransactionKey),

    /// A second live transaction was requested under an existing key.
    #[error("transaction already exists: {0}")]
    TransactionExists(TransactionKey),

    /// A message was missing a field the operation requires.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The dialog has already terminated; the operation cannot proceed.
    #[error("dialog is terminated")]
    DialogTerminated,

    /// The dialog does not yet have the identity the operation requires.
    #[error("dialog not established: {0}")]
    NotEstablished(String),

    /// A challenge round was refused (realm mismatch or attempt bound).
    #[error("authentication retry refused: {0}")]
    AuthRetryRefused(String),
}

impl DialogError {
    pub fn protocol_error(message: impl Into<String>) -> Self {
        DialogError::ProtocolError(message.into())
    }
}

/// Result type for dialog-core operations.
pub type DialogResult<T> = Result<T, DialogError>;
