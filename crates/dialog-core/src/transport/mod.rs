//! # Transport Collaborator Interface
//!
//! The byte-framing and socket layer is out of scope for this crate; it is
//! consumed through this narrow interface. The collaborator delivers
//! complete, already-parsed [`Message`] values and accepts them back for
//! serialization and transmission.
//!
//! Sending is fire-and-forget from the caller's perspective: a send error
//! returned here is converted by the transaction layer into a
//! `TransactionEvent::TransportError` outcome, never propagated upward as
//! a fault.

use async_trait::async_trait;

use sipline_sip_core::Message;

pub mod mock;

pub use mock::MockTransport;

/// Errors a transport send can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport send failed: {0}")]
pub struct TransportError(pub String);

/// The sending half of the transport collaborator.
#[async_trait]
pub trait SipTransport: Send + Sync {
    /// Serialize and transmit one message.
    async fn send_message(&self, message: Message) -> Result<(), TransportError>;

    /// Whether the underlying transport retransmits on its own (TCP/TLS).
    /// Unreliable transports get retransmission timers from the
    /// transaction layer.
    fn is_reliable(&self) -> bool;
}

/// Inbound notifications from the transport collaborator.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A complete message arrived.
    MessageReceived(Message),
    /// One connection terminated (connection-oriented transports).
    ConnectionTerminated(String),
    /// The whole transport is gone.
    TransportTerminated(String),
}
