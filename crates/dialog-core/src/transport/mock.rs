//! In-memory transport for tests and examples.
//!
//! Captures every sent message on an mpsc channel so a test can play the
//! registrar/peer role, and can be switched into a failing mode to
//! exercise the transport-error outcome.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use sipline_sip_core::Message;

use super::{SipTransport, TransportError};

/// A channel-backed transport double.
pub struct MockTransport {
    sent_tx: mpsc::UnboundedSender<Message>,
    reliable: bool,
    failing: AtomicBool,
}

impl MockTransport {
    /// Build a mock plus the receiver a test reads sent messages from.
    pub fn new(reliable: bool) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        (
            MockTransport { sent_tx, reliable, failing: AtomicBool::new(false) },
            sent_rx,
        )
    }

    /// Make every subsequent send fail.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SipTransport for MockTransport {
    async fn send_message(&self, message: Message) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError("mock transport set to fail".to_string()));
        }
        self.sent_tx
            .send(message)
            .map_err(|_| TransportError("mock receiver dropped".to_string()))
    }

    fn is_reliable(&self) -> bool {
        self.reliable
    }
}
