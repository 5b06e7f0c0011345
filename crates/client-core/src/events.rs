//! Registration outcome notifications.

use serde::{Deserialize, Serialize};

use sipline_sip_core::Uri;

/// Reported to the listener after every registration cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationEvent {
    /// The registrar accepted the binding.
    Success {
        target: Uri,
        contact: Uri,
        /// Lifetime the registrar granted, in seconds.
        expires_granted: u32,
        /// Locally scheduled renewal interval in seconds; 0 when no
        /// renewal was scheduled.
        renew_scheduled: u32,
        /// Reason phrase of the accepting response.
        reason: String,
    },
    /// The cycle ended without an accepted binding.
    Failure {
        target: Uri,
        contact: Uri,
        reason: String,
    },
}

impl RegistrationEvent {
    pub fn is_success(&self) -> bool {
        matches!(self, RegistrationEvent::Success { .. })
    }
}
