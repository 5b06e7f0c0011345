//! Dialog lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three lifecycle states of a dialog.
///
/// Transitions only move forward; `Terminated` is absorbing. A terminated
/// dialog ignores further updates rather than resurrecting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogState {
    /// A dialog-establishing provisional response has been seen, but no
    /// confirmation yet.
    Early,
    /// A 2xx (or equivalent confirmation) has been sent or received.
    Confirmed,
    /// Ended, by an explicit termination exchange or by a failure that
    /// invalidates the dialog.
    Terminated,
}

impl DialogState {
    /// Active dialogs are registered with the message matcher; terminated
    /// dialogs are not.
    pub fn is_active(&self) -> bool {
        matches!(self, DialogState::Early | DialogState::Confirmed)
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogState::Early => write!(f, "Early"),
            DialogState::Confirmed => write!(f, "Confirmed"),
            DialogState::Terminated => write!(f, "Terminated"),
        }
    }
}
