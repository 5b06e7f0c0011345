//! # Dialog Matching
//!
//! The map from [`DialogId`] to the channel of the dialog task that owns
//! it. A dialog is registered here exactly while it is active (Early or
//! Confirmed); in-dialog messages that match are forwarded to the owning
//! task, everything else falls through to transaction-level dispatch.
//!
//! When a dialog's identifier changes (a tag becomes known, or a fork),
//! [`DialogMatcher::rebind`] swaps the registration inside a single
//! critical section, so there is no window where the dialog is reachable
//! under both identifiers or neither.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use sipline_sip_core::Message;

use crate::dialog::DialogId;

/// Routes in-dialog messages to the task owning each dialog.
#[derive(Default)]
pub struct DialogMatcher {
    bindings: Mutex<HashMap<DialogId, mpsc::Sender<Message>>>,
}

impl DialogMatcher {
    pub fn new() -> Self {
        DialogMatcher::default()
    }

    /// Register a dialog under `id`. A previous binding under the same
    /// identifier is replaced.
    pub fn bind(&self, id: DialogId, sender: mpsc::Sender<Message>) {
        debug!(dialog_id = %id, "dialog bound");
        self.bindings.lock().insert(id, sender);
    }

    /// Atomically move a dialog's registration from `old` to `new`.
    pub fn rebind(&self, old: Option<&DialogId>, new: DialogId, sender: mpsc::Sender<Message>) {
        let mut bindings = self.bindings.lock();
        if let Some(old) = old {
            bindings.remove(old);
        }
        debug!(dialog_id = %new, "dialog rebound");
        bindings.insert(new, sender);
    }

    /// Remove a dialog's registration. No-op if not bound.
    pub fn unbind(&self, id: &DialogId) {
        if self.bindings.lock().remove(id).is_some() {
            debug!(dialog_id = %id, "dialog unbound");
        }
    }

    /// The channel of the dialog owning `id`, if one is registered.
    pub fn lookup(&self, id: &DialogId) -> Option<mpsc::Sender<Message>> {
        self.bindings.lock().get(id).cloned()
    }

    /// Match an inbound message against the registered dialogs and forward
    /// it to the owner. Returns whether a dialog claimed the message.
    pub async fn dispatch(&self, message: Message) -> bool {
        let id = match &message {
            Message::Request(request) => DialogId::from_request(request),
            Message::Response(response) => DialogId::from_response(response),
        };
        let Some(id) = id else { return false };
        let Some(sender) = self.lookup(&id) else { return false };
        if sender.send(message).await.is_err() {
            // Owner task is gone; drop the stale binding.
            self.unbind(&id);
            return false;
        }
        true
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }
}
