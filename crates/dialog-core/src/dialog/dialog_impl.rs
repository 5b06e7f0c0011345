//! # Dialog
//!
//! The long-lived relationship spanning many transactions: who the peer
//! is, which tags identify the relationship, where in-dialog requests go
//! (remote target plus route set), and the sequence counters both sides
//! advance. One `Dialog` is owned by one task; mutation happens only
//! through that owner.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use sipline_sip_core::{
    Address, CSeq, Message, Method, Request, Response, Uri, Via,
};

use crate::errors::{DialogError, DialogResult};
use crate::events::DialogEvent;
use crate::routing::DialogMatcher;

use super::{DialogId, DialogState};

/// Dialog state shared by the plain and INVITE-specialized wrappers.
#[derive(Debug, Clone)]
pub struct Dialog {
    pub call_id: String,
    pub local_uri: Uri,
    pub remote_uri: Uri,
    pub local_tag: Option<String>,
    pub remote_tag: Option<String>,
    /// CSeq of the last request we sent in this dialog.
    pub local_cseq: u32,
    /// CSeq of the last request the peer sent in this dialog.
    pub remote_cseq: u32,
    /// Where in-dialog requests are addressed (peer Contact).
    pub remote_target: Option<Uri>,
    pub route_set: Vec<Uri>,
    pub secure: bool,
    /// Whether this side sent the dialog-establishing request.
    pub is_initiator: bool,
    pub state: DialogState,
}

impl Dialog {
    /// Dialog created on the receiving (UAS) side from a
    /// dialog-establishing request. The local tag is assigned here; the
    /// caller must reflect it in the To header of its responses.
    pub fn from_request(request: &Request) -> Self {
        Dialog {
            call_id: request.call_id.clone(),
            local_uri: request.to.uri.clone(),
            remote_uri: request.from.uri.clone(),
            local_tag: Some(Address::generate_tag()),
            remote_tag: request.from.tag.clone(),
            local_cseq: 0,
            remote_cseq: request.cseq.seq,
            remote_target: request.contact.as_ref().map(|c| c.uri.clone()),
            route_set: request.route_set.clone(),
            secure: request.uri.is_secure(),
            is_initiator: false,
            state: DialogState::Early,
        }
    }

    /// Dialog created on the sending (UAC) side once a dialog-establishing
    /// response arrives for `request`. Provisional responses open an early
    /// dialog; a 2xx opens it confirmed.
    pub fn from_response(request: &Request, response: &Response) -> Self {
        let state = if response.status.is_success() {
            DialogState::Confirmed
        } else {
            DialogState::Early
        };
        // Record-Route is stored top-to-bottom; the UAC routes in reverse.
        let route_set = response.record_routes.iter().rev().cloned().collect();
        Dialog {
            call_id: request.call_id.clone(),
            local_uri: request.from.uri.clone(),
            remote_uri: request.to.uri.clone(),
            local_tag: request.from.tag.clone(),
            remote_tag: response.to.tag.clone(),
            local_cseq: request.cseq.seq,
            remote_cseq: 0,
            remote_target: response.contact.as_ref().map(|c| c.uri.clone()),
            route_set,
            secure: request.uri.is_secure(),
            is_initiator: true,
            state,
        }
    }

    /// The dialog's current identifier, once both tags are known.
    pub fn current_id(&self) -> Option<DialogId> {
        Some(DialogId::new(
            self.call_id.clone(),
            self.local_tag.clone()?,
            self.remote_tag.clone()?,
        ))
    }

    /// Move to `Confirmed`, reporting the change. No-op when already
    /// confirmed or terminated.
    pub fn confirm(&mut self) -> Option<DialogEvent> {
        self.transition(DialogState::Confirmed)
    }

    /// Move to `Terminated`, reporting the change. Idempotent.
    pub fn terminate(&mut self) -> Option<DialogEvent> {
        self.transition(DialogState::Terminated)
    }

    pub fn is_terminated(&self) -> bool {
        self.state == DialogState::Terminated
    }

    /// Merge mutable dialog fields from an in-dialog message and keep the
    /// matcher registration consistent with the (possibly new) identifier.
    ///
    /// `is_client` says whether this side initiated the exchange carrying
    /// `message`. The rebind happens in one matcher critical section, so
    /// no inbound message can fall between deregistration and
    /// re-registration.
    pub fn update_dialog_info(
        &mut self,
        is_client: bool,
        message: &Message,
        matcher: &DialogMatcher,
        inbound: &mpsc::Sender<Message>,
    ) {
        if self.is_terminated() {
            warn!(call_id = %self.call_id, "update on terminated dialog ignored");
            return;
        }

        let old_id = self.current_id();

        match message {
            Message::Request(request) => {
                if request.cseq.seq > self.remote_cseq {
                    self.remote_cseq = request.cseq.seq;
                }
                if self.remote_tag.is_none() {
                    self.remote_tag = request.from.tag.clone();
                }
                if let Some(contact) = &request.contact {
                    self.remote_target = Some(contact.uri.clone());
                }
            }
            Message::Response(response) => {
                if is_client {
                    if self.remote_tag.is_none() {
                        self.remote_tag = response.to.tag.clone();
                    }
                    if let Some(contact) = &response.contact {
                        self.remote_target = Some(contact.uri.clone());
                    }
                    if !response.record_routes.is_empty() && self.route_set.is_empty() {
                        self.route_set =
                            response.record_routes.iter().rev().cloned().collect();
                    }
                }
            }
        }

        let new_id = self.current_id();
        if new_id != old_id {
            if let Some(new_id) = new_id {
                debug!(
                    old = ?old_id,
                    new = %new_id,
                    "dialog identifier changed, rebinding"
                );
                matcher.rebind(old_id.as_ref(), new_id, inbound.clone());
            }
        }
    }

    /// Next CSeq for a request we originate in this dialog.
    pub fn next_local_cseq(&mut self) -> u32 {
        self.local_cseq += 1;
        self.local_cseq
    }

    /// Build an in-dialog request addressed at the remote target, with a
    /// fresh branch and the next local CSeq.
    pub fn create_request(&mut self, method: Method, local_host: &str) -> DialogResult<Request> {
        if self.is_terminated() {
            return Err(DialogError::DialogTerminated);
        }
        let local_tag = self
            .local_tag
            .clone()
            .ok_or_else(|| DialogError::NotEstablished("local tag not assigned".into()))?;
        let remote_tag = self
            .remote_tag
            .clone()
            .ok_or_else(|| DialogError::NotEstablished("remote tag not known".into()))?;
        let target = self
            .remote_target
            .clone()
            .unwrap_or_else(|| self.remote_uri.clone());

        let seq = self.next_local_cseq();
        let transport = if self.secure { "TLS" } else { "UDP" };
        let request = Request::new(
            method.clone(),
            target,
            Via::new(transport, local_host, None, Via::generate_branch()),
            Address::new(self.local_uri.clone()).with_tag(local_tag),
            Address::new(self.remote_uri.clone()).with_tag(remote_tag),
            self.call_id.clone(),
            CSeq::new(seq, method),
        )
        .with_route_set(self.route_set.clone());
        Ok(request)
    }

    fn transition(&mut self, new_state: DialogState) -> Option<DialogEvent> {
        if self.state == new_state || self.is_terminated() {
            return None;
        }
        let old_state = self.state;
        self.state = new_state;
        debug!(call_id = %self.call_id, %old_state, %new_state, "dialog state changed");
        self.current_id().map(|dialog_id| DialogEvent::StateChanged {
            dialog_id,
            old_state,
            new_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipline_sip_core::StatusCode;

    fn invite() -> Request {
        Request::new(
            Method::Invite,
            Uri::sip("bob", "example.com"),
            Via::new("UDP", "client.example.com", Some(5060), Via::generate_branch()),
            Address::new(Uri::sip("alice", "example.com")).with_tag("from-tag"),
            Address::new(Uri::sip("bob", "example.com")),
            "call-1",
            CSeq::new(1, Method::Invite),
        )
        .with_contact(Address::new(Uri::sip("alice", "client.example.com")))
    }

    #[test]
    fn test_uac_dialog_from_provisional_is_early() {
        let request = invite();
        let response = Response::to_request(&request, StatusCode::RINGING).with_to_tag("to-tag");
        let dialog = Dialog::from_response(&request, &response);
        assert_eq!(dialog.state, DialogState::Early);
        assert!(dialog.is_initiator);
        assert_eq!(dialog.local_tag.as_deref(), Some("from-tag"));
        assert_eq!(dialog.remote_tag.as_deref(), Some("to-tag"));
    }

    #[test]
    fn test_uac_dialog_from_2xx_is_confirmed() {
        let request = invite();
        let response = Response::to_request(&request, StatusCode::OK).with_to_tag("to-tag");
        let dialog = Dialog::from_response(&request, &response);
        assert_eq!(dialog.state, DialogState::Confirmed);
        assert!(dialog.current_id().is_some());
    }

    #[test]
    fn test_uas_dialog_assigns_local_tag() {
        let dialog = Dialog::from_request(&invite());
        assert!(dialog.local_tag.is_some());
        assert_eq!(dialog.remote_tag.as_deref(), Some("from-tag"));
        assert!(!dialog.is_initiator);
    }

    #[test]
    fn test_termination_is_final() {
        let request = invite();
        let response = Response::to_request(&request, StatusCode::OK).with_to_tag("to-tag");
        let mut dialog = Dialog::from_response(&request, &response);
        assert!(dialog.terminate().is_some());
        // A second terminate and a confirm both bounce off.
        assert!(dialog.terminate().is_none());
        assert!(dialog.confirm().is_none());
        assert_eq!(dialog.state, DialogState::Terminated);
    }

    #[tokio::test]
    async fn test_update_on_terminated_dialog_is_noop() {
        let request = invite();
        let response = Response::to_request(&request, StatusCode::OK).with_to_tag("to-tag");
        let mut dialog = Dialog::from_response(&request, &response);
        dialog.terminate();

        let matcher = DialogMatcher::new();
        let (tx, _rx) = mpsc::channel(1);
        let before = dialog.clone();
        dialog.update_dialog_info(
            true,
            &Message::Response(response.with_contact(Address::new(Uri::sip(
                "bob",
                "server.example.com",
            )))),
            &matcher,
            &tx,
        );
        assert_eq!(dialog.remote_target, before.remote_target);
        assert_eq!(matcher.binding_count(), 0);
    }

    #[tokio::test]
    async fn test_late_tag_triggers_rebind() {
        let request = invite();
        // Provisional without a To tag: dialog has no identity yet.
        let provisional = Response::to_request(&request, StatusCode::TRYING);
        let mut dialog = Dialog::from_response(&request, &provisional);
        assert!(dialog.current_id().is_none());

        let matcher = DialogMatcher::new();
        let (tx, _rx) = mpsc::channel(1);
        let tagged = Response::to_request(&request, StatusCode::RINGING).with_to_tag("to-tag");
        dialog.update_dialog_info(true, &Message::Response(tagged), &matcher, &tx);

        let id = dialog.current_id().unwrap();
        assert_eq!(id.remote_tag, "to-tag");
        assert!(matcher.lookup(&id).is_some());
    }

    #[test]
    fn test_in_dialog_request_advances_cseq() {
        let request = invite();
        let response = Response::to_request(&request, StatusCode::OK).with_to_tag("to-tag");
        let mut dialog = Dialog::from_response(&request, &response);

        let bye = dialog.create_request(Method::Bye, "client.example.com").unwrap();
        assert_eq!(bye.cseq.seq, 2);
        assert_eq!(bye.call_id, "call-1");
        assert_eq!(bye.from.tag(), Some("from-tag"));
        assert_eq!(bye.to.tag(), Some("to-tag"));

        let second = dialog.create_request(Method::Notify, "client.example.com").unwrap();
        assert_eq!(second.cseq.seq, 3);
        assert_ne!(second.via.branch, bye.via.branch);
    }

    #[test]
    fn test_create_request_requires_established_dialog() {
        let mut dialog = Dialog::from_request(&invite());
        // UAS dialog has both tags, so requests work.
        assert!(dialog.create_request(Method::Bye, "server.example.com").is_ok());

        dialog.terminate();
        assert_eq!(
            dialog.create_request(Method::Bye, "server.example.com"),
            Err(DialogError::DialogTerminated)
        );
    }
}
