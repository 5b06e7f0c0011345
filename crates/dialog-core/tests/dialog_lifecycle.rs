//! Dialog-level behavior over the transaction layer: establishment from
//! both perspectives, in-dialog requests, challenge retry, and
//! termination.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use sipline_auth_core::Credentials;
use sipline_dialog_core::transport::MockTransport;
use sipline_dialog_core::{
    DialogCapabilities, DialogError, DialogEvent, InviteDialog, TimerSettings, TransactionEvent,
    TransactionManager,
};
use sipline_sip_core::prelude::*;

fn invite() -> Request {
    Request::new(
        Method::Invite,
        Uri::sip("bob", "example.com"),
        Via::new("UDP", "client.example.com", Some(5060), Via::generate_branch()),
        Address::new(Uri::sip("alice", "example.com")).with_tag("alice-tag"),
        Address::new(Uri::sip("bob", "example.com")),
        Request::generate_call_id(),
        CSeq::new(1, Method::Invite),
    )
    .with_contact(Address::new(Uri::sip("alice", "client.example.com")))
}

struct Fixture {
    manager: Arc<TransactionManager>,
    matcher: Arc<sipline_dialog_core::DialogMatcher>,
    sent: mpsc::UnboundedReceiver<Message>,
    events_rx: mpsc::Receiver<DialogEvent>,
    events_tx: mpsc::Sender<DialogEvent>,
}

fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (transport, sent) = MockTransport::new(true);
    let (manager, _dispatch) = TransactionManager::new(Arc::new(transport), TimerSettings::fast());
    let (events_tx, events_rx) = mpsc::channel(16);
    Fixture {
        manager,
        matcher: Arc::new(sipline_dialog_core::DialogMatcher::new()),
        sent,
        events_rx,
        events_tx,
    }
}

async fn next_sent_request(sent: &mut mpsc::UnboundedReceiver<Message>) -> Request {
    match tokio::time::timeout(Duration::from_secs(2), sent.recv()).await {
        Ok(Some(Message::Request(request))) => request,
        other => panic!("expected a request on the wire, got {other:?}"),
    }
}

#[tokio::test]
async fn uac_dialog_binds_and_bye_terminates() {
    let mut fx = fixture();
    let request = invite();
    let response = Response::to_request(&request, StatusCode::OK)
        .with_to_tag("bob-tag")
        .with_contact(Address::new(Uri::sip("bob", "server.example.com")));

    let (mut dialog, _inbound) = InviteDialog::new_uac(
        &request,
        &response,
        DialogCapabilities::default(),
        None,
        Arc::clone(&fx.manager),
        Arc::clone(&fx.matcher),
        fx.events_tx.clone(),
        "client.example.com",
    );

    let id = dialog.id().unwrap();
    assert!(fx.matcher.lookup(&id).is_some());

    let bye_task = tokio::spawn(async move {
        let outcome = dialog.bye().await;
        (dialog, outcome)
    });

    let bye = next_sent_request(&mut fx.sent).await;
    assert_eq!(bye.method, Method::Bye);
    assert_eq!(bye.cseq.seq, 2);
    // In-dialog requests go to the peer's contact.
    assert_eq!(bye.uri.host, "server.example.com");
    fx.manager
        .handle_message(Message::Response(Response::to_request(&bye, StatusCode::OK)))
        .await;

    let (dialog, outcome) = bye_task.await.unwrap();
    assert!(matches!(outcome.unwrap(), TransactionEvent::Success { .. }));
    assert!(dialog.dialog().is_terminated());
    assert!(fx.matcher.lookup(&id).is_none());
    assert!(matches!(
        fx.events_rx.recv().await.unwrap(),
        DialogEvent::Terminated { .. }
    ));
}

#[tokio::test]
async fn in_dialog_challenge_is_answered_once() {
    let mut fx = fixture();
    let request = invite();
    let response = Response::to_request(&request, StatusCode::OK).with_to_tag("bob-tag");

    let (mut dialog, _inbound) = InviteDialog::new_uac(
        &request,
        &response,
        DialogCapabilities { handle_challenges: true, extra_methods: vec![Method::Refer] },
        Some((Credentials::new("alice", "example.com", "secret"), 3)),
        Arc::clone(&fx.manager),
        Arc::clone(&fx.matcher),
        fx.events_tx.clone(),
        "client.example.com",
    );

    let manager = Arc::clone(&fx.manager);
    let refer_task =
        tokio::spawn(async move { (dialog.refer("sip:carol@example.com").await, dialog) });

    let first = next_sent_request(&mut fx.sent).await;
    assert_eq!(first.method, Method::Refer);
    assert!(first.authorization.is_none());
    let challenge = Response::to_request(&first, StatusCode::UNAUTHORIZED)
        .with_challenge(DigestChallenge::new("example.com", "nonce-1").with_qop("auth"));
    manager.handle_message(Message::Response(challenge)).await;

    // The retry is a new transaction: bumped CSeq, fresh branch,
    // computed credentials.
    let second = next_sent_request(&mut fx.sent).await;
    assert_eq!(second.method, Method::Refer);
    assert_eq!(second.cseq.seq, first.cseq.seq + 1);
    assert_ne!(second.via.branch, first.via.branch);
    let auth = second.authorization.clone().unwrap();
    assert_eq!(auth.realm, "example.com");
    assert_eq!(auth.qop.as_deref(), Some("auth"));
    manager
        .handle_message(Message::Response(Response::to_request(&second, StatusCode::ACCEPTED)))
        .await;

    let (outcome, _dialog) = refer_task.await.unwrap();
    assert!(matches!(outcome.unwrap(), TransactionEvent::Success { .. }));
}

#[tokio::test]
async fn realm_mismatch_fails_in_dialog_request() {
    let mut fx = fixture();
    let request = invite();
    let response = Response::to_request(&request, StatusCode::OK).with_to_tag("bob-tag");

    let (mut dialog, _inbound) = InviteDialog::new_uac(
        &request,
        &response,
        DialogCapabilities { handle_challenges: true, extra_methods: vec![Method::Notify] },
        Some((Credentials::new("alice", "example.com", "secret"), 3)),
        Arc::clone(&fx.manager),
        Arc::clone(&fx.matcher),
        fx.events_tx.clone(),
        "client.example.com",
    );

    let manager = Arc::clone(&fx.manager);
    let notify_task = tokio::spawn(async move { dialog.notify(b"status".to_vec()).await });

    let wire = next_sent_request(&mut fx.sent).await;
    let challenge = Response::to_request(&wire, StatusCode::UNAUTHORIZED)
        .with_challenge(DigestChallenge::new("elsewhere.org", "nonce-1"));
    manager.handle_message(Message::Response(challenge)).await;

    let err = notify_task.await.unwrap().unwrap_err();
    assert!(matches!(err, DialogError::AuthRetryRefused(_)));
}

#[tokio::test]
async fn disabled_method_is_refused_locally() {
    let fx = fixture();
    let request = invite();
    let response = Response::to_request(&request, StatusCode::OK).with_to_tag("bob-tag");

    let (mut dialog, _inbound) = InviteDialog::new_uac(
        &request,
        &response,
        DialogCapabilities::default(),
        None,
        Arc::clone(&fx.manager),
        Arc::clone(&fx.matcher),
        fx.events_tx.clone(),
        "client.example.com",
    );

    let err = dialog.refer("sip:carol@example.com").await.unwrap_err();
    assert!(matches!(err, DialogError::ProtocolError(_)));
    // Nothing reached the wire.
    assert_eq!(fx.manager.transaction_count(), 0);
}

#[tokio::test]
async fn inbound_bye_is_answered_and_terminates() {
    let mut fx = fixture();
    let request = invite();

    let (mut dialog, _inbound) = InviteDialog::new_uas(
        &request,
        DialogCapabilities::default(),
        None,
        Arc::clone(&fx.manager),
        Arc::clone(&fx.matcher),
        fx.events_tx.clone(),
        "server.example.com",
    );
    dialog.confirm().await;
    let local_tag = dialog.dialog().local_tag.clone().unwrap();

    // Peer sends BYE inside the dialog.
    let mut bye = Request::new(
        Method::Bye,
        Uri::sip("bob", "server.example.com"),
        Via::new("UDP", "client.example.com", Some(5060), Via::generate_branch()),
        request.from.clone(),
        request.to.clone().with_tag(local_tag),
        request.call_id.clone(),
        CSeq::new(2, Method::Bye),
    );
    bye.contact = request.contact.clone();
    fx.manager.handle_message(Message::Request(bye.clone())).await;
    dialog.handle_message(Message::Request(bye)).await.unwrap();

    let Some(Message::Response(answer)) = fx.sent.recv().await else {
        panic!("expected the BYE answer");
    };
    assert_eq!(answer.status, StatusCode::OK);
    assert!(dialog.dialog().is_terminated());

    // Further updates bounce off the terminated dialog.
    assert!(matches!(
        dialog.bye().await.unwrap_err(),
        DialogError::DialogTerminated
    ));
}
