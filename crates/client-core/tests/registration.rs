//! Registration client behavior against a scripted registrar played by
//! the test over the mock transport. Tests run on the paused tokio clock
//! so renewal and backoff intervals elapse instantly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use sipline_auth_core::{check_response, Credentials, DigestInput, Qop};
use sipline_client_core::{RegistrationClient, RegistrationConfig, RegistrationEvent};
use sipline_dialog_core::transport::MockTransport;
use sipline_dialog_core::{TimerManager, TimerSettings, TransactionManager};
use sipline_sip_core::prelude::*;

struct Registrar {
    transactions: Arc<TransactionManager>,
    wire: mpsc::UnboundedReceiver<Message>,
}

impl Registrar {
    async fn recv_register(&mut self) -> Request {
        let message = tokio::time::timeout(Duration::from_secs(60), self.wire.recv())
            .await
            .expect("timed out waiting for a REGISTER")
            .expect("wire closed");
        match message {
            Message::Request(request) => {
                assert_eq!(request.method, Method::Register);
                request
            }
            Message::Response(response) => panic!("unexpected response on the wire: {response:?}"),
        }
    }

    async fn nothing_for(&mut self, window: Duration) {
        match tokio::time::timeout(window, self.wire.recv()).await {
            Err(_) => {}
            Ok(message) => panic!("expected silence on the wire, got {message:?}"),
        }
    }

    async fn answer(&self, response: Response) {
        self.transactions
            .handle_message(Message::Response(response))
            .await;
    }
}

fn harness(config: RegistrationConfig) -> (RegistrationClient, mpsc::Receiver<RegistrationEvent>, Registrar) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (transport, wire) = MockTransport::new(true);
    let (transactions, _dispatch) =
        TransactionManager::new(Arc::new(transport), TimerSettings::fast());
    let (client, events) =
        RegistrationClient::new(config, Arc::clone(&transactions), TimerManager::new());
    (client, events, Registrar { transactions, wire })
}

fn base_config() -> RegistrationConfig {
    RegistrationConfig::new(
        Uri::domain("example.com"),
        Uri::sip("alice", "example.com"),
        Uri::sip("alice", "client.example.com"),
    )
    .with_local_host("client.example.com")
    .with_backoff(Duration::from_secs(1), Duration::from_secs(4))
}

fn creds() -> Credentials {
    Credentials::new("alice", "example.com", "secret")
}

#[tokio::test(start_paused = true)]
async fn register_success_schedules_renewal() {
    let config = base_config().with_renew_time(600);
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    let first = registrar.recv_register().await;
    assert_eq!(first.expires, Some(3600));
    assert_eq!(first.cseq.seq, 1);
    assert!(first.contact.is_some());
    registrar
        .answer(Response::to_request(&first, StatusCode::OK).with_expires(3600))
        .await;

    match events.recv().await.unwrap() {
        RegistrationEvent::Success { expires_granted, renew_scheduled, .. } => {
            assert_eq!(expires_granted, 3600);
            // Renewal runs at the configured cap, not the full grant.
            assert_eq!(renew_scheduled, 600);
        }
        other => panic!("expected success, got {other:?}"),
    }

    // The renewal arrives on schedule, same Call-ID, bumped CSeq, new branch.
    let renewal = registrar.recv_register().await;
    assert_eq!(renewal.call_id, first.call_id);
    assert_eq!(renewal.from.tag(), first.from.tag());
    assert_eq!(renewal.cseq.seq, 2);
    assert_ne!(renewal.via.branch, first.via.branch);
}

#[tokio::test(start_paused = true)]
async fn challenge_is_answered_with_valid_digest() {
    let config = base_config().with_credentials(creds()).with_loop_enabled(false);
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    let first = registrar.recv_register().await;
    assert!(first.authorization.is_none());

    registrar
        .answer(
            Response::to_request(&first, StatusCode::UNAUTHORIZED).with_challenge(
                DigestChallenge::new("example.com", "nonce-abc").with_qop("auth"),
            ),
        )
        .await;

    let second = registrar.recv_register().await;
    assert_eq!(second.cseq.seq, first.cseq.seq + 1);
    assert_ne!(second.via.branch, first.via.branch);
    let auth = second.authorization.clone().expect("credentials attached");
    assert_eq!(auth.nonce, "nonce-abc");
    // Verify the digest the way a registrar would.
    let valid = check_response(
        &auth.response,
        &DigestInput {
            username: "alice",
            realm: "example.com",
            password: "secret",
            method: "REGISTER",
            uri: &auth.uri,
            nonce: "nonce-abc",
            algorithm: Default::default(),
            qop: Some(Qop::Auth),
            cnonce: auth.cnonce.as_deref(),
            nc: auth.nc,
            body: &[],
        },
    );
    assert!(valid);

    registrar
        .answer(Response::to_request(&second, StatusCode::OK).with_expires(3600))
        .await;
    assert!(events.recv().await.unwrap().is_success());
}

#[tokio::test(start_paused = true)]
async fn attempt_bound_allows_exactly_n_retries() {
    let config = base_config().with_credentials(creds()).with_max_attempts(2);
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    // Initial request plus exactly two challenge retries reach the wire.
    for _ in 0..3 {
        let request = registrar.recv_register().await;
        registrar
            .answer(
                Response::to_request(&request, StatusCode::UNAUTHORIZED)
                    .with_challenge(DigestChallenge::new("example.com", "nonce-abc")),
            )
            .await;
    }

    match events.recv().await.unwrap() {
        RegistrationEvent::Failure { reason, .. } => {
            assert!(reason.contains("attempt bound"), "unexpected reason: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    // Auth exhaustion is terminal: no backoff retry despite looping.
    registrar.nothing_for(Duration::from_secs(30)).await;
}

#[tokio::test(start_paused = true)]
async fn realm_mismatch_is_terminal() {
    let config = base_config().with_credentials(creds());
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    let request = registrar.recv_register().await;
    registrar
        .answer(
            Response::to_request(&request, StatusCode::UNAUTHORIZED)
                .with_challenge(DigestChallenge::new("elsewhere.org", "nonce-abc")),
        )
        .await;

    match events.recv().await.unwrap() {
        RegistrationEvent::Failure { reason, .. } => {
            assert!(reason.contains("realm"), "unexpected reason: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    registrar.nothing_for(Duration::from_secs(30)).await;
}

#[tokio::test(start_paused = true)]
async fn failure_retries_with_doubling_backoff() {
    let config = base_config();
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    let mut last = tokio::time::Instant::now();
    let mut gaps = Vec::new();
    for round in 0..4 {
        let request = registrar.recv_register().await;
        let now = tokio::time::Instant::now();
        if round > 0 {
            gaps.push(now - last);
        }
        last = now;
        registrar
            .answer(Response::to_request(&request, StatusCode::SERVICE_UNAVAILABLE))
            .await;
        assert!(!events.recv().await.unwrap().is_success());
    }

    // 1s, 2s, 4s: doubling from the floor, capped at the ceiling.
    assert_eq!(gaps.len(), 3);
    assert!(gaps[0] >= Duration::from_secs(1) && gaps[0] < Duration::from_secs(2));
    assert!(gaps[1] >= Duration::from_secs(2) && gaps[1] < Duration::from_secs(3));
    assert!(gaps[2] >= Duration::from_secs(4) && gaps[2] < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn backoff_resets_after_success() {
    let config = base_config().with_renew_time(600);
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    // Two failures walk the backoff up.
    for _ in 0..2 {
        let request = registrar.recv_register().await;
        registrar
            .answer(Response::to_request(&request, StatusCode::SERVICE_UNAVAILABLE))
            .await;
        assert!(!events.recv().await.unwrap().is_success());
    }
    // Then a success resets it.
    let request = registrar.recv_register().await;
    registrar
        .answer(Response::to_request(&request, StatusCode::OK).with_expires(3600))
        .await;
    assert!(events.recv().await.unwrap().is_success());

    // Next failure retries at the floor again, not at the doubled value.
    let renewal = registrar.recv_register().await;
    registrar
        .answer(Response::to_request(&renewal, StatusCode::SERVICE_UNAVAILABLE))
        .await;
    assert!(!events.recv().await.unwrap().is_success());
    let before = tokio::time::Instant::now();
    registrar.recv_register().await;
    let gap = tokio::time::Instant::now() - before;
    assert!(gap >= Duration::from_secs(1) && gap < Duration::from_secs(2), "gap was {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn unregister_sends_zero_expires_without_renewal() {
    let config = base_config();
    let (client, mut events, mut registrar) = harness(config);

    client.unregister();
    let request = registrar.recv_register().await;
    assert_eq!(request.expires, Some(0));
    assert!(!request.contact.as_ref().unwrap().uri.wildcard);
    registrar
        .answer(Response::to_request(&request, StatusCode::OK).with_expires(0))
        .await;

    match events.recv().await.unwrap() {
        RegistrationEvent::Success { renew_scheduled, .. } => assert_eq!(renew_scheduled, 0),
        other => panic!("expected success, got {other:?}"),
    }
    registrar.nothing_for(Duration::from_secs(3600)).await;
}

#[tokio::test(start_paused = true)]
async fn unregister_all_uses_wildcard_contact() {
    let config = base_config();
    let (client, _events, mut registrar) = harness(config);

    client.unregister_all();
    let request = registrar.recv_register().await;
    assert_eq!(request.expires, Some(0));
    assert!(request.contact.as_ref().unwrap().uri.wildcard);
}

#[tokio::test(start_paused = true)]
async fn halt_cancels_renewal_and_is_idempotent() {
    let config = base_config().with_renew_time(60);
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    let request = registrar.recv_register().await;
    registrar
        .answer(Response::to_request(&request, StatusCode::OK).with_expires(3600))
        .await;
    assert!(events.recv().await.unwrap().is_success());

    client.halt();
    client.halt();

    // Well past the renewal interval: nothing fires.
    registrar.nothing_for(Duration::from_secs(300)).await;
}

#[tokio::test(start_paused = true)]
async fn halt_abandons_in_flight_attempt() {
    let config = base_config();
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    // The REGISTER is on the wire but the registrar never answers.
    let request = registrar.recv_register().await;
    assert_eq!(request.expires, Some(3600));
    client.halt();

    // Well past the transaction deadline: the abandoned attempt reports
    // no outcome, and no backoff retry reaches the wire.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(events.try_recv().is_err());
    registrar.nothing_for(Duration::from_secs(60)).await;
}

#[tokio::test(start_paused = true)]
async fn next_nonce_enables_preemptive_credentials() {
    let config = base_config().with_credentials(creds()).with_renew_time(60);
    let (client, mut events, mut registrar) = harness(config);

    client.register(3600);
    let first = registrar.recv_register().await;
    registrar
        .answer(
            Response::to_request(&first, StatusCode::UNAUTHORIZED)
                .with_challenge(DigestChallenge::new("example.com", "nonce-1")),
        )
        .await;
    let second = registrar.recv_register().await;
    registrar
        .answer(
            Response::to_request(&second, StatusCode::OK)
                .with_expires(3600)
                .with_next_nonce("nonce-2"),
        )
        .await;
    assert!(events.recv().await.unwrap().is_success());

    // The renewal authenticates up front with the advertised next nonce.
    let renewal = registrar.recv_register().await;
    let auth = renewal.authorization.expect("pre-emptive credentials");
    assert_eq!(auth.nonce, "nonce-2");
}
