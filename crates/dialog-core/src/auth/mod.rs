//! # Challenge-Response Retry
//!
//! The one pattern every authenticated exchange in the stack shares: a
//! 401/407 arrives, the realm is checked against the configured
//! credentials, an attempt counter enforces a bound, and the original
//! request is re-sent as a brand-new transaction with a bumped CSeq, a
//! fresh branch, and a computed Authorization header.
//!
//! The old transaction is already terminated when this runs; the caller
//! submits the returned request as a new one.

use tracing::debug;

use sipline_auth_core::{answer_challenge, Credentials};
use sipline_sip_core::{Request, Response, Via};

use crate::errors::{DialogError, DialogResult};

/// Tracks challenge rounds for one logical exchange.
#[derive(Debug, Clone)]
pub struct ChallengeRetry {
    credentials: Credentials,
    max_attempts: u32,
    attempts: u32,
}

impl ChallengeRetry {
    pub fn new(credentials: Credentials, max_attempts: u32) -> Self {
        ChallengeRetry { credentials, max_attempts, attempts: 0 }
    }

    /// Rounds consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start a fresh exchange: the bound applies per logical operation,
    /// not per session.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Build the retry for `request` after `response` challenged it.
    ///
    /// Refuses when the challenge realm does not match the configured
    /// realm, or when the attempt bound is reached. N configured attempts
    /// allow exactly N retries; the N+1th challenge is a terminal failure.
    pub fn answer(&mut self, request: &Request, response: &Response) -> DialogResult<Request> {
        let challenge = response
            .challenge
            .as_ref()
            .ok_or_else(|| DialogError::protocol_error("challenge response without challenge"))?;

        if challenge.realm != self.credentials.realm {
            return Err(DialogError::AuthRetryRefused(format!(
                "realm mismatch: challenged for '{}', configured for '{}'",
                challenge.realm, self.credentials.realm
            )));
        }
        if self.attempts >= self.max_attempts {
            return Err(DialogError::AuthRetryRefused(format!(
                "attempt bound reached ({} of {})",
                self.attempts, self.max_attempts
            )));
        }
        self.attempts += 1;
        debug!(
            attempt = self.attempts,
            max = self.max_attempts,
            realm = %challenge.realm,
            "answering digest challenge"
        );

        let authorization = answer_challenge(
            challenge,
            &self.credentials,
            &request.method.to_string(),
            &request.uri.to_string(),
            &request.body,
        )
        .map_err(|e| DialogError::AuthRetryRefused(e.to_string()))?;

        // Same exchange, new transaction: bump CSeq, pick a fresh branch.
        let mut retry = request.clone().with_authorization(authorization);
        retry.cseq = retry.cseq.next();
        retry.via.branch = Via::generate_branch();
        Ok(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipline_sip_core::{Address, CSeq, DigestChallenge, Method, StatusCode, Uri};

    fn register() -> Request {
        Request::new(
            Method::Register,
            Uri::domain("example.com"),
            Via::new("UDP", "client.example.com", Some(5060), Via::generate_branch()),
            Address::new(Uri::sip("alice", "example.com")).with_tag("from-tag"),
            Address::new(Uri::sip("alice", "example.com")),
            "call-1",
            CSeq::new(1, Method::Register),
        )
    }

    fn challenged(realm: &str) -> Response {
        Response::to_request(&register(), StatusCode::UNAUTHORIZED)
            .with_challenge(DigestChallenge::new(realm, "nonce-1"))
    }

    fn creds() -> Credentials {
        Credentials::new("alice", "example.com", "secret")
    }

    #[test]
    fn test_retry_bumps_cseq_and_branch() {
        let mut retry = ChallengeRetry::new(creds(), 3);
        let request = register();
        let answered = retry.answer(&request, &challenged("example.com")).unwrap();
        assert_eq!(answered.cseq.seq, 2);
        assert_ne!(answered.via.branch, request.via.branch);
        let auth = answered.authorization.unwrap();
        assert_eq!(auth.username, "alice");
        assert_eq!(auth.nonce, "nonce-1");
    }

    #[test]
    fn test_realm_mismatch_refused_without_consuming_attempt() {
        let mut retry = ChallengeRetry::new(creds(), 3);
        let err = retry.answer(&register(), &challenged("other.org")).unwrap_err();
        assert!(matches!(err, DialogError::AuthRetryRefused(_)));
        assert_eq!(retry.attempts(), 0);
    }

    #[test]
    fn test_attempt_bound_allows_exactly_n_retries() {
        let mut retry = ChallengeRetry::new(creds(), 2);
        let request = register();
        let response = challenged("example.com");
        assert!(retry.answer(&request, &response).is_ok());
        assert!(retry.answer(&request, &response).is_ok());
        // Third challenge exceeds the bound of two.
        let err = retry.answer(&request, &response).unwrap_err();
        assert!(matches!(err, DialogError::AuthRetryRefused(_)));

        retry.reset();
        assert!(retry.answer(&request, &response).is_ok());
    }
}
