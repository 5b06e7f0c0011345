//! # sipline-auth-core
//!
//! Digest authentication engine (RFC 2617) for the sipline stack.
//!
//! Pure computation only: given credentials and challenge parameters this
//! crate produces or verifies a digest response. It performs no I/O, holds
//! no state, and is used in both directions — the registration client and
//! in-dialog challenge retry produce responses, `check_response` verifies
//! one against a recomputation.

pub mod digest;
pub mod error;

pub use digest::{
    Credentials, DigestAlgorithm, DigestInput, Qop, answer_challenge, check_response,
    compute_response, generate_cnonce,
};
pub use error::{AuthError, Result};
