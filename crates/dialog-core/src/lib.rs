//! # sipline-dialog-core
//!
//! Transaction matching and dialog state for the sipline SIP stack.
//!
//! This crate is the temporal-correctness layer: every inbound or outbound
//! message is associated with exactly one in-flight exchange (a
//! transaction), and across many exchanges with exactly one long-lived
//! relationship (a dialog), while retransmissions, reordering,
//! authentication challenges, and timeouts are all in play concurrently.
//!
//! ## Layering
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ owners: dialogs, registration client, app     │
//! └──────────────▲────────────────────────────────┘
//!                │ TransactionEvent (at most one terminal per tx)
//! ┌──────────────┴────────────────────────────────┐
//! │ TransactionManager + client/server tx         │
//! │ state machines + TimerManager                 │
//! └──────────────▲────────────────────────────────┘
//!                │ Message (already parsed)
//! ┌──────────────┴────────────────────────────────┐
//! │ SipTransport collaborator (out of scope here) │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! The transaction layer lives inside this crate rather than its own; the
//! two are coupled through the matching map and timers, and keeping them
//! together keeps the lifecycle invariants in one place.

pub mod auth;
pub mod dialog;
pub mod errors;
pub mod events;
pub mod routing;
pub mod transaction;
pub mod transport;

pub use auth::ChallengeRetry;
pub use dialog::{Dialog, DialogCapabilities, DialogId, DialogState, InviteDialog};
pub use errors::{DialogError, DialogResult};
pub use events::{DialogEvent, DispatchEvent, TransactionEvent};
pub use routing::DialogMatcher;
pub use transaction::{
    TimerHandle, TimerManager, TimerSettings, TransactionKey, TransactionKind, TransactionManager,
    TransactionRole, TransactionState,
};
pub use transport::{SipTransport, TransportEvent};
