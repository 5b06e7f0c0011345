//! # Dialog Layer
//!
//! Long-lived peer relationships spanning many transactions. The plain
//! [`Dialog`] holds identity, counters, and routing state;
//! [`InviteDialog`] layers call semantics (BYE, optional REFER/NOTIFY,
//! challenge retry) on top via [`DialogCapabilities`].

pub mod dialog_id;
pub mod dialog_impl;
pub mod dialog_state;
pub mod invite_dialog;

pub use dialog_id::DialogId;
pub use dialog_impl::Dialog;
pub use dialog_state::DialogState;
pub use invite_dialog::{DialogCapabilities, InviteDialog};
