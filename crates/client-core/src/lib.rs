//! # sipline-client-core
//!
//! Client-side session logic for the sipline stack. Today that is the
//! registration client: the canonical "periodic request with transparent
//! challenge-response retry" machine, layered on the transaction layer of
//! [`sipline_dialog_core`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use sipline_client_core::{RegistrationClient, RegistrationConfig};
//! # use sipline_dialog_core::{TimerManager, TimerSettings, TransactionManager};
//! # use sipline_dialog_core::transport::MockTransport;
//! # use sipline_sip_core::Uri;
//! # #[tokio::main] async fn main() {
//! let (transport, _wire) = MockTransport::new(true);
//! let (transactions, _dispatch) =
//!     TransactionManager::new(Arc::new(transport), TimerSettings::default());
//! let config = RegistrationConfig::new(
//!     Uri::domain("example.com"),
//!     Uri::sip("alice", "example.com"),
//!     Uri::sip("alice", "client.example.com"),
//! );
//! let (client, mut outcomes) =
//!     RegistrationClient::new(config, transactions, TimerManager::new());
//! client.register(3600);
//! let outcome = outcomes.recv().await;
//! # }
//! ```

pub mod config;
pub mod events;
pub mod registration;

pub use config::RegistrationConfig;
pub use events::RegistrationEvent;
pub use registration::RegistrationClient;
