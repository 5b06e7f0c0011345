//! Registration configuration.

use std::time::Duration;

use sipline_auth_core::Credentials;
use sipline_sip_core::Uri;

/// Everything a registration session needs, fixed at construction.
///
/// Scheme selection happens once, here: if the address-of-record or the
/// explicit route uses a secure scheme, the contact is upgraded to match,
/// and a secure contact in turn upgrades the To/From addresses for the
/// whole session.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Request-URI of the REGISTER request (the registrar's domain).
    pub registrar_uri: Uri,
    /// Address-of-record being registered (To and From).
    pub from_uri: Uri,
    /// Contact binding to install at the registrar.
    pub contact_uri: Uri,
    /// Optional outbound route toward the registrar.
    pub route: Option<Uri>,
    /// Binding lifetime requested on `register()`, in seconds.
    pub expires: u32,
    /// Upper bound on the locally scheduled renewal interval, in seconds.
    pub renew_time: u32,
    /// Challenge rounds allowed per registration cycle.
    pub max_attempts: u32,
    /// Initial retry interval after a non-auth failure.
    pub retry_backoff_min: Duration,
    /// Ceiling the retry interval doubles up to.
    pub retry_backoff_max: Duration,
    /// Digest credentials; absent means challenges are terminal failures.
    pub credentials: Option<Credentials>,
    /// Whether successful registrations schedule renewals and failures
    /// schedule retries.
    pub loop_enabled: bool,
    /// Host placed in the Via sent-by of outgoing requests.
    pub local_host: String,
}

impl RegistrationConfig {
    pub fn new(registrar_uri: Uri, from_uri: Uri, contact_uri: Uri) -> Self {
        let config = RegistrationConfig {
            registrar_uri,
            from_uri,
            contact_uri,
            route: None,
            expires: 3600,
            renew_time: 3600,
            max_attempts: 3,
            retry_backoff_min: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(64),
            credentials: None,
            loop_enabled: true,
            local_host: "localhost".to_string(),
        };
        config.normalize_schemes()
    }

    pub fn with_route(mut self, route: Uri) -> Self {
        self.route = Some(route);
        self.normalize_schemes()
    }

    pub fn with_expires(mut self, expires: u32) -> Self {
        self.expires = expires;
        self
    }

    pub fn with_renew_time(mut self, renew_time: u32) -> Self {
        self.renew_time = renew_time;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.retry_backoff_min = min;
        self.retry_backoff_max = max;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_loop_enabled(mut self, loop_enabled: bool) -> Self {
        self.loop_enabled = loop_enabled;
        self
    }

    pub fn with_local_host(mut self, local_host: impl Into<String>) -> Self {
        self.local_host = local_host.into();
        self
    }

    fn normalize_schemes(mut self) -> Self {
        let route_secure = self.route.as_ref().is_some_and(Uri::is_secure);
        if self.from_uri.is_secure() || route_secure {
            self.contact_uri = self.contact_uri.into_secure();
        }
        if self.contact_uri.is_secure() {
            self.from_uri = self.from_uri.into_secure();
            self.registrar_uri = self.registrar_uri.into_secure();
        }
        self
    }
}
