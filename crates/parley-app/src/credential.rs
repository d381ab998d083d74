//! Credential resolution.

use std::future::Future;

use parley_core::Credentials;

/// Yields the credentials for a connection attempt.
///
/// Called on every connect and every reconnect, so a resolver backed by a
/// token store sees refreshed tokens. `None` aborts the attempt silently.
pub trait CredentialResolver: Send {
    /// Look up the current credentials.
    fn resolve(&mut self) -> impl Future<Output = Option<Credentials>> + Send;
}

/// Resolver returning fixed credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: Option<Credentials>,
}

impl StaticCredentials {
    /// Always resolve to `credentials`.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials: Some(credentials) }
    }

    /// Never resolve.
    pub fn none() -> Self {
        Self::default()
    }

    /// Replace the credentials returned from now on.
    pub fn set(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }
}

impl CredentialResolver for StaticCredentials {
    fn resolve(&mut self) -> impl Future<Output = Option<Credentials>> + Send {
        std::future::ready(self.credentials.clone())
    }
}
