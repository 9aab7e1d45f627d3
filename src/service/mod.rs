//! Collaborator service abstractions.
//!
//! The core treats its backends as opaque JSON services behind these traits:
//! a per-host metrics fetch, a per-host session fetch, and a config store.
//! The reqwest-backed [`HttpBackend`] implements all of them; tests plug in
//! in-memory fakes.

mod http;
mod store;

pub use http::{DirectoryGroup, DirectoryServer, HttpBackend, HttpBackendBuilder, ThresholdConfig};
pub use store::AddressBook;

use async_trait::async_trait;

use thiserror::Error;

use crate::data::{RawSessionRow, ResourceSample};

/// Errors from collaborator transports.
///
/// These never leak to callers of the core directly: the poller folds them
/// into error-tagged samples, the session query maps them into
/// `QueryFailed`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse a response body.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The collaborator's own timeout fired.
    #[error("request timed out")]
    Timeout,

    /// The backend reported a failure envelope.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.is_connect() {
            ServiceError::Connection(err.to_string())
        } else {
            ServiceError::Http(err.to_string())
        }
    }
}

/// Fetches one resource sample for one host.
///
/// Implementations own their timeout; a slow host surfaces as an ordinary
/// error and is isolated to that host by the poller.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, host: &str) -> Result<ResourceSample, ServiceError>;
}

/// Fetches the raw session table for one host, optionally filtered.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn fetch(
        &self,
        host: &str,
        search: Option<&str>,
    ) -> Result<Vec<RawSessionRow>, ServiceError>;
}
