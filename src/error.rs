//! Error types for the dashboard core.

use thiserror::Error;

use crate::registry::GroupId;

/// Errors returned by the registry, selection, poller, and session query.
///
/// These are validation failures surfaced synchronously to the caller; the
/// core never retries them. Per-host metric fetch failures are *not* errors
/// at this level - they are folded into error-tagged samples by the poller.
#[derive(Debug, Error)]
pub enum FleetError {
    /// A server with this address is already registered.
    #[error("server already registered: {0}")]
    DuplicateServer(String),

    /// A group with this name already exists.
    #[error("group already exists: {0}")]
    DuplicateGroup(String),

    /// The address is not present in the registry.
    #[error("unknown server: {0}")]
    UnknownServer(String),

    /// Lookup target does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Polling was started with an empty host set.
    #[error("no servers selected")]
    EmptySelection,

    /// Polling interval must be greater than zero.
    #[error("invalid polling interval: {0}ms")]
    InvalidInterval(u64),

    /// The poller is already running; stop it before starting again.
    #[error("monitoring is already running")]
    AlreadyRunning,

    /// Thresholds are percentages and must fall in 0..=100.
    #[error("invalid threshold: {0} (must be 0-100)")]
    InvalidThreshold(u32),

    /// The session query collaborator failed.
    #[error("session query failed: {reason}")]
    QueryFailed { reason: String },
}

impl FleetError {
    pub(crate) fn group_not_found(id: GroupId) -> Self {
        FleetError::NotFound(format!("group {}", id))
    }
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, FleetError>;
