//! # proxywatch
//!
//! Client-side core of an operational dashboard for a fleet of proxy
//! servers. It registers servers and named server groups, tracks which
//! subset of the fleet an operator has selected for monitoring or session
//! inspection, polls per-host resource metrics on an interval with threshold
//! classification, and queries per-host session tables.
//!
//! Rendering, the backend REST endpoints, and dialog widgets are
//! collaborators outside this crate's scope: the core is fully operable -
//! and testable - with zero rendering surface attached.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Dashboard                            │
//! │  ┌──────────┐   ┌────────────────┐   ┌───────────────────┐  │
//! │  │ registry │◀──│ selection      │──▶│ events            │  │
//! │  │ (fleet)  │   │ (staged sets)  │   │ (commit feed)     │  │
//! │  └──────────┘   └────────────────┘   └─────────┬─────────┘  │
//! │                                                │             │
//! │                                                ▼             │
//! │  ┌──────────┐   ┌────────────────┐   ┌───────────────────┐  │
//! │  │ session  │   │ poller         │──▶│ report feed       │  │
//! │  │ (query)  │   │ (tick loop)    │   │ (latest report)   │  │
//! │  └────┬─────┘   └───────┬────────┘   └───────────────────┘  │
//! │       │                 │                                    │
//! │       ▼                 ▼                                    │
//! │  ┌──────────────────────────────────────────┐               │
//! │  │ service  (HttpBackend | AddressBook)     │               │
//! │  └──────────────────────────────────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`registry`]**: the set of known servers and groups, with
//!   bidirectionally consistent many-to-many membership
//! - **[`selection`]**: two staged selection sets (monitoring, session),
//!   group toggling with all-or-nothing semantics, commit-to-apply
//! - **[`poller`]**: idempotent start/stop of the periodic collection loop,
//!   concurrent per-host fetches with per-host failure isolation, threshold
//!   classification at report time
//! - **[`session`]**: single-host, optionally-filtered session queries with
//!   normalized rows
//! - **[`service`]**: the collaborator seams - a reqwest-backed HTTP gateway
//!   and the client-local address book
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use proxywatch::{AddressBook, Dashboard, HttpBackend, Poller, SelectionContext};
//!
//! # fn main() -> anyhow::Result<()> {
//! let book = AddressBook::new("proxy_servers.json");
//! let (mut dashboard, _selection_feed) = Dashboard::open(book)?;
//!
//! dashboard.add_server("10.0.0.1", None, &[])?;
//! dashboard.toggle_server(SelectionContext::Monitoring, "10.0.0.1")?;
//! let committed = dashboard.commit_selection(SelectionContext::Monitoring);
//!
//! let backend = Arc::new(HttpBackend::builder().endpoint("http://localhost:5000").build()?);
//! let (poller, _report_feed) = Poller::new(backend);
//! poller.start(committed.servers, Duration::from_secs(5))?;
//!
//! let report = tokio_test::block_on(poller.tick())?;
//! assert_eq!(report.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod poller;
pub mod registry;
pub mod selection;
pub mod service;
pub mod session;

// Re-export main types for convenience
pub use app::Dashboard;
pub use config::Settings;
pub use data::{
    ClassifiedSample, MetricValue, ResourceReport, ResourceSample, SessionRecord, Thresholds,
};
pub use error::FleetError;
pub use events::{SelectionChanged, SelectionFeed};
pub use poller::{PollStatus, Poller, ReportFeed};
pub use registry::{Group, GroupId, Registry, Server, ServerId};
pub use selection::{SelectionContext, SelectionState};
pub use service::{AddressBook, HttpBackend, MetricsSource, ServiceError, SessionSource};
pub use session::SessionQuery;
