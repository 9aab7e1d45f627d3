//! Single-host session inspection.
//!
//! Issues one optionally-filtered query against the session collaborator and
//! normalizes the result rows. Rows come back in collaborator order; the
//! core never resorts them and never retries a failed query.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::SessionRecord;
use crate::error::{FleetError, Result};
use crate::registry::Registry;
use crate::service::SessionSource;

/// Session table query over a [`SessionSource`] collaborator.
pub struct SessionQuery {
    source: Arc<dyn SessionSource>,
}

impl SessionQuery {
    pub fn new(source: Arc<dyn SessionSource>) -> Self {
        Self { source }
    }

    /// Fetch and normalize the session table for one host.
    ///
    /// Fails with [`FleetError::UnknownServer`] if the host is not
    /// registered. A refresh always re-fetches the unfiltered set - the
    /// search term is deliberately ignored when `is_refresh` is set, so a
    /// refresh after a filtered view restores the full table. Otherwise a
    /// non-empty term is passed through to the collaborator as its filter.
    ///
    /// Transport failure surfaces as [`FleetError::QueryFailed`]; the caller
    /// decides whether to show a transient error state.
    pub async fn query(
        &self,
        registry: &Registry,
        host: &str,
        search_term: &str,
        is_refresh: bool,
    ) -> Result<Vec<SessionRecord>> {
        if !registry.contains(host) {
            return Err(FleetError::UnknownServer(host.to_string()));
        }

        let search = if is_refresh {
            None
        } else {
            let term = search_term.trim();
            (!term.is_empty()).then_some(term)
        };

        let rows = self.source.fetch(host, search).await.map_err(|err| {
            warn!(host = %host, error = %err, "session query failed");
            FleetError::QueryFailed {
                reason: err.to_string(),
            }
        })?;

        debug!(host = %host, rows = rows.len(), filtered = search.is_some(), "session query");
        Ok(rows.iter().map(SessionRecord::from_raw).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RawSessionRow, NOT_AVAILABLE};
    use crate::service::ServiceError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records every request it receives and replays canned rows.
    struct FakeSessions {
        rows: Vec<RawSessionRow>,
        fail: bool,
        requests: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeSessions {
        fn with_rows(rows: Vec<RawSessionRow>) -> Arc<Self> {
            Arc::new(Self {
                rows,
                fail: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                rows: Vec::new(),
                fail: true,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SessionSource for FakeSessions {
        async fn fetch(
            &self,
            host: &str,
            search: Option<&str>,
        ) -> std::result::Result<Vec<RawSessionRow>, ServiceError> {
            self.requests
                .lock()
                .push((host.to_string(), search.map(String::from)));
            if self.fail {
                return Err(ServiceError::Timeout);
            }
            Ok(self.rows.clone())
        }
    }

    fn registry_with(host: &str) -> Registry {
        let mut registry = Registry::new();
        registry.add_server(host, None, &[]).unwrap();
        registry
    }

    fn row(entries: &[(&str, &str)]) -> RawSessionRow {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn unknown_host_is_rejected_without_a_request() {
        let source = FakeSessions::with_rows(vec![]);
        let query = SessionQuery::new(source.clone());
        let registry = Registry::new();

        let err = query.query(&registry, "10.0.0.1", "", false).await.unwrap_err();
        assert!(matches!(err, FleetError::UnknownServer(_)));
        assert!(source.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn search_term_is_passed_through() {
        let source = FakeSessions::with_rows(vec![]);
        let query = SessionQuery::new(source.clone());
        let registry = registry_with("10.0.0.1");

        query.query(&registry, "10.0.0.1", "example.com", false).await.unwrap();
        assert_eq!(
            source.requests.lock().as_slice(),
            &[("10.0.0.1".to_string(), Some("example.com".to_string()))]
        );
    }

    #[tokio::test]
    async fn blank_search_means_unfiltered() {
        let source = FakeSessions::with_rows(vec![]);
        let query = SessionQuery::new(source.clone());
        let registry = registry_with("10.0.0.1");

        query.query(&registry, "10.0.0.1", "   ", false).await.unwrap();
        assert_eq!(
            source.requests.lock().as_slice(),
            &[("10.0.0.1".to_string(), None)]
        );
    }

    /// A refresh with a search term issues the same request as a refresh
    /// with no term at all.
    #[tokio::test]
    async fn refresh_overrides_search() {
        let source = FakeSessions::with_rows(vec![]);
        let query = SessionQuery::new(source.clone());
        let registry = registry_with("10.0.0.1");

        query.query(&registry, "10.0.0.1", "foo", true).await.unwrap();
        query.query(&registry, "10.0.0.1", "", true).await.unwrap();

        let requests = source.requests.lock();
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[0].1, None);
    }

    #[tokio::test]
    async fn rows_keep_collaborator_order() {
        let rows = vec![
            row(&[("User Name", "zed"), ("Client IP", "192.168.1.3")]),
            row(&[("User Name", "alice"), ("Client IP", "192.168.1.1")]),
        ];
        let source = FakeSessions::with_rows(rows);
        let query = SessionQuery::new(source);
        let registry = registry_with("10.0.0.1");

        let records = query.query(&registry, "10.0.0.1", "", false).await.unwrap();
        assert_eq!(records[0].username, "zed");
        assert_eq!(records[1].username, "alice");
        assert_eq!(records[0].url, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn transport_failure_maps_to_query_failed() {
        let source = FakeSessions::failing();
        let query = SessionQuery::new(source.clone());
        let registry = registry_with("10.0.0.1");

        let err = query.query(&registry, "10.0.0.1", "", false).await.unwrap_err();
        assert!(matches!(err, FleetError::QueryFailed { .. }));
        // Not retried.
        assert_eq!(source.requests.lock().len(), 1);
    }
}
