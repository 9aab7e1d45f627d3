//! Periodic multi-host metric collection.
//!
//! The poller owns the on/off lifecycle of the collection loop. Within one
//! tick every host in the active set is fetched concurrently and awaited
//! independently; a failing host contributes an error-tagged sample and never
//! aborts or delays its siblings. Reports are published on a watch channel,
//! latest-wins - each tick's report is superseded by the next.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::data::{ClassifiedSample, ResourceReport, ResourceSample, Thresholds};
use crate::error::{FleetError, Result};
use crate::service::MetricsSource;

/// Receiving end of the per-tick report feed.
pub type ReportFeed = watch::Receiver<ResourceReport>;

/// Snapshot of the poller's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollStatus {
    pub active: bool,
    /// The active interval, when running.
    pub interval: Option<Duration>,
    /// The active host set, when running.
    pub hosts: BTreeSet<String>,
    pub thresholds: Thresholds,
}

struct RunningLoop {
    hosts: BTreeSet<String>,
    interval: Duration,
    task: tokio::task::JoinHandle<()>,
}

/// Lifecycle state guarded by one mutex so start/stop/tick are serialized.
/// The generation counter lets a tick that was in flight across a `stop`
/// recognize that its report must be discarded.
struct Lifecycle {
    running: Option<RunningLoop>,
    generation: u64,
}

/// The process-wide polling engine. `Idle` until started, `Running` until
/// stopped; restart-in-place is rejected so two interval loops can never
/// overlap on the same host set.
pub struct Poller {
    metrics: Arc<dyn MetricsSource>,
    thresholds: RwLock<Thresholds>,
    lifecycle: Mutex<Lifecycle>,
    reports: watch::Sender<ResourceReport>,
}

impl Poller {
    /// Create a poller over the given metrics collaborator.
    ///
    /// Returns the poller and the report feed consumers subscribe to. The
    /// feed's initial value is an empty report.
    pub fn new(metrics: Arc<dyn MetricsSource>) -> (Arc<Self>, ReportFeed) {
        Self::with_thresholds(metrics, Thresholds::default())
    }

    /// Create a poller with explicit starting thresholds (e.g. seeded from
    /// the config service).
    pub fn with_thresholds(
        metrics: Arc<dyn MetricsSource>,
        thresholds: Thresholds,
    ) -> (Arc<Self>, ReportFeed) {
        let (tx, rx) = watch::channel(ResourceReport::new());
        let poller = Arc::new(Self {
            metrics,
            thresholds: RwLock::new(thresholds),
            lifecycle: Mutex::new(Lifecycle {
                running: None,
                generation: 0,
            }),
            reports: tx,
        });
        (poller, rx)
    }

    /// Begin periodic collection over the given hosts.
    ///
    /// Fails with [`FleetError::EmptySelection`] for an empty host set,
    /// [`FleetError::InvalidInterval`] for a zero interval, and
    /// [`FleetError::AlreadyRunning`] while a loop is active (no
    /// restart-in-place; stop first). Every validation happens before the
    /// Idle -> Running transition, so a failed start leaves the poller Idle.
    ///
    /// The interval timer fires immediately, so the first report arrives
    /// without waiting a full period.
    pub fn start(self: &Arc<Self>, hosts: BTreeSet<String>, interval: Duration) -> Result<()> {
        if hosts.is_empty() {
            return Err(FleetError::EmptySelection);
        }
        if interval.is_zero() {
            return Err(FleetError::InvalidInterval(interval.as_millis() as u64));
        }

        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.running.is_some() {
            return Err(FleetError::AlreadyRunning);
        }

        lifecycle.generation += 1;
        let generation = lifecycle.generation;

        // The loop holds only a weak reference, so an orphaned poller is not
        // kept alive by its own task; the loop exits once the last strong
        // reference is gone.
        let poller = Arc::downgrade(self);
        let loop_hosts = hosts.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(poller) = poller.upgrade() else {
                    break;
                };
                let report = poller.collect(&loop_hosts).await;
                poller.publish(generation, report);
            }
        });

        info!(
            hosts = hosts.len(),
            interval_ms = interval.as_millis() as u64,
            "monitoring started"
        );
        lifecycle.running = Some(RunningLoop {
            hosts,
            interval,
            task,
        });
        Ok(())
    }

    /// Stop periodic collection. A stop while Idle is a no-op success.
    ///
    /// The scheduler task is cancelled; a manual [`tick`](Self::tick) that
    /// was in flight across the stop completes, but its report is discarded
    /// rather than delivered into the stopped reporting path.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.generation += 1;
        if let Some(running) = lifecycle.running.take() {
            running.task.abort();
            info!("monitoring stopped");
        }
    }

    /// Collect one report for the active host set and publish it.
    ///
    /// The scheduler drives this internally; callers may also invoke it once
    /// after a successful `start` for immediate feedback. Fails with
    /// [`FleetError::EmptySelection`] while Idle (there is no active host
    /// set to collect).
    pub async fn tick(&self) -> Result<ResourceReport> {
        let (hosts, generation) = {
            let lifecycle = self.lifecycle.lock();
            match &lifecycle.running {
                Some(running) => (running.hosts.clone(), lifecycle.generation),
                None => return Err(FleetError::EmptySelection),
            }
        };
        let report = self.collect(&hosts).await;
        self.publish(generation, report.clone());
        Ok(report)
    }

    /// Fetch every host concurrently and merge the settled results.
    ///
    /// The merged report's key set equals `hosts` exactly: a failed fetch
    /// contributes a fully error-tagged sample for its host alone.
    /// Classification reads the thresholds current at report time, so a
    /// threshold change between ticks applies without a restart.
    pub async fn collect(&self, hosts: &BTreeSet<String>) -> ResourceReport {
        let mut tasks = JoinSet::new();
        for host in hosts {
            let metrics = Arc::clone(&self.metrics);
            let host = host.clone();
            tasks.spawn(async move {
                let result = metrics.fetch(&host).await;
                (host, result)
            });
        }

        let mut samples: Vec<ResourceSample> = Vec::with_capacity(hosts.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((host, Ok(mut sample))) => {
                    // Key the row by the host we asked for, whatever the
                    // collector labelled it.
                    sample.host = host;
                    samples.push(sample);
                }
                Ok((host, Err(err))) => {
                    warn!(host = %host, error = %err, "metrics fetch failed");
                    samples.push(ResourceSample::errored(&host));
                }
                Err(err) => {
                    warn!(error = %err, "metrics task failed to join");
                }
            }
        }

        let thresholds = *self.thresholds.read();
        let mut report: ResourceReport = samples
            .into_iter()
            .map(|sample| {
                (
                    sample.host.clone(),
                    ClassifiedSample::classify(sample, &thresholds),
                )
            })
            .collect();

        // Every requested host must appear, even if its task vanished.
        for host in hosts {
            report.entry(host.clone()).or_insert_with(|| {
                ClassifiedSample::classify(ResourceSample::errored(host), &thresholds)
            });
        }

        debug!(hosts = report.len(), "tick collected");
        report
    }

    /// Reconfigure warning thresholds. Always permitted, Running or Idle;
    /// takes effect at the next classification.
    pub fn configure_thresholds(&self, cpu: u32, memory: u32) -> Result<()> {
        let thresholds = Thresholds::new(cpu, memory)?;
        *self.thresholds.write() = thresholds;
        debug!(cpu, memory, "thresholds updated");
        Ok(())
    }

    /// The thresholds currently used for classification.
    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.read()
    }

    /// Current lifecycle snapshot.
    pub fn status(&self) -> PollStatus {
        let lifecycle = self.lifecycle.lock();
        match &lifecycle.running {
            Some(running) => PollStatus {
                active: true,
                interval: Some(running.interval),
                hosts: running.hosts.clone(),
                thresholds: *self.thresholds.read(),
            },
            None => PollStatus {
                active: false,
                interval: None,
                hosts: BTreeSet::new(),
                thresholds: *self.thresholds.read(),
            },
        }
    }

    /// Whether the collection loop is running.
    pub fn is_active(&self) -> bool {
        self.lifecycle.lock().running.is_some()
    }

    fn publish(&self, generation: u64, report: ResourceReport) {
        let lifecycle = self.lifecycle.lock();
        // A tick that started before a stop (or a later restart) must not
        // deliver into the current reporting path.
        if lifecycle.running.is_none() || lifecycle.generation != generation {
            debug!("discarding report from a stopped polling session");
            return;
        }
        let _ = self.reports.send(report);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(running) = self.lifecycle.lock().running.take() {
            running.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MetricValue;
    use crate::service::ServiceError;
    use async_trait::async_trait;

    /// A metrics collaborator returning a fixed CPU value, failing for
    /// configured hosts, with an optional per-fetch delay.
    struct FakeMetrics {
        cpu: f64,
        failing: BTreeSet<String>,
        delay: Duration,
    }

    impl FakeMetrics {
        fn healthy(cpu: f64) -> Arc<Self> {
            Arc::new(Self {
                cpu,
                failing: BTreeSet::new(),
                delay: Duration::ZERO,
            })
        }

        fn failing_for(cpu: f64, hosts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                cpu,
                failing: hosts.iter().map(|h| h.to_string()).collect(),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl MetricsSource for FakeMetrics {
        async fn fetch(&self, host: &str) -> std::result::Result<ResourceSample, ServiceError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.contains(host) {
                return Err(ServiceError::Connection(format!("{} unreachable", host)));
            }
            Ok(ResourceSample {
                host: host.to_string(),
                date: "2026-01-01".to_string(),
                time: "12:00:00".to_string(),
                cpu: MetricValue::Number(self.cpu),
                memory: MetricValue::Number(40.0),
                uc: MetricValue::Number(5.0),
                http: MetricValue::Number(100.0),
                https: MetricValue::Number(200.0),
                ftp: MetricValue::Number(0.0),
                cc: MetricValue::Number(12.0),
                cs: MetricValue::Number(7.0),
            })
        }
    }

    fn hosts(addrs: &[&str]) -> BTreeSet<String> {
        addrs.iter().map(|a| a.to_string()).collect()
    }

    /// Counts every fetch it serves.
    struct CountingMetrics {
        fetches: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl MetricsSource for CountingMetrics {
        async fn fetch(&self, host: &str) -> std::result::Result<ResourceSample, ServiceError> {
            self.fetches
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(ResourceSample::errored(host))
        }
    }

    /// Scenario: a second start without an intervening stop is rejected.
    #[tokio::test]
    async fn start_twice_fails_already_running() {
        let (poller, _feed) = Poller::new(FakeMetrics::healthy(10.0));

        poller.start(hosts(&["10.0.0.1"]), Duration::from_secs(5)).unwrap();
        let err = poller
            .start(hosts(&["10.0.0.1"]), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, FleetError::AlreadyRunning));

        poller.stop();
        // After a stop, start succeeds again.
        poller.start(hosts(&["10.0.0.1"]), Duration::from_secs(5)).unwrap();
        poller.stop();
    }

    #[tokio::test]
    async fn start_validations_leave_poller_idle() {
        let (poller, _feed) = Poller::new(FakeMetrics::healthy(10.0));

        assert!(matches!(
            poller.start(BTreeSet::new(), Duration::from_secs(5)),
            Err(FleetError::EmptySelection)
        ));
        assert!(matches!(
            poller.start(hosts(&["10.0.0.1"]), Duration::ZERO),
            Err(FleetError::InvalidInterval(0))
        ));
        assert!(!poller.is_active());

        // A failed start does not poison the next one.
        poller.start(hosts(&["10.0.0.1"]), Duration::from_secs(5)).unwrap();
        assert!(poller.is_active());
        poller.stop();
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_noop() {
        let (poller, _feed) = Poller::new(FakeMetrics::healthy(10.0));
        poller.stop();
        poller.stop();
        assert!(!poller.is_active());
    }

    /// Scenario: host "a" reports cpu=90 against threshold 80, host "b"
    /// fails; the merged report warns for "a" and error-tags "b".
    #[tokio::test]
    async fn failed_host_is_isolated_and_error_tagged() {
        let (poller, _feed) = Poller::new(FakeMetrics::failing_for(90.0, &["b"]));

        let report = poller.collect(&hosts(&["a", "b"])).await;
        assert_eq!(report.len(), 2);

        let a = &report["a"];
        assert_eq!(a.sample.cpu.as_number(), Some(90.0));
        assert!(a.cpu_warning);

        let b = &report["b"];
        assert!(b.sample.cpu.is_error());
        assert!(b.sample.memory.is_error());
        assert!(!b.cpu_warning);
    }

    #[tokio::test]
    async fn report_key_set_equals_host_set_even_when_all_fail() {
        let (poller, _feed) = Poller::new(FakeMetrics::failing_for(0.0, &["a", "b", "c"]));

        let requested = hosts(&["a", "b", "c"]);
        let report = poller.collect(&requested).await;
        let keys: BTreeSet<String> = report.keys().cloned().collect();
        assert_eq!(keys, requested);
    }

    #[tokio::test]
    async fn tick_requires_an_active_session() {
        let (poller, _feed) = Poller::new(FakeMetrics::healthy(10.0));
        assert!(matches!(poller.tick().await, Err(FleetError::EmptySelection)));
    }

    #[tokio::test]
    async fn tick_publishes_to_the_report_feed() {
        let (poller, mut feed) = Poller::new(FakeMetrics::healthy(42.0));
        poller
            .start(hosts(&["10.0.0.1"]), Duration::from_secs(3600))
            .unwrap();

        let report = poller.tick().await.unwrap();
        assert_eq!(report.len(), 1);

        // Wait for the published value (the loop's immediate first tick may
        // land first; either way the feed carries a one-host report).
        feed.changed().await.unwrap();
        assert_eq!(feed.borrow().len(), 1);
        poller.stop();
    }

    #[tokio::test]
    async fn threshold_change_applies_without_restart() {
        let (poller, _feed) = Poller::new(FakeMetrics::healthy(70.0));
        let target = hosts(&["10.0.0.1"]);

        let before = poller.collect(&target).await;
        assert!(!before["10.0.0.1"].cpu_warning);

        poller.configure_thresholds(60, 75).unwrap();
        let after = poller.collect(&target).await;
        assert!(after["10.0.0.1"].cpu_warning);
    }

    #[tokio::test]
    async fn configure_thresholds_validates_range() {
        let (poller, _feed) = Poller::new(FakeMetrics::healthy(10.0));
        assert!(matches!(
            poller.configure_thresholds(101, 50),
            Err(FleetError::InvalidThreshold(101))
        ));
        // The stored thresholds are untouched by a rejected configure.
        assert_eq!(poller.thresholds(), Thresholds::default());
    }

    #[tokio::test]
    async fn stopped_session_discards_in_flight_report() {
        let slow = Arc::new(FakeMetrics {
            cpu: 10.0,
            failing: BTreeSet::new(),
            delay: Duration::from_millis(80),
        });
        let (poller, mut feed) = Poller::with_thresholds(slow, Thresholds::default());

        poller
            .start(hosts(&["10.0.0.1"]), Duration::from_secs(3600))
            .unwrap();
        let in_flight = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.tick().await })
        };
        // Both the loop's first tick and the manual tick are now in flight;
        // stop before either settles.
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.stop();

        // The manual tick still completes with a report in hand...
        let report = in_flight.await.unwrap().unwrap();
        assert_eq!(report.len(), 1);
        // ...but nothing reaches the feed.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!feed.has_changed().unwrap());
    }

    #[tokio::test]
    async fn dropped_poller_stops_its_loop() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let fetches = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(CountingMetrics {
            fetches: Arc::clone(&fetches),
        });
        let (poller, feed) = Poller::new(metrics);
        poller
            .start(hosts(&["10.0.0.1"]), Duration::from_millis(20))
            .unwrap();

        // Drop without stop(); the loop must not keep the poller alive.
        drop(poller);
        drop(feed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let settled = fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn status_reflects_lifecycle() {
        let (poller, _feed) = Poller::new(FakeMetrics::healthy(10.0));
        assert!(!poller.status().active);

        poller.start(hosts(&["10.0.0.1"]), Duration::from_secs(5)).unwrap();
        let status = poller.status();
        assert!(status.active);
        assert_eq!(status.interval, Some(Duration::from_secs(5)));
        assert!(status.hosts.contains("10.0.0.1"));

        poller.stop();
        assert!(!poller.status().active);
    }
}
