//! Resource samples and threshold classification.
//!
//! One [`ResourceSample`] is produced per host per tick and superseded by the
//! next tick. A metric that could not be collected carries the `"error"`
//! sentinel instead of a number, which is distinct from a legitimate zero
//! reading and never classifies as a warning.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

/// Percentage thresholds for warning classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// CPU usage percentage at or above which a sample warns.
    pub cpu: u8,
    /// Memory usage percentage at or above which a sample warns.
    pub memory: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { cpu: 80, memory: 75 }
    }
}

impl Thresholds {
    /// Validate and construct; thresholds are percentages in 0..=100.
    pub fn new(cpu: u32, memory: u32) -> Result<Self> {
        if cpu > 100 {
            return Err(FleetError::InvalidThreshold(cpu));
        }
        if memory > 100 {
            return Err(FleetError::InvalidThreshold(memory));
        }
        Ok(Self {
            cpu: cpu as u8,
            memory: memory as u8,
        })
    }
}

/// A numeric metric reading, or the `"error"` sentinel when collection for
/// that metric failed.
///
/// Older collectors serialize every metric as a string (`"90"`, `"error"`),
/// so deserialization accepts both forms and [`MetricValue::as_number`]
/// parses numeric strings; a `"90"` classifies exactly like `90`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// The sentinel substituted when collection failed.
    pub fn error() -> Self {
        MetricValue::Text("error".to_string())
    }

    /// Whether this value is the error sentinel (or any non-numeric text).
    pub fn is_error(&self) -> bool {
        self.as_number().is_none()
    }

    /// Numeric view of the value, parsing numeric strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Display form for presentation: errors render as "N/A".
    pub fn display(&self) -> String {
        match self.as_number() {
            Some(n) => {
                if n.fract() == 0.0 {
                    format!("{}", n as i64)
                } else {
                    format!("{}", n)
                }
            }
            None => "N/A".to_string(),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        MetricValue::Number(n)
    }
}

/// Per-host metrics for one collection tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// The collector labels this field `device` on the wire, and some
    /// collectors omit it entirely; callers re-key by the requested host.
    #[serde(alias = "device", default)]
    pub host: String,
    /// Collector-supplied date string.
    pub date: String,
    /// Collector-supplied time string.
    pub time: String,
    pub cpu: MetricValue,
    pub memory: MetricValue,
    /// Unique client count.
    pub uc: MetricValue,
    pub http: MetricValue,
    pub https: MetricValue,
    pub ftp: MetricValue,
    /// Client connections.
    pub cc: MetricValue,
    /// Client sessions.
    pub cs: MetricValue,
}

impl ResourceSample {
    /// Build a fully error-tagged sample for a host whose fetch failed.
    ///
    /// The collector supplies timestamps on success; on failure we stamp the
    /// sample client-side so the row still shows when the attempt happened.
    pub fn errored(host: &str) -> Self {
        let now = chrono::Local::now();
        Self {
            host: host.to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            cpu: MetricValue::error(),
            memory: MetricValue::error(),
            uc: MetricValue::error(),
            http: MetricValue::error(),
            https: MetricValue::error(),
            ftp: MetricValue::error(),
            cc: MetricValue::error(),
            cs: MetricValue::error(),
        }
    }
}

/// A sample with its warning flags, classified against the thresholds that
/// were current at report time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSample {
    #[serde(flatten)]
    pub sample: ResourceSample,
    pub cpu_warning: bool,
    pub memory_warning: bool,
}

impl ClassifiedSample {
    /// Classify a sample: warning iff the numeric value is at or above the
    /// threshold. The error sentinel never warns.
    pub fn classify(sample: ResourceSample, thresholds: &Thresholds) -> Self {
        let cpu_warning = sample
            .cpu
            .as_number()
            .map(|v| v >= f64::from(thresholds.cpu))
            .unwrap_or(false);
        let memory_warning = sample
            .memory
            .as_number()
            .map(|v| v >= f64::from(thresholds.memory))
            .unwrap_or(false);
        Self {
            sample,
            cpu_warning,
            memory_warning,
        }
    }
}

/// Result of one tick: every requested host, successful or not, keyed by
/// address.
pub type ResourceReport = BTreeMap<String, ClassifiedSample>;
