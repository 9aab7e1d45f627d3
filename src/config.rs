//! Application settings.
//!
//! Layered: a config file (if present), then `PROXYWATCH_*` environment
//! variables, then CLI flags on top. The config service on the backend can
//! additionally re-seed the thresholds at startup.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Settings for the dashboard process.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base URL of the backend services.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Polling interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// CPU warning threshold (percent).
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: u32,

    /// Memory warning threshold (percent).
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: u32,

    /// Path of the client-local server list.
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_cpu_threshold() -> u32 {
    80
}

fn default_memory_threshold() -> u32 {
    75
}

fn default_store_path() -> String {
    "proxy_servers.json".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            interval_ms: default_interval_ms(),
            cpu_threshold: default_cpu_threshold(),
            memory_threshold: default_memory_threshold(),
            store_path: default_store_path(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix("PROXYWATCH"))
            .build()
            .context("building configuration")?;

        config
            .try_deserialize()
            .context("deserializing configuration")
    }
}
