use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use proxywatch::config::Settings;
use proxywatch::data::Thresholds;
use proxywatch::poller::Poller;
use proxywatch::selection::SelectionContext;
use proxywatch::service::{AddressBook, HttpBackend};
use proxywatch::session::SessionQuery;
use proxywatch::Dashboard;

#[derive(Parser, Debug)]
#[command(name = "proxywatch")]
#[command(about = "Operational dashboard core for monitoring a proxy server fleet")]
struct Args {
    /// Path to a settings file (TOML); PROXYWATCH_* env vars layer on top
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides settings)
    #[arg(short, long)]
    backend: Option<String>,

    /// Polling interval in milliseconds (overrides settings)
    #[arg(short, long)]
    interval: Option<u64>,

    /// CPU warning threshold percentage (overrides settings)
    #[arg(long)]
    cpu_threshold: Option<u32>,

    /// Memory warning threshold percentage (overrides settings)
    #[arg(long)]
    memory_threshold: Option<u32>,

    /// Collect a single report for the full fleet and exit
    #[arg(long, conflicts_with = "sessions")]
    once: bool,

    /// Query the session table of one host and exit
    #[arg(long)]
    sessions: Option<String>,

    /// Search filter for --sessions
    #[arg(long, default_value = "", requires = "sessions")]
    search: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        settings.backend_url = backend;
    }
    if let Some(interval) = args.interval {
        settings.interval_ms = interval;
    }
    if let Some(cpu) = args.cpu_threshold {
        settings.cpu_threshold = cpu;
    }
    if let Some(memory) = args.memory_threshold {
        settings.memory_threshold = memory;
    }

    let backend = Arc::new(
        HttpBackend::builder()
            .endpoint(&settings.backend_url)
            .timeout(Duration::from_secs(10))
            .build()?,
    );

    let book = AddressBook::new(&settings.store_path);
    let (mut dashboard, _selection_feed) = Dashboard::open(book)?;

    // Merge the backend directory into the local registry: servers first,
    // then groups over the registered addresses.
    match backend.list_servers().await {
        Ok(servers) => {
            for server in servers {
                if !dashboard.registry().contains(&server.address) {
                    if let Err(err) =
                        dashboard.add_server(&server.address, server.description.clone(), &[])
                    {
                        warn!(address = %server.address, error = %err, "directory server skipped");
                    }
                }
            }
        }
        Err(err) => warn!(error = %err, "server directory unavailable"),
    }
    match backend.list_groups().await {
        Ok(groups) => {
            for group in groups {
                let members: Vec<String> = group
                    .servers
                    .iter()
                    .filter(|addr| dashboard.registry().contains(addr))
                    .cloned()
                    .collect();
                if let Err(err) = dashboard.add_group(&group.name, group.description.clone(), &members)
                {
                    warn!(group = %group.name, error = %err, "directory group skipped");
                }
            }
        }
        Err(err) => warn!(error = %err, "group directory unavailable"),
    }

    // Seed thresholds from the config service when it answers.
    if let Ok(remote) = backend.get_config().await {
        if let Some(cpu) = remote.cpu_threshold {
            settings.cpu_threshold = cpu;
        }
        if let Some(memory) = remote.memory_threshold {
            settings.memory_threshold = memory;
        }
    }
    let thresholds = Thresholds::new(settings.cpu_threshold, settings.memory_threshold)?;

    // One-shot session query mode.
    if let Some(host) = args.sessions {
        let query = SessionQuery::new(backend.clone());
        let records = query
            .query(dashboard.registry(), &host, &args.search, false)
            .await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    // Monitor the whole registered fleet.
    dashboard.select_all(SelectionContext::Monitoring);
    let committed = dashboard.commit_selection(SelectionContext::Monitoring);
    if committed.servers.is_empty() {
        anyhow::bail!("no servers registered; add one to the address book or the backend directory");
    }

    let (poller, mut reports) = Poller::with_thresholds(backend.clone(), thresholds);

    if args.once {
        let report = poller.collect(&committed.servers).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    poller.start(
        committed.servers.clone(),
        Duration::from_millis(settings.interval_ms),
    )?;
    info!(
        hosts = committed.servers.len(),
        interval_ms = settings.interval_ms,
        "polling; ctrl-c to stop"
    );

    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = reports.borrow_and_update().clone();
                println!("{}", serde_json::to_string(&report)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    poller.stop();
    Ok(())
}
