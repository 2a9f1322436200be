//! Tiered Cache - command line loader
//!
//! Resolves every address given on the command line through the two-tier
//! cache and prints cache statistics as JSON.
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load configuration from environment variables
//! 3. Create the cache and loader (HTTP fetcher, passthrough codec)
//! 4. Start the disk maintenance task and the memory pressure listener
//! 5. Resolve all addresses concurrently
//! 6. Print statistics and stop background tasks

use std::sync::Arc;

use anyhow::bail;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::{
    spawn_maintenance_task, spawn_pressure_listener, CacheCoordinator, Config, HttpFetcher,
    Loader, RawArtifact, RawCodec,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addresses: Vec<String> = std::env::args().skip(1).collect();
    if addresses.is_empty() {
        bail!("usage: tiered_cache <address>...");
    }

    let config = Config::from_env();
    info!(
        memory_cost_limit = config.memory_cost_limit,
        memory_count_limit = config.memory_count_limit,
        disk_size_limit = config.disk_size_limit,
        disk_max_age_secs = config.disk_max_age_secs,
        cache_dir = %config.cache_dir.display(),
        "Configuration loaded"
    );

    let cache = Arc::new(CacheCoordinator::<RawArtifact>::from_config(&config));
    let loader = Loader::new(cache.clone(), Arc::new(HttpFetcher::new()), RawCodec);

    let maintenance = spawn_maintenance_task(cache.clone(), config.maintenance_interval_secs);
    let (pressure_tx, pressure_rx) = mpsc::channel(1);
    let pressure = spawn_pressure_listener(cache.clone(), pressure_rx);
    let pressure_source = spawn_pressure_source(pressure_tx);

    let mut loads = JoinSet::new();
    for address in addresses {
        let loader = loader.clone();
        loads.spawn(async move {
            let outcome = loader.resolve(&address, None).await;
            (address, outcome)
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = loads.join_next().await {
        match joined {
            Ok((address, Ok(artifact))) => info!(address = %address, bytes = artifact.len(), "Resolved"),
            Ok((address, Err(e))) => {
                failures += 1;
                error!(address = %address, error = %e, "Failed to resolve");
            }
            Err(e) => {
                failures += 1;
                error!(error = %e, "Resolve task did not complete");
            }
        }
    }

    loader.flush().await;
    let report = loader.run_disk_maintenance().await;

    let summary = json!({
        "cache": loader.cache_stats().await,
        "loader": loader.stats(),
        "maintenance": report,
        "disk_usage_bytes": loader.disk_usage().await,
        "failures": failures,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    pressure_source.abort();
    maintenance.abort();
    pressure.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Forwards SIGUSR1 as a memory pressure notification.
#[cfg(unix)]
fn spawn_pressure_source(tx: mpsc::Sender<()>) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut usr1 = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to install SIGUSR1 handler");
                return;
            }
        };
        while usr1.recv().await.is_some() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(not(unix))]
fn spawn_pressure_source(tx: mpsc::Sender<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // No platform signal; keep the channel open until shutdown
        tx.closed().await;
    })
}
