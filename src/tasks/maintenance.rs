//! Disk Maintenance Task
//!
//! Background task that periodically sweeps the disk tier.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheCoordinator;
use crate::loader::Artifact;

/// Spawns a background task that runs a disk maintenance sweep every
/// `interval_secs` seconds.
///
/// Sweeps share the disk tier's serialization lock with reads and writes, so
/// they never race with a write to the same file.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheCoordinator::<RawArtifact>::from_config(&config));
/// let maintenance = spawn_maintenance_task(cache.clone(), config.maintenance_interval_secs);
/// // Later, during shutdown:
/// maintenance.abort();
/// ```
pub fn spawn_maintenance_task<A: Artifact>(
    cache: Arc<CacheCoordinator<A>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs, "Starting disk maintenance task");

        loop {
            tokio::time::sleep(interval).await;

            let report = cache.run_disk_maintenance().await;
            if report.removed() == 0 {
                debug!("Disk maintenance: nothing removed");
            }
        }
    })
}
