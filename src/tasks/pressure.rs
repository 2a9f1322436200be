//! Memory Pressure Task
//!
//! Clears the memory tier whenever the environment signals memory pressure.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheCoordinator;
use crate::loader::Artifact;

/// Spawns a listener that empties the memory tier on every notification.
///
/// No acknowledgment is sent back. The task ends once every sender has been
/// dropped.
pub fn spawn_pressure_listener<A: Artifact>(
    cache: Arc<CacheCoordinator<A>>,
    mut signals: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while signals.recv().await.is_some() {
            info!("Memory pressure signalled, clearing memory tier");
            cache.clear_memory().await;
        }
        info!("Memory pressure source closed");
    })
}
