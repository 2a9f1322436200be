//! Cache Coordinator Module
//!
//! Composes the memory and disk tiers into one read/write API. Memory is
//! consulted first; a disk hit is decoded and promoted back into memory.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheStats, DiskStore, MaintenanceReport, MemoryStore};
use crate::config::Config;
use crate::error::DecodeError;
use crate::key::ResourceKey;
use crate::loader::Artifact;

// == Memory Tier ==
/// Memory store plus the counters that are updated under the same lock.
#[derive(Debug)]
struct MemoryTier<A> {
    store: MemoryStore<A>,
    stats: CacheStats,
}

// == Cache Coordinator ==
/// Two-tier cache of decoded artifacts backed by their raw bytes on disk.
#[derive(Debug)]
pub struct CacheCoordinator<A> {
    memory: Mutex<MemoryTier<A>>,
    disk: DiskStore,
    /// Background disk writes not yet known to have settled
    pending_writes: StdMutex<Vec<JoinHandle<()>>>,
}

impl<A: Artifact> CacheCoordinator<A> {
    // == Constructors ==
    pub fn new(memory: MemoryStore<A>, disk: DiskStore) -> Self {
        Self {
            memory: Mutex::new(MemoryTier {
                store: memory,
                stats: CacheStats::new(),
            }),
            disk,
            pending_writes: StdMutex::new(Vec::new()),
        }
    }

    /// Builds both tiers from the configured limits.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            MemoryStore::new(config.memory_cost_limit, config.memory_count_limit),
            DiskStore::new(
                config.cache_dir.clone(),
                config.disk_size_limit,
                Duration::from_secs(config.disk_max_age_secs),
            ),
        )
    }

    pub fn disk(&self) -> &DiskStore {
        &self.disk
    }

    // == Get ==
    /// Looks up `key` in memory, then on disk.
    ///
    /// On a disk hit `decode` runs on the blocking pool to turn the stored
    /// bytes into an artifact, which is promoted into memory before being
    /// returned. Bytes that fail to decode, or a decoder that panics, are
    /// reported as a miss.
    pub async fn get<F>(&self, key: &ResourceKey, decode: F) -> Option<A>
    where
        F: FnOnce(&[u8]) -> Result<A, DecodeError> + Send + 'static,
    {
        if let Some(artifact) = self.memory_get(key).await {
            return Some(artifact);
        }

        let Some(bytes) = self.disk.get(key).await else {
            self.memory.lock().await.stats.record_miss();
            debug!(key = %key, "Cache miss");
            return None;
        };

        // Disk hits are not coalesced: concurrent readers each decode their own copy
        let stored = bytes.len();
        let decoded = tokio::task::spawn_blocking(move || decode(&bytes))
            .await
            .unwrap_or_else(|e| Err(DecodeError::new(format!("decoder panicked: {}", e))));

        match decoded {
            Ok(artifact) => {
                let mut tier = self.memory.lock().await;
                tier.store.put(key.clone(), artifact.clone(), artifact.cost());
                tier.stats.record_disk_hit();
                debug!(key = %key, bytes = stored, "Disk hit promoted to memory");
                Some(artifact)
            }
            Err(e) => {
                self.memory.lock().await.stats.record_miss();
                warn!(key = %key, error = %e, "Stored bytes failed to decode, treating as miss");
                None
            }
        }
    }

    /// Memory-tier lookup only. Counts a hit but never a miss.
    pub async fn memory_get(&self, key: &ResourceKey) -> Option<A> {
        let mut tier = self.memory.lock().await;
        let artifact = tier.store.get(key)?;
        tier.stats.record_memory_hit();
        debug!(key = %key, "Memory hit");
        Some(artifact)
    }

    // == Put ==
    /// Stores the artifact in memory now and schedules `raw` for the disk tier.
    ///
    /// The disk write settles in the background; a disk lookup issued before
    /// it settles may still miss.
    pub async fn put(&self, key: &ResourceKey, artifact: A, raw: Vec<u8>) {
        {
            let mut tier = self.memory.lock().await;
            let cost = artifact.cost();
            tier.store.put(key.clone(), artifact, cost);
        }

        let disk = self.disk.clone();
        let key = key.clone();
        let handle = tokio::spawn(async move {
            disk.put(&key, raw).await;
        });

        let mut pending = self
            .pending_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Waits until every disk write scheduled so far has settled.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self
                .pending_writes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pending.drain(..).collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background disk write did not complete");
            }
        }
    }

    // == Remove ==
    /// Drops `key` from both tiers, after letting any scheduled write land so
    /// it cannot resurrect the record.
    pub async fn remove(&self, key: &ResourceKey) {
        self.memory.lock().await.store.remove(key);
        self.flush().await;
        self.disk.remove(key).await;
    }

    // == Clear ==
    pub async fn clear_memory(&self) {
        self.memory.lock().await.store.remove_all();
    }

    pub async fn clear_disk(&self) {
        self.flush().await;
        // Failures were logged by the store; nothing to surface here
        let _ = self.disk.clear().await;
    }

    pub async fn clear_all(&self) {
        self.clear_memory().await;
        self.clear_disk().await;
    }

    // == Disk Administration ==
    pub async fn run_disk_maintenance(&self) -> MaintenanceReport {
        self.disk.run_maintenance().await
    }

    /// Point-in-time size of the disk tier in bytes.
    pub async fn disk_usage(&self) -> u64 {
        self.disk.size_on_disk().await
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let tier = self.memory.lock().await;
        let mut stats = tier.stats.clone();
        stats.evictions = tier.store.evictions();
        stats.set_occupancy(tier.store.len(), tier.store.total_cost());
        stats
    }
}
