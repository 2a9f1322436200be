//! Loader Module
//!
//! Main entry point: serve from cache, or run exactly one fetch+decode
//! pipeline per key no matter how many callers are waiting for it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheCoordinator, CacheStats, MaintenanceReport};
use crate::error::{DecodeError, FetchError, LoadError, Result};
use crate::key::{ResourceKey, SizeHint};
use crate::loader::coalesce::{InFlightTable, LoaderStats, Outcome, Registration, SettleGuard};
use crate::loader::{Codec, Fetcher};

// == Loader ==
/// Resolves resource addresses to decoded artifacts.
///
/// Cloning is cheap and every clone shares the same cache and in-flight
/// table, so one loader (and its clones) must front a given cache directory.
pub struct Loader<C: Codec> {
    cache: Arc<CacheCoordinator<C::Artifact>>,
    fetcher: Arc<dyn Fetcher>,
    codec: Arc<C>,
    in_flight: Arc<InFlightTable<C::Artifact>>,
}

impl<C: Codec> Clone for Loader<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            fetcher: Arc::clone(&self.fetcher),
            codec: Arc::clone(&self.codec),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<C: Codec> Loader<C> {
    // == Constructor ==
    /// Creates a loader over an existing cache.
    ///
    /// # Arguments
    /// * `cache` - Two-tier cache shared with any administrative callers
    /// * `fetcher` - Transport used on a cache miss
    /// * `codec` - Turns fetched or stored bytes into artifacts
    pub fn new(
        cache: Arc<CacheCoordinator<C::Artifact>>,
        fetcher: Arc<dyn Fetcher>,
        codec: C,
    ) -> Self {
        Self {
            cache,
            fetcher,
            codec: Arc::new(codec),
            in_flight: Arc::new(InFlightTable::new()),
        }
    }

    // == Resolve ==
    /// Returns the artifact for `address` at the rendition described by
    /// `size_hint`.
    ///
    /// Memory hits return immediately; disk hits are decoded and promoted. On
    /// a miss the call joins the in-flight pipeline for the same key, or
    /// starts one. Dropping the returned future only withdraws this caller:
    /// the pipeline keeps running for everyone else and still populates the
    /// cache.
    pub async fn resolve(&self, address: &str, size_hint: Option<SizeHint>) -> Result<C::Artifact> {
        let key = ResourceKey::for_request(address, size_hint);

        let codec = Arc::clone(&self.codec);
        if let Some(artifact) = self
            .cache
            .get(&key, move |bytes| codec.decode(bytes, size_hint))
            .await
        {
            debug!(key = %key, "Resolved from cache");
            return Ok(artifact);
        }

        // Registration and pipeline start happen without an await in between,
        // so a cancelled owner can never leave an orphaned flight.
        let mut receiver = match self.in_flight.register(&key) {
            Registration::Joined(rx) => rx,
            Registration::Owner(rx) => {
                self.spawn_pipeline(key.clone(), size_hint);
                rx
            }
        };

        match receiver.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Transport {
                address: key.address().to_string(),
                message: "pipeline terminated before settling".to_string(),
            }
            .into()),
        }
    }

    fn spawn_pipeline(&self, key: ResourceKey, size_hint: Option<SizeHint>) {
        let guard = SettleGuard::new(Arc::clone(&self.in_flight), key.clone());
        let cache = Arc::clone(&self.cache);
        let fetcher = Arc::clone(&self.fetcher);
        let codec = Arc::clone(&self.codec);

        tokio::spawn(async move {
            let outcome = run_pipeline(&cache, fetcher.as_ref(), codec, &key, size_hint).await;
            if let Err(e) = &outcome {
                warn!(key = %key, error = %e, "Resource load failed");
            }
            guard.settle(outcome);
        });
    }

    // == Administration ==
    /// Drops `key` from both tiers.
    pub async fn remove(&self, key: &ResourceKey) {
        self.cache.remove(key).await;
    }

    pub async fn clear_memory(&self) {
        self.cache.clear_memory().await;
    }

    pub async fn clear_disk(&self) {
        self.cache.clear_disk().await;
    }

    pub async fn run_disk_maintenance(&self) -> MaintenanceReport {
        self.cache.run_disk_maintenance().await
    }

    /// Point-in-time size of the disk tier in bytes.
    pub async fn disk_usage(&self) -> u64 {
        self.cache.disk_usage().await
    }

    /// Waits for scheduled disk writes to settle.
    pub async fn flush(&self) {
        self.cache.flush().await;
    }

    // == Diagnostics ==
    pub fn stats(&self) -> LoaderStats {
        self.in_flight.stats()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Number of keys with a pipeline currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cache(&self) -> &Arc<CacheCoordinator<C::Artifact>> {
        &self.cache
    }
}

/// Fetch, decode and cache one key.
async fn run_pipeline<C: Codec>(
    cache: &CacheCoordinator<C::Artifact>,
    fetcher: &dyn Fetcher,
    codec: Arc<C>,
    key: &ResourceKey,
    size_hint: Option<SizeHint>,
) -> Outcome<C::Artifact> {
    // A flight for this key may have settled between our miss and registration
    if let Some(artifact) = cache.memory_get(key).await {
        return Ok(artifact);
    }

    let bytes = fetcher.fetch(key.address()).await?;
    let fetched = bytes.len();

    let (decoded, bytes) = tokio::task::spawn_blocking(move || {
        let decoded = codec.decode(&bytes, size_hint);
        (decoded, bytes)
    })
    .await
    .map_err(|e| LoadError::from(DecodeError::new(format!("decoder panicked: {}", e))))?;
    let artifact = decoded?;

    cache.put(key, artifact.clone(), bytes).await;
    info!(key = %key, bytes = fetched, "Loaded resource from fetcher");
    Ok(artifact)
}
