//! Tiered Cache - A two-tier resource cache with request coalescing
//!
//! Serves decoded artifacts from memory, then from a content-addressed disk
//! store, and otherwise fetches each resource exactly once no matter how many
//! callers ask for it concurrently.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod loader;
pub mod tasks;

pub use cache::{CacheCoordinator, CacheStats, MaintenanceReport};
pub use config::Config;
pub use error::{DecodeError, FetchError, LoadError, StorageError};
pub use key::{ResourceKey, SizeHint};
pub use loader::{
    Artifact, Codec, Fetcher, HttpFetcher, Loader, LoaderStats, RawArtifact, RawCodec, ResolveSlot,
};
pub use tasks::{spawn_maintenance_task, spawn_pressure_listener};
