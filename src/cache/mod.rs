//! Cache Module
//!
//! Memory tier with cost-aware LRU eviction, content-addressed disk tier with
//! age and size limits, and the coordinator that composes them.

mod coordinator;
mod disk;
mod lru;
mod memory;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use coordinator::CacheCoordinator;
pub use disk::{DiskRecord, DiskStore, MaintenanceReport};
pub use lru::LruTracker;
pub use memory::MemoryStore;
pub use stats::CacheStats;
