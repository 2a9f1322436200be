//! Cache Statistics Module
//!
//! Tracks tier hits, misses and memory evictions.

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of cache activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered by the memory tier
    pub memory_hits: u64,
    /// Lookups answered by the disk tier (and promoted to memory)
    pub disk_hits: u64,
    /// Lookups answered by neither tier
    pub misses: u64,
    /// Memory entries evicted to stay within the cost/count limits
    pub evictions: u64,
    /// Current number of entries in the memory tier
    pub total_entries: usize,
    /// Current summed cost of the memory tier
    pub total_cost: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns (memory + disk hits) / lookups, or 0.0 if no lookups happened.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Updates the occupancy gauges.
    pub fn set_occupancy(&mut self, entries: usize, cost: usize) {
        self.total_entries = entries;
        self.total_cost = cost;
    }
}
