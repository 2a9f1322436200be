//! Memory Store Module
//!
//! Bounded in-process cache of decoded artifacts with cost-aware LRU eviction.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::LruTracker;
use crate::key::ResourceKey;

// == Memory Entry ==
#[derive(Debug, Clone)]
struct MemoryEntry<A> {
    artifact: A,
    cost: usize,
}

// == Memory Store ==
/// Decoded artifacts keyed by resource key.
///
/// Never touches persistent storage and never fails. Both the entry count and
/// the summed cost are kept within their limits after every insertion.
#[derive(Debug)]
pub struct MemoryStore<A> {
    entries: HashMap<ResourceKey, MemoryEntry<A>>,
    lru: LruTracker,
    total_cost: usize,
    cost_limit: usize,
    count_limit: usize,
    evictions: u64,
}

impl<A: Clone> MemoryStore<A> {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `cost_limit` - Maximum summed cost of all entries
    /// * `count_limit` - Maximum number of entries
    pub fn new(cost_limit: usize, count_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            total_cost: 0,
            cost_limit,
            count_limit,
            evictions: 0,
        }
    }

    // == Put ==
    /// Inserts or overwrites an entry, then evicts least recently used entries
    /// until both limits hold.
    ///
    /// The cost of an overwritten entry is replaced, never accumulated. An
    /// entry whose cost alone exceeds the limit is evicted last, so the store
    /// ends up empty rather than over budget.
    pub fn put(&mut self, key: ResourceKey, artifact: A, cost: usize) {
        if let Some(previous) = self.entries.remove(&key) {
            self.total_cost -= previous.cost;
        }

        self.total_cost += cost;
        self.lru.touch(&key);
        self.entries.insert(key, MemoryEntry { artifact, cost });

        self.evict_to_limits();
    }

    // == Get ==
    /// Returns the artifact and marks it most recently used.
    pub fn get(&mut self, key: &ResourceKey) -> Option<A> {
        let artifact = self.entries.get(key)?.artifact.clone();
        self.lru.touch(key);
        Some(artifact)
    }

    // == Remove ==
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.total_cost -= entry.cost;
                self.lru.remove(key);
                true
            }
            None => false,
        }
    }

    // == Remove All ==
    /// Drops every entry. Used on memory pressure and explicit clears.
    pub fn remove_all(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.total_cost = 0;
        debug!(dropped, "Memory tier cleared");
    }

    fn evict_to_limits(&mut self) {
        while self.entries.len() > self.count_limit || self.total_cost > self.cost_limit {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.total_cost -= entry.cost;
                self.evictions += 1;
                debug!(key = %oldest, cost = entry.cost, "Evicted memory entry");
            }
        }
    }

    // == Accessors ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    /// Number of entries evicted by the limits since construction.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ResourceKey {
        ResourceKey::new(s)
    }

    #[test]
    fn test_put_and_get() {
        let mut store = MemoryStore::new(1000, 10);
        store.put(key("a"), "artifact-a".to_string(), 10);

        assert_eq!(store.get(&key("a")), Some("artifact-a".to_string()));
        assert_eq!(store.get(&key("b")), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_cost(), 10);
    }

    #[test]
    fn test_overwrite_replaces_cost() {
        let mut store = MemoryStore::new(1000, 10);
        store.put(key("a"), "v1".to_string(), 100);
        store.put(key("a"), "v2".to_string(), 40);

        assert_eq!(store.len(), 1);
        assert_eq!(store.total_cost(), 40);
        assert_eq!(store.get(&key("a")), Some("v2".to_string()));
    }

    #[test]
    fn test_count_limit_evicts_lru() {
        let mut store = MemoryStore::new(1000, 3);
        store.put(key("a"), 1, 1);
        store.put(key("b"), 2, 1);
        store.put(key("c"), 3, 1);
        store.put(key("d"), 4, 1);

        assert_eq!(store.len(), 3);
        assert!(!store.contains(&key("a")));
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn test_cost_limit_evicts_until_within() {
        let mut store = MemoryStore::new(100, 10);
        store.put(key("a"), 1, 40);
        store.put(key("b"), 2, 40);
        store.put(key("c"), 3, 50);

        assert!(store.total_cost() <= 100);
        assert!(!store.contains(&key("a")));
        assert!(store.contains(&key("b")));
        assert!(store.contains(&key("c")));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut store = MemoryStore::new(1000, 3);
        store.put(key("a"), 1, 1);
        store.put(key("b"), 2, 1);
        store.put(key("c"), 3, 1);

        store.get(&key("a"));
        store.put(key("d"), 4, 1);

        assert!(store.contains(&key("a")));
        assert!(!store.contains(&key("b")));
    }

    #[test]
    fn test_oversized_entry_is_not_retained() {
        let mut store = MemoryStore::new(100, 10);
        store.put(key("small"), 1, 10);
        store.put(key("huge"), 2, 500);

        assert!(store.is_empty());
        assert_eq!(store.total_cost(), 0);
    }

    #[test]
    fn test_remove_and_remove_all() {
        let mut store = MemoryStore::new(1000, 10);
        store.put(key("a"), 1, 10);
        store.put(key("b"), 2, 20);

        assert!(store.remove(&key("a")));
        assert!(!store.remove(&key("a")));
        assert_eq!(store.total_cost(), 20);

        store.remove_all();
        assert!(store.is_empty());
        assert_eq!(store.total_cost(), 0);
        assert_eq!(store.get(&key("b")), None);
    }
}
