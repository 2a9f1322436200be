//! LRU Tracker Module
//!
//! Recency ordering for the memory tier's eviction.

use std::collections::VecDeque;

use crate::key::ResourceKey;

// == LRU Tracker ==
/// Tracks access order of resource keys.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<ResourceKey>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if unknown.
    pub fn touch(&mut self, key: &ResourceKey) {
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &ResourceKey) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<ResourceKey> {
        self.order.pop_back()
    }

    // == Peek Oldest ==
    #[allow(dead_code)]
    pub fn peek_oldest(&self) -> Option<&ResourceKey> {
        self.order.back()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[allow(dead_code)]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
