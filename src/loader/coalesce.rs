//! Request coalescing for resolve calls.
//!
//! Concurrent misses for the same resource key share one fetch+decode
//! pipeline. The first caller registers a flight and becomes its owner; later
//! callers subscribe to the flight's broadcast channel. When the pipeline
//! settles, the flight is removed from the table and its outcome is broadcast
//! to every subscriber still listening.
//!
//! ```text
//! resolve(k) A ─┐
//!               │                         Pipeline
//! resolve(k) B ─┼──► InFlightTable ─────► fetch → decode → cache.put
//!               │         │                     │
//! resolve(k) C ─┘         ▼                     ▼
//!                 [A, B, C receive         [one task]
//!                  the same outcome]◄───────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::LoadError;
use crate::key::ResourceKey;

/// Settled result of one flight.
pub(crate) type Outcome<A> = Result<A, LoadError>;

// == Loader Stats ==
/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoaderStats {
    /// Resolve calls that missed both tiers and reached the table
    pub total_requests: u64,
    /// Calls that joined a flight already in progress
    pub coalesced_requests: u64,
    /// Calls that started a new pipeline
    pub pipelines_started: u64,
}

impl LoaderStats {
    /// Returns the coalescing ratio (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

// == Registration ==
/// What a caller should do after registering interest in a key.
pub(crate) enum Registration<A> {
    /// No flight existed: the caller must start the pipeline.
    Owner(broadcast::Receiver<Outcome<A>>),
    /// A flight is in progress: wait for its outcome.
    Joined(broadcast::Receiver<Outcome<A>>),
}

#[derive(Debug)]
struct Flights<A> {
    senders: HashMap<ResourceKey, broadcast::Sender<Outcome<A>>>,
    stats: LoaderStats,
}

// == In-Flight Table ==
/// At most one flight per resource key.
#[derive(Debug)]
pub(crate) struct InFlightTable<A> {
    flights: Mutex<Flights<A>>,
}

impl<A: Clone> InFlightTable<A> {
    pub(crate) fn new() -> Self {
        Self {
            flights: Mutex::new(Flights {
                senders: HashMap::new(),
                stats: LoaderStats::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Flights<A>> {
        self.flights
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Joins the flight for `key`, or registers a new one (insert-if-absent).
    pub(crate) fn register(&self, key: &ResourceKey) -> Registration<A> {
        let mut flights = self.lock();
        flights.stats.total_requests += 1;

        if let Some(tx) = flights.senders.get(key) {
            let rx = tx.subscribe();
            flights.stats.coalesced_requests += 1;
            debug!(key = %key, "Joining in-flight request");
            Registration::Joined(rx)
        } else {
            // One value is ever sent per flight
            let (tx, rx) = broadcast::channel(1);
            flights.senders.insert(key.clone(), tx);
            flights.stats.pipelines_started += 1;
            debug!(key = %key, in_flight = flights.senders.len(), "Starting new request");
            Registration::Owner(rx)
        }
    }

    /// Removes the flight for `key` and broadcasts its outcome.
    ///
    /// `None` closes the channel without a value, which waiters observe as an
    /// aborted pipeline.
    fn settle(&self, key: &ResourceKey, outcome: Option<Outcome<A>>) {
        let sender = self.lock().senders.remove(key);
        let (Some(tx), Some(outcome)) = (sender, outcome) else {
            return;
        };

        let waiters = tx.receiver_count();
        // Send fails only when every waiter has gone away
        let _ = tx.send(outcome);
        debug!(key = %key, waiters, "Broadcast settled outcome");
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub(crate) fn stats(&self) -> LoaderStats {
        self.lock().stats.clone()
    }
}

// == Settle Guard ==
/// Owned by the pipeline task. Removes the flight exactly once: when the
/// outcome is delivered, or when the task dies without one.
pub(crate) struct SettleGuard<A: Clone> {
    table: Arc<InFlightTable<A>>,
    key: ResourceKey,
    outcome: Option<Outcome<A>>,
}

impl<A: Clone> SettleGuard<A> {
    pub(crate) fn new(table: Arc<InFlightTable<A>>, key: ResourceKey) -> Self {
        Self {
            table,
            key,
            outcome: None,
        }
    }

    pub(crate) fn settle(mut self, outcome: Outcome<A>) {
        self.outcome = Some(outcome);
    }
}

impl<A: Clone> Drop for SettleGuard<A> {
    fn drop(&mut self) {
        self.table.settle(&self.key, self.outcome.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, FetchError};
    use tokio::sync::broadcast::error::RecvError;

    fn owner_rx(reg: Registration<String>) -> broadcast::Receiver<Outcome<String>> {
        match reg {
            Registration::Owner(rx) => rx,
            Registration::Joined(_) => panic!("expected to own the flight"),
        }
    }

    fn joined_rx(reg: Registration<String>) -> broadcast::Receiver<Outcome<String>> {
        match reg {
            Registration::Joined(rx) => rx,
            Registration::Owner(_) => panic!("expected to join the flight"),
        }
    }

    #[tokio::test]
    async fn test_first_registration_owns_later_ones_join() {
        let table = Arc::new(InFlightTable::new());
        let key = ResourceKey::new("a");

        let mut owner = owner_rx(table.register(&key));
        let mut joined = joined_rx(table.register(&key));
        assert_eq!(table.len(), 1);

        SettleGuard::new(Arc::clone(&table), key.clone()).settle(Ok("art".to_string()));

        assert_eq!(owner.recv().await.unwrap(), Ok("art".to_string()));
        assert_eq!(joined.recv().await.unwrap(), Ok("art".to_string()));
        assert_eq!(table.len(), 0);

        let stats = table.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.coalesced_requests, 1);
        assert_eq!(stats.pipelines_started, 1);
        assert_eq!(stats.coalescing_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_failure_is_identical_for_all_waiters() {
        let table = Arc::new(InFlightTable::new());
        let key = ResourceKey::new("a");
        let mut receivers = vec![owner_rx(table.register(&key))];
        for _ in 0..3 {
            receivers.push(joined_rx(table.register(&key)));
        }

        let error = LoadError::from(DecodeError::new("bad header"));
        SettleGuard::new(Arc::clone(&table), key).settle(Err(error.clone()));

        for rx in receivers.iter_mut() {
            assert_eq!(rx.recv().await.unwrap(), Err(error.clone()));
        }
    }

    #[tokio::test]
    async fn test_dropped_guard_removes_flight_and_closes_channel() {
        let table: Arc<InFlightTable<String>> = Arc::new(InFlightTable::new());
        let key = ResourceKey::new("a");
        let mut rx = owner_rx(table.register(&key));

        drop(SettleGuard::new(Arc::clone(&table), key.clone()));

        assert_eq!(table.len(), 0);
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        // A new registration starts a fresh flight
        assert!(matches!(table.register(&key), Registration::Owner(_)));
    }

    #[tokio::test]
    async fn test_settle_without_waiters() {
        let table = Arc::new(InFlightTable::new());
        let key = ResourceKey::new("a");
        drop(owner_rx(table.register(&key)));

        SettleGuard::new(Arc::clone(&table), key).settle(Err(LoadError::from(
            FetchError::BadStatus {
                address: "a".to_string(),
                status: 500,
            },
        )));

        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_distinct_keys_get_distinct_flights() {
        let table: InFlightTable<String> = InFlightTable::new();
        let plain = ResourceKey::new("a");
        let variant = ResourceKey::with_variant("a", "10x10");

        assert!(matches!(table.register(&plain), Registration::Owner(_)));
        assert!(matches!(table.register(&variant), Registration::Owner(_)));
        assert_eq!(table.len(), 2);
    }
}
