//! Concurrent store of per-key request counters.

use dashmap::DashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::{LimitRule, RequestCounter};

/// Map from key to fixed-window counter, shared by every in-flight request.
///
/// Counters are created on first use and live until the store is dropped,
/// unless [`CounterStore::evict_idle`] is called. Each counter carries its
/// own lock; the map shard lock is only held while looking a counter up.
pub struct CounterStore<K> {
    counters: DashMap<K, Arc<RequestCounter>>,
    clock: Arc<dyn Clock>,
}

impl<K> CounterStore<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create a store backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
        }
    }

    /// Count one request for `key` and report whether it fits under `rule`.
    ///
    /// Increments for the same key are serialized; keys never wait on each
    /// other.
    pub fn check_and_increment(&self, key: &K, rule: &LimitRule) -> bool {
        debug_assert!(rule.max_requests > 0, "max_requests must be positive");
        debug_assert!(!rule.window.is_zero(), "window must be positive");

        let now = self.clock.now_millis();
        let counter = self.counter_for(key, now);
        let admitted = counter.check_and_increment(now, rule);

        trace!(
            key = ?key,
            admitted,
            max_requests = rule.max_requests,
            "Checked request counter"
        );

        admitted
    }

    /// Get the counter for `key`, inserting a fresh one if absent.
    ///
    /// The returned handle is cloned out so the shard guard is released
    /// before the counter lock is taken.
    fn counter_for(&self, key: &K, now: u64) -> Arc<RequestCounter> {
        if let Some(counter) = self.counters.get(key) {
            return Arc::clone(counter.value());
        }

        let entry = self.counters.entry(key.clone()).or_insert_with(|| {
            debug!(key = ?key, "Creating new request counter");
            Arc::new(RequestCounter::new(now))
        });
        Arc::clone(entry.value())
    }

    /// Requests counted for `key` in its current window.
    ///
    /// Returns `None` if no counter exists for the key.
    pub fn current_count(&self, key: &K) -> Option<u64> {
        self.counters.get(key).map(|c| c.count())
    }

    /// Remove counters whose window opened more than `idle_for` ago.
    ///
    /// `idle_for` must be at least as long as every window the counters are
    /// checked against, or a client over its ceiling is forgotten early.
    /// Counters held by an in-flight check are kept. Returns the number of
    /// counters removed.
    pub fn evict_idle(&self, idle_for: Duration) -> usize {
        let now = self.clock.now_millis();
        let idle_ms = idle_for.as_millis() as u64;
        let before = self.counters.len();

        // Clones are only taken under a shard lock, which retain holds
        self.counters.retain(|_, counter| {
            Arc::strong_count(counter) > 1
                || now.saturating_sub(counter.window_start()) <= idle_ms
        });

        let evicted = before.saturating_sub(self.counters.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.counters.len(), "Evicted idle counters");
        }
        evicted
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }

    /// Get the number of tracked counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl<K> Default for CounterStore<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
