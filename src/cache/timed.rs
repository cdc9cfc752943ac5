use std::hash::Hash;
use std::time::{Duration, Instant};

use ahash::RandomState;
use lru::LruCache;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Capacity- and TTL-bounded map with insertion-order eviction.
///
/// Backed by an unbounded `LruCache` that is only ever read with `peek`,
/// so the "least recently used" end is always the oldest insertion.
pub(crate) struct TimedCache<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>, RandomState>,
    capacity: usize,
    ttl: Duration,
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) evictions: u64,
    pub(crate) expirations: u64,
}

impl<K: Hash + Eq, V: Clone> TimedCache<K, V> {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        TimedCache {
            entries: LruCache::unbounded_with_hasher(RandomState::new()),
            capacity,
            ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let found = match self.entries.peek(key) {
            Some(entry) if now.duration_since(entry.inserted_at) <= self.ttl => {
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.pop(key);
                self.expirations += 1;
                None
            }
            None => None,
        };

        match found {
            Some(value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if !self.entries.contains(&key) && self.entries.len() >= self.capacity {
            self.prune();
        }

        self.entries.put(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop the oldest tenth of the capacity (at least one entry).
    fn prune(&mut self) {
        let target = (self.capacity / 10).max(1);
        let mut removed = 0;
        while removed < target {
            if self.entries.pop_lru().is_none() {
                break;
            }
            removed += 1;
        }
        self.evictions += removed as u64;
        tracing::debug!(removed, capacity = self.capacity, "Pruned cache");
    }

    /// Remove every entry older than the TTL.
    pub(crate) fn clear_expired(&mut self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        while let Some((_, oldest)) = self.entries.peek_lru() {
            if now.duration_since(oldest.inserted_at) <= self.ttl {
                break;
            }
            self.entries.pop_lru();
            removed += 1;
        }
        self.expirations += removed as u64;
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
        self.expirations = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
