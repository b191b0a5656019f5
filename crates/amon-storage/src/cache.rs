//! Named response caches with TTL expiration and LRU eviction.
//!
//! A cache is `(name, capacity, ttl)`; capacity 0 means unbounded. Both
//! positive and negative lookup results are cached (callers store an
//! `Option<T>` where absence matters), so a known-absent entity is as
//! cheap to answer as a present one. A construction-time `enabled`
//! sentinel turns the cache into a pass-through: every `get` misses and
//! every `set` is a no-op.
//!
//! Hit/miss/eviction counts are emitted as `tracing::debug` fields.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Slot<V> {
    value: V,
    inserted_at: Instant,
    /// Logical access clock for LRU eviction.
    last_access: u64,
}

struct Inner<V> {
    map: HashMap<String, Slot<V>>,
    tick: u64,
}

pub struct Cache<V: Clone> {
    name: &'static str,
    capacity: usize,
    ttl: Duration,
    enabled: bool,
    inner: Mutex<Inner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> Cache<V> {
    pub fn new(name: &'static str, capacity: usize, ttl: Duration, enabled: bool) -> Self {
        Self {
            name,
            capacity,
            ttl,
            enabled,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                tick: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// A hit returns the cached value; expired entries are removed and
    /// count as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        match inner.map.get_mut(key) {
            Some(slot) if slot.inserted_at.elapsed() <= self.ttl => {
                slot.last_access = tick;
                let value = slot.value.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache = self.name, key = %key, "cache hit");
                Some(value)
            }
            Some(_) => {
                inner.map.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache = self.name, key = %key, "cache expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace, refreshing the TTL. When the cache is bounded
    /// and full, the least recently used entry is evicted first.
    pub fn set(&self, key: &str, value: V) {
        if !self.enabled {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        if self.capacity > 0
            && inner.map.len() >= self.capacity
            && !inner.map.contains_key(key)
        {
            if let Some(lru_key) = inner
                .map
                .iter()
                .min_by_key(|(_, slot)| slot.last_access)
                .map(|(k, _)| k.clone())
            {
                inner.map.remove(&lru_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache = self.name, key = %lru_key, "cache eviction");
            }
        }

        inner.map.insert(
            key.to_string(),
            Slot {
                value,
                inserted_at: Instant::now(),
                last_access: tick,
            },
        );
    }

    pub fn del(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.map.remove(key);
    }

    /// Empty the cache.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.map.clear();
        tracing::debug!(cache = self.name, "cache reset");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses, evictions)` since construction.
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
        )
    }
}
