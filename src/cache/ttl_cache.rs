//! Bounded TTL Cache
//!
//! Thread-safe key→value store with per-entry TTL from insertion, a size
//! cap with approximate oldest-first eviction, and hit/miss accounting.
//! Backs the reference-data, partner/unit and dedup caches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Entries inspected per eviction round when the cache is at capacity.
const EVICTION_SAMPLE: usize = 16;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded, TTL-expiring concurrent cache.
pub struct TtlCache<V> {
    name: &'static str,
    entries: DashMap<String, CacheEntry<V>>,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(name: &'static str, max_size: usize, ttl: Duration) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            max_size: max_size.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a live entry, expiring it in place if its TTL has lapsed.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.inserted_at.elapsed() < self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::record_cache_hit(self.name);
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_miss(self.name);
        None
    }

    /// Insert or overwrite, evicting first if at capacity.
    pub fn insert(&self, key: String, value: V) {
        self.evict_if_full();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Atomic put-if-absent. Returns true iff the key was absent or its
    /// previous entry had expired, i.e. the caller now owns the claim.
    pub fn insert_if_absent(&self, key: &str, value: V) -> bool {
        self.evict_if_full();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().inserted_at.elapsed() < self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::record_cache_hit(self.name);
                    false
                } else {
                    occupied.insert(CacheEntry {
                        value,
                        inserted_at: Instant::now(),
                    });
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::record_cache_miss(self.name);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    value,
                    inserted_at: Instant::now(),
                });
                self.misses.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_cache_miss(self.name);
                true
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop all entries whose TTL has lapsed.
    pub fn sweep_expired(&self) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(cache = self.name, removed, "swept expired cache entries");
        }
    }

    /// Keep the cache under its size cap: sweep expired entries first,
    /// then evict the oldest of a small sample until under the cap.
    fn evict_if_full(&self) {
        if self.entries.len() < self.max_size {
            return;
        }
        self.sweep_expired();
        while self.entries.len() >= self.max_size {
            let oldest = self
                .entries
                .iter()
                .take(EVICTION_SAMPLE)
                .min_by_key(|e| e.value().inserted_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Spawn a background sweep loop for a cache, in the spirit of the
/// cleanup tasks the admin surface relies on for honest size stats.
pub fn start_cleanup<V: Clone + Send + Sync + 'static>(
    cache: Arc<TtlCache<V>>,
    every: Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            cache.sweep_expired();
        }
    });
}
