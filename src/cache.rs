//! In-memory cache of resolved session IP addresses.
//!
//! Only new scheme lookups are cached: legacy hostnames always resolve to the same static
//! address and never touch storage. Each entry expires on whichever comes first of
//!
//! * its sliding window, restarted by every cache hit, and
//! * its absolute lifetime, counted from when it was inserted and never extended by hits.
//!
//! When the cache is full the least recently used entry makes room for the new one.
//!
//! The lock is only held for the map operation itself, never across a store or token lookup.

use crate::config::SessionCacheConfig;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    ip_address: String,
    created_at: Instant,
    last_touched: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, sliding: Duration, absolute: Duration) -> bool {
        now.duration_since(self.last_touched) >= sliding
            || now.duration_since(self.created_at) >= absolute
    }
}

#[derive(Debug)]
pub struct SessionCache {
    enabled: bool,
    sliding_expiration: Duration,
    absolute_expiration: Duration,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl SessionCache {
    #[must_use]
    pub fn new(config: &SessionCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        SessionCache {
            enabled: config.enabled,
            sliding_expiration: config.sliding_expiration,
            absolute_expiration: config.absolute_expiration,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up `key`, restarting its sliding window on a hit. A disabled cache always misses.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let now = Instant::now();
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(key) {
            if !entry.is_expired(now, self.sliding_expiration, self.absolute_expiration) {
                entry.last_touched = now;
                debug!(key, ip_address = %entry.ip_address, "session cache hit");
                return Some(entry.ip_address.clone());
            }
        } else {
            debug!(key, "session cache miss");
            return None;
        }

        entries.pop(key);
        debug!(key, "session cache entry expired");
        None
    }

    /// Insert or replace `key`. Replacing starts a fresh absolute lifetime. A disabled cache
    /// stores nothing.
    pub fn insert(&self, key: &str, ip_address: &str) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        let entry = CacheEntry {
            ip_address: ip_address.to_string(),
            created_at: now,
            last_touched: now,
        };
        let mut entries = self.lock();
        if entries.len() >= entries.cap().get() && !entries.contains(key) {
            self.drop_expired(&mut entries, now);
        }
        let evicted = entries.push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted.filter(|(k, _)| k != key) {
            debug!(key = %evicted_key, "session cache entry evicted for capacity");
        }
        debug!(key, ip_address, "session cache insert");
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.lock().pop(key).is_some();
        debug!(key, removed, "session cache remove");
        removed
    }

    /// Evict every entry, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        tracing::info!(count, "session cache cleared");
        count
    }

    /// Number of entries held, including ones that have expired but not been looked up since.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, so a full cache only evicts a live entry when nothing has
    /// expired.
    fn drop_expired(&self, entries: &mut LruCache<String, CacheEntry>, now: Instant) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| {
                entry.is_expired(now, self.sliding_expiration, self.absolute_expiration)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "expired session cache entries dropped");
        }
    }

    // Every critical section leaves the map consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
