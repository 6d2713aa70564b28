//! Bounded TTL cache of AI file selections.
//!
//! Keys are fingerprints of the normalized query and the candidate file
//! set. When full, inserting a new key evicts the entry with the oldest
//! `stored_at`; reads do not refresh an entry's position.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::similarity::normalize;
use crate::types::SelectionResult;

/// Default maximum number of cached selections.
pub const DEFAULT_CAPACITY: usize = 100;
/// Default time-to-live of a cached selection.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Derives the cache key for a query over a set of candidate files.
///
/// File order and duplicates do not affect the key.
pub fn fingerprint<S: AsRef<str>>(query: &str, file_names: &[S]) -> String {
    let mut names: Vec<&str> = file_names.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.dedup();
    format!("{}:{}", normalize(query), names.join("|"))
}

struct CacheEntry {
    result: SelectionResult,
    stored_at: Instant,
    hit_count: u64,
}

/// Snapshot of cache occupancy for monitoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub valid_entries: usize,
    pub total_hits: u64,
    /// Average hits per valid entry.
    pub hit_rate: f64,
}

/// Thread-safe selection cache.
pub struct SearchCache {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    /// Serializes inserts so eviction and insertion are one step.
    insert_lock: Mutex<()>,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl SearchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            ttl,
            insert_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &str) -> Option<SelectionResult> {
        self.get_at(key, Instant::now())
    }

    /// Returns the cached selection, dropping it if it has outlived the TTL.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<SelectionResult> {
        let ttl = self.ttl;
        let mut entry = self.entries.get_mut(key)?;
        if now.saturating_duration_since(entry.stored_at) > ttl {
            drop(entry);
            self.entries
                .remove_if(key, |_, e| now.saturating_duration_since(e.stored_at) > ttl);
            return None;
        }
        entry.hit_count += 1;
        Some(entry.result.clone())
    }

    pub fn set(&self, key: String, result: SelectionResult) {
        self.set_at(key, result, Instant::now());
    }

    pub fn set_at(&self, key: String, result: SelectionResult, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        let _guard = self.insert_lock.lock();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: now,
                hit_count: 0,
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().stored_at)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            tracing::debug!(%key, "evicting oldest cached selection");
            self.entries.remove(&key);
        }
    }

    /// Deletes all expired entries. Returns the count removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) <= ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Instant::now())
    }

    pub fn stats_at(&self, now: Instant) -> CacheStats {
        let mut valid_entries = 0;
        let mut total_hits = 0;
        for entry in &self.entries {
            if now.saturating_duration_since(entry.stored_at) <= self.ttl {
                valid_entries += 1;
                total_hits += entry.hit_count;
            }
        }
        CacheStats {
            size: self.entries.len(),
            valid_entries,
            total_hits,
            hit_rate: if valid_entries > 0 {
                total_hits as f64 / valid_entries as f64
            } else {
                0.0
            },
        }
    }
}
