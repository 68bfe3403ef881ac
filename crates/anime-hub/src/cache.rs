//! In-memory response cache with per-entry time-to-live.
//!
//! Values are stored as JSON snapshots so a single cache can hold every
//! payload category (search pages, details, listings). When the store grows
//! past `max_entries` the entry that was inserted first is dropped. Reads do
//! not refresh an entry's position, so this is insertion-order eviction and
//! only an approximation of LRU.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::config::CacheConfig;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Build a deterministic cache key from a data category, query and page
pub fn cache_key(kind: &str, query: impl std::fmt::Display, page: u32) -> String {
    format!("{}_{}_{}", kind, query, page)
}

/// Time-to-live per data category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub search_results: Duration,
    pub details: Duration,
    pub trending: Duration,
    pub top_rated: Duration,
}

impl From<&CacheConfig> for CacheTtl {
    fn from(config: &CacheConfig) -> Self {
        Self {
            search_results: config.search_results_ttl(),
            details: config.details_ttl(),
            trending: config.trending_ttl(),
            top_rated: config.top_rated_ttl(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }
}

/// TTL cache with insertion-order eviction
#[derive(Debug)]
pub struct TtlCache {
    entries: HashMap<String, CacheEntry>,
    /// Keys in first-insertion order
    order: VecDeque<String>,
    max_entries: usize,
}

impl TtlCache {
    /// Create a new cache holding at most `max_entries` items
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    /// Get a cached item if it exists and has not expired
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        self.get_at(key, Instant::now())
    }

    /// Same as [`TtlCache::get`] with an explicit clock reading
    pub fn get_at<T: DeserializeOwned>(&mut self, key: &str, now: Instant) -> Option<T> {
        let entry = match self.entries.get(key) {
            Some(entry) => entry,
            None => {
                debug!(key = key, "Cache miss");
                return None;
            }
        };

        if !entry.is_valid_at(now) {
            debug!(key = key, "Cache entry expired");
            self.remove(key);
            return None;
        }

        match serde_json::from_value(entry.value.clone()) {
            Ok(data) => {
                debug!(key = key, "Cache hit");
                Some(data)
            }
            Err(e) => {
                warn!(key = key, error = %e, "Cached value has unexpected shape, dropping");
                self.remove(key);
                None
            }
        }
    }

    /// Store an item in the cache
    pub fn set<T: Serialize>(&mut self, key: &str, data: &T, ttl: Duration) {
        self.set_at(key, data, ttl, Instant::now());
    }

    /// Same as [`TtlCache::set`] with an explicit clock reading
    pub fn set_at<T: Serialize>(&mut self, key: &str, data: &T, ttl: Duration, now: Instant) {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to serialize cache data");
                return;
            }
        };

        let entry = CacheEntry {
            value,
            inserted_at: now,
            ttl,
        };

        // Overwriting keeps the original insertion position
        if self.entries.insert(key.to_string(), entry).is_none() {
            self.order.push_back(key.to_string());
        }
        debug!(key = key, ttl_secs = ttl.as_secs(), "Cache stored");

        while self.entries.len() > self.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    debug!(key = %oldest, "Evicting oldest cache entry");
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Check if a live cache entry exists
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.is_valid_at(Instant::now()))
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}
