use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::CreatePortfolio;
use crate::services::name_validator;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const MAX_BATCH_KEY_LENGTH: usize = 500;

/// Cache key for a whole batch.
///
/// `key` is the readable fingerprint (sorted `name:version` pairs, truncated
/// past [`MAX_BATCH_KEY_LENGTH`]); `digest` covers the untruncated contents,
/// including explicit creation dates, so two batches that share a truncated
/// key never share a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchKey {
    key: String,
    digest: u64,
}

impl BatchKey {
    pub fn from_items(items: &[CreatePortfolio]) -> Self {
        let mut entries: Vec<(String, i32, Option<DateTime<Utc>>)> = items
            .iter()
            .map(|item| {
                (
                    normalize_name(&item.name),
                    item.version.unwrap_or(1),
                    item.date_created,
                )
            })
            .collect();
        entries.sort();

        let mut hasher = DefaultHasher::new();
        entries.hash(&mut hasher);

        let full = entries
            .iter()
            .map(|(name, version, _)| format!("{}:{}", name, version))
            .collect::<Vec<_>>()
            .join("|");

        let key = if full.chars().count() > MAX_BATCH_KEY_LENGTH {
            let head: String = full.chars().take(MAX_BATCH_KEY_LENGTH).collect();
            format!("{}...({})", head, items.len())
        } else {
            full
        };

        Self {
            key,
            digest: hasher.finish(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

/// Trim + lowercase, the normalization used for duplicate and existence checks.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub cache_size: usize,
    pub hit_rate: f64,
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
}

struct Inner {
    name_format: LruCache<String, bool>,
    existence: LruCache<String, bool>,
    batches: LruCache<String, (u64, bool)>,
    counters: Counters,
    /// Bumped by every existence write or clear; see `record_observed_existence`.
    existence_generation: u64,
}

impl Inner {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            name_format: LruCache::new(capacity),
            existence: LruCache::new(capacity),
            batches: LruCache::new(capacity),
            counters: Counters::default(),
            existence_generation: 0,
        }
    }

    fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.counters.hits += 1;
        } else {
            self.counters.misses += 1;
        }
    }
}

/// Inserts and reports whether the least recently used entry was pushed out.
fn insert<V>(cache: &mut LruCache<String, V>, key: String, value: V) -> bool {
    let replacing = cache.contains(&key);
    cache.push(key, value).is_some() && !replacing
}

/// Bounded LRU memo of validation outcomes, shared by every in-flight request.
///
/// Three independent keyspaces, each holding up to `capacity` entries:
/// name format verdicts, name existence observations and batch verdicts.
/// A miss always falls through to full validation, so the cache only
/// affects latency.
pub struct ValidationCache {
    capacity: NonZeroUsize,
    inner: Mutex<Inner>,
}

impl ValidationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        info!("ValidationCache initialized with capacity {}", capacity);
        Self {
            capacity,
            inner: Mutex::new(Inner::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn get_or_validate_name_format(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }

        let mut inner = self.inner.lock();
        if let Some(&valid) = inner.name_format.get(name) {
            inner.record_lookup(true);
            return valid;
        }
        inner.record_lookup(false);

        let valid = name_validator::is_valid_format(name);
        if insert(&mut inner.name_format, name.to_string(), valid) {
            inner.counters.evictions += 1;
        }
        valid
    }

    pub fn cached_batch_result(&self, key: &BatchKey) -> Option<bool> {
        let mut inner = self.inner.lock();
        let cached = match inner.batches.get(&key.key) {
            Some(&(digest, valid)) if digest == key.digest => Some(valid),
            _ => None,
        };
        inner.record_lookup(cached.is_some());
        match cached {
            Some(valid) => debug!("Batch validation cache hit: {} -> {}", key.key, valid),
            None => debug!("Batch validation cache miss: {}", key.key),
        }
        cached
    }

    pub fn put_batch_result(&self, key: BatchKey, valid: bool) {
        let mut inner = self.inner.lock();
        if insert(&mut inner.batches, key.key, (key.digest, valid)) {
            inner.counters.evictions += 1;
        }
    }

    /// Records an existence fact known to be current, e.g. right after a create.
    pub fn record_existence(&self, name: &str, exists: bool) {
        if name.trim().is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.existence_generation += 1;
        if insert(&mut inner.existence, normalize_name(name), exists) {
            inner.counters.evictions += 1;
        }
    }

    /// Generation to pair with a store lookup started now.
    pub fn existence_generation(&self) -> u64 {
        self.inner.lock().existence_generation
    }

    /// Records the result of a store lookup started at `observed_at`. The
    /// result is dropped when any existence write or clear happened since,
    /// because the lookup may predate it. Returns whether it was stored.
    pub fn record_observed_existence(&self, name: &str, exists: bool, observed_at: u64) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.existence_generation != observed_at {
            debug!("Discarding stale existence lookup for '{}'", name);
            return false;
        }
        if insert(&mut inner.existence, normalize_name(name), exists) {
            inner.counters.evictions += 1;
        }
        true
    }

    pub fn cached_existence(&self, name: &str) -> Option<bool> {
        if name.trim().is_empty() {
            return None;
        }
        let mut inner = self.inner.lock();
        let cached = inner.existence.get(&normalize_name(name)).copied();
        inner.record_lookup(cached.is_some());
        cached
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total_requests = inner.counters.hits + inner.counters.misses;
        CacheStats {
            hits: inner.counters.hits,
            misses: inner.counters.misses,
            evictions: inner.counters.evictions,
            total_requests,
            cache_size: inner.name_format.len() + inner.existence.len() + inner.batches.len(),
            hit_rate: if total_requests > 0 {
                inner.counters.hits as f64 / total_requests as f64
            } else {
                0.0
            },
        }
    }

    /// Drops every entry and resets the statistics.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let generation = inner.existence_generation + 1;
        *inner = Inner::new(self.capacity);
        inner.existence_generation = generation;
        info!("ValidationCache cleared");
    }

    /// Drops only existence observations, which go stale whenever the store changes.
    pub fn clear_existence(&self) {
        let mut inner = self.inner.lock();
        inner.existence.clear();
        inner.existence_generation += 1;
        debug!("ValidationCache existence entries cleared");
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
