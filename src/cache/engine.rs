//! Cache Engine Module
//!
//! Bounded key/value cache combining an access-ordered table with TTL
//! expiration and memory-ceiling LRU eviction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheMetrics, MAX_KEY_LENGTH};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Table ==
/// Entry table and counters, always mutated together under one lock.
///
/// `entries` iterates in access order: index 0 is the least recently used
/// entry, the last index the most recently used.
#[derive(Debug)]
pub(super) struct CacheTable {
    pub(super) entries: IndexMap<String, CacheEntry>,
    pub(super) metrics: CacheMetrics,
}

impl CacheTable {
    fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            metrics: CacheMetrics::new(),
        }
    }

    /// Looks up a key, counting one hit or one miss.
    fn lookup(&mut self, key: &str) -> Option<Value> {
        let found = self.lookup_uncounted(key);
        if found.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
        found
    }

    /// Looks up and touches a live entry without counting a hit or miss.
    ///
    /// An expired entry is still removed and counted as an eviction.
    fn lookup_uncounted(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.get_index_of(key)?;

        let expired = self
            .entries
            .get_index(idx)
            .is_some_and(|(_, entry)| entry.is_expired());
        if expired {
            if let Some((_, entry)) = self.entries.shift_remove_index(idx) {
                self.metrics.record_eviction(entry.size_bytes);
                debug!(key, "dropped expired entry on read");
            }
            return None;
        }

        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        let (_, entry) = self.entries.get_index_mut(last)?;
        entry.touch();
        Some(entry.value.clone())
    }

    /// Inserts an entry, evicting from the LRU end until it fits.
    ///
    /// Returns false when the entry alone is larger than `limit`; any previous
    /// value under the same key is dropped in that case so it cannot be served stale.
    pub(super) fn insert(&mut self, entry: CacheEntry, limit: usize) -> bool {
        let is_new = match self.entries.shift_remove(&entry.key) {
            Some(old) => {
                self.metrics.release(old.size_bytes);
                false
            }
            None => true,
        };

        if entry.size_bytes > limit {
            warn!(
                key = %entry.key,
                size = entry.size_bytes,
                limit,
                "value larger than the memory ceiling, not cached"
            );
            self.metrics.total_entries = self.entries.len();
            return false;
        }

        while self.metrics.total_memory_bytes + entry.size_bytes > limit {
            let Some((evicted_key, evicted)) = self.entries.shift_remove_index(0) else {
                break;
            };
            self.metrics.record_eviction(evicted.size_bytes);
            debug!(key = %evicted_key, size = evicted.size_bytes, "evicted least recently used entry");
        }

        self.metrics.reserve(entry.size_bytes);
        if is_new {
            self.metrics.record_set();
        }
        self.entries.insert(entry.key.clone(), entry);
        self.metrics.total_entries = self.entries.len();
        true
    }

    fn remove_where<F>(&mut self, mut remove: F, as_eviction: bool) -> usize
    where
        F: FnMut(&str, &CacheEntry) -> bool,
    {
        let mut removed = 0;
        let mut released = Vec::new();
        self.entries.retain(|key, entry| {
            if remove(key, entry) {
                removed += 1;
                released.push(entry.size_bytes);
                false
            } else {
                true
            }
        });

        for size in released {
            if as_eviction {
                self.metrics.record_eviction(size);
            } else {
                self.metrics.release(size);
            }
        }
        self.metrics.total_entries = self.entries.len();
        removed
    }
}

// == Intelligent Cache ==
/// Thread-safe bounded cache with TTL expiry, LRU eviction under a memory
/// ceiling, named TTL categories and optional snapshot persistence.
///
/// Share one instance per process behind an `Arc`.
#[derive(Debug)]
pub struct IntelligentCache {
    pub(super) table: Mutex<CacheTable>,
    /// Per-key gates that serialize concurrent producers in `get_or_set`
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    memory_limit: usize,
    default_ttl: u64,
    category_ttls: HashMap<String, u64>,
    pub(super) persist_min_ttl: u64,
}

impl IntelligentCache {
    // == Constructor ==
    /// Creates an empty cache from the given settings.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            table: Mutex::new(CacheTable::new()),
            inflight: Mutex::new(HashMap::new()),
            memory_limit: config.memory_limit_bytes,
            default_ttl: config.default_ttl,
            category_ttls: config.category_ttls,
            persist_min_ttl: config.persist_min_ttl,
        }
    }

    /// Creates a cache and warms it from a snapshot file.
    ///
    /// A missing or unreadable snapshot leaves the cache empty.
    pub fn with_persistence(config: CacheConfig, snapshot: impl AsRef<Path>) -> Self {
        let cache = Self::new(config);
        let path = snapshot.as_ref();
        if let Err(e) = cache.load_snapshot(path) {
            warn!(path = %path.display(), error = %e, "ignoring unreadable cache snapshot");
        }
        cache
    }

    // == TTL Resolution ==
    /// Explicit TTL wins, then the category table, then the default.
    ///
    /// A resolved TTL of 0 means the entry never expires.
    fn resolve_ttl(&self, ttl: Option<u64>, category: Option<&str>) -> Option<u64> {
        let seconds = match (ttl, category) {
            (Some(ttl), _) => ttl,
            (None, Some(name)) => match self.category_ttls.get(name) {
                Some(ttl) => *ttl,
                None => {
                    warn!(category = name, "unknown cache category, using default TTL");
                    self.default_ttl
                }
            },
            (None, None) => self.default_ttl,
        };
        (seconds > 0).then_some(seconds)
    }

    // == Get ==
    /// Retrieves a copy of the value stored under `key`.
    ///
    /// Expired entries are removed, counted as an eviction and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.table.lock().lookup(key)
    }

    /// Retrieves a value, returning `default` on a miss.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    // == Set ==
    /// Stores a value, evicting least recently used entries to stay under the
    /// memory ceiling.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Explicit TTL in seconds
    /// * `category` - Named TTL class, consulted when `ttl` is None
    pub fn set(
        &self,
        key: impl Into<String>,
        value: Value,
        ttl: Option<u64>,
        category: Option<&str>,
    ) -> Result<()> {
        let key = key.into();
        validate_key(&key)?;

        let entry = CacheEntry::new(key, value, self.resolve_ttl(ttl, category));
        self.table.lock().insert(entry, self.memory_limit);
        Ok(())
    }

    // == Delete ==
    /// Removes an entry, returning whether one was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut table = self.table.lock();
        match table.entries.shift_remove(key) {
            Some(entry) => {
                table.metrics.record_delete(entry.size_bytes);
                table.metrics.total_entries = table.entries.len();
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Removes every entry, or only those whose key contains `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, pattern: Option<&str>) -> usize {
        let removed = self.table.lock().remove_where(
            |key, _| pattern.map_or(true, |p| key.contains(p)),
            false,
        );
        debug!(removed, pattern = pattern.unwrap_or("*"), "cleared cache entries");
        removed
    }

    // == Get Or Set ==
    /// Cache-aside read: returns the cached value or stores what `producer` returns.
    ///
    /// Concurrent callers for the same missing key run the producer once; the
    /// others wait and receive the stored value. The producer runs without the
    /// table lock held, so it may itself use the cache for other keys.
    pub fn get_or_set<F>(
        &self,
        key: &str,
        ttl: Option<u64>,
        category: Option<&str>,
        force_refresh: bool,
        producer: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Value,
    {
        self.try_get_or_set(key, ttl, category, force_refresh, || {
            Ok::<_, CacheError>(producer())
        })
    }

    /// Like [`get_or_set`](Self::get_or_set) with a fallible producer.
    ///
    /// A producer error is returned to the caller and nothing is cached.
    pub fn try_get_or_set<F, E>(
        &self,
        key: &str,
        ttl: Option<u64>,
        category: Option<&str>,
        force_refresh: bool,
        producer: F,
    ) -> std::result::Result<Value, E>
    where
        F: FnOnce() -> std::result::Result<Value, E>,
        E: From<CacheError>,
    {
        validate_key(key)?;

        if !force_refresh {
            if let Some(value) = self.get(key) {
                return Ok(value);
            }
        }

        // The miss above already counted this read
        let gate = self.acquire_gate(key);
        let result = {
            let _turn = gate.lock();
            match (!force_refresh)
                .then(|| self.table.lock().lookup_uncounted(key))
                .flatten()
            {
                // Filled by another caller while we waited
                Some(value) => Ok(value),
                None => producer().and_then(|value| {
                    self.set(key, value.clone(), ttl, category)?;
                    Ok(value)
                }),
            }
        };
        self.release_gate(key, &gate);
        result
    }

    fn acquire_gate(&self, key: &str) -> Arc<Mutex<()>> {
        self.inflight
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_gate(&self, key: &str, gate: &Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock();
        // Map + our handle; anything more means another caller is still queued
        let idle = Arc::strong_count(gate) <= 2;
        if idle && inflight.get(key).is_some_and(|g| Arc::ptr_eq(g, gate)) {
            inflight.remove(key);
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, counting each as an eviction.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        self.table
            .lock()
            .remove_where(|_, entry| entry.is_expired(), true)
    }

    // == Inspection ==
    /// Returns true if `key` is resident and unexpired, without touching it.
    pub fn contains(&self, key: &str) -> bool {
        self.table
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Returns a snapshot of the cache counters.
    pub fn metrics(&self) -> CacheMetrics {
        let table = self.table.lock();
        let mut metrics = table.metrics.clone();
        metrics.total_entries = table.entries.len();
        metrics
    }

    /// Resident keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.table.lock().entries.keys().cloned().collect()
    }

    /// Sum of `size_bytes` over resident entries, recomputed from the table.
    pub fn resident_bytes(&self) -> usize {
        self.table
            .lock()
            .entries
            .values()
            .map(|entry| entry.size_bytes)
            .sum()
    }

    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().entries.is_empty()
    }

    /// Shifts an entry's creation time into the past.
    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &str, millis: u64) {
        if let Some(entry) = self.table.lock().entries.get_mut(key) {
            entry.created_at = entry.created_at.saturating_sub(millis);
            entry.last_accessed_at = entry.created_at;
        }
    }
}

// == Key Validation ==
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
