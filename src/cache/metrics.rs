//! Cache Metrics Module
//!
//! Tracks cache performance counters and resident memory.

use serde::Serialize;

use crate::cache::entry::current_timestamp_ms;

// == Cache Metrics ==
/// Tracks cache performance metrics.
///
/// All counters only grow, except `total_memory_bytes` which always equals the
/// summed `size_bytes` of the entries currently resident.
#[derive(Debug, Clone, Serialize)]
pub struct CacheMetrics {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Entries removed by memory pressure or expiry
    pub evictions: u64,
    /// Insertions of keys that were not already resident
    pub sets: u64,
    /// Explicit deletions that removed an entry
    pub deletes: u64,
    /// Summed estimated size of resident entries
    pub total_memory_bytes: usize,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Unix millisecond timestamp the cache was created at
    pub start_time: u64,
}

impl CacheMetrics {
    // == Constructor ==
    /// Creates a new CacheMetrics with all counters at zero.
    pub fn new() -> Self {
        Self {
            hits: 0,
            misses: 0,
            evictions: 0,
            sets: 0,
            deletes: 0,
            total_memory_bytes: 0,
            total_entries: 0,
            start_time: current_timestamp_ms(),
        }
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Seconds elapsed since the cache was created.
    pub fn uptime_seconds(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.start_time) / 1000
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Counts one evicted entry and releases its memory.
    pub fn record_eviction(&mut self, size_bytes: usize) {
        self.evictions += 1;
        self.release(size_bytes);
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self, size_bytes: usize) {
        self.deletes += 1;
        self.release(size_bytes);
    }

    // == Memory Accounting ==
    /// Adds a newly resident entry's size.
    pub fn reserve(&mut self, size_bytes: usize) {
        self.total_memory_bytes += size_bytes;
    }

    /// Subtracts a removed entry's size.
    pub fn release(&mut self, size_bytes: usize) {
        self.total_memory_bytes = self.total_memory_bytes.saturating_sub(size_bytes);
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}
