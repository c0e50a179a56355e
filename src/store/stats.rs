//! Store Statistics Module
//!
//! Lock-free counters for the document store and their serializable snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters bumped from any thread without taking the store's table locks.
#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    pub document_hits: AtomicU64,
    pub document_misses: AtomicU64,
    pub disk_loads: AtomicU64,
    pub load_failures: AtomicU64,
    pub index_builds: AtomicU64,
    pub index_hits: AtomicU64,
    pub index_misses: AtomicU64,
    pub query_hits: AtomicU64,
    pub query_misses: AtomicU64,
    pub writes: AtomicU64,
    pub write_failures: AtomicU64,
}

impl StoreCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Copies the counters into a snapshot; table sizes are filled by the caller.
    pub fn snapshot(&self) -> StoreStats {
        StoreStats {
            document_hits: Self::read(&self.document_hits),
            document_misses: Self::read(&self.document_misses),
            disk_loads: Self::read(&self.disk_loads),
            load_failures: Self::read(&self.load_failures),
            index_builds: Self::read(&self.index_builds),
            index_hits: Self::read(&self.index_hits),
            index_misses: Self::read(&self.index_misses),
            query_hits: Self::read(&self.query_hits),
            query_misses: Self::read(&self.query_misses),
            writes: Self::read(&self.writes),
            write_failures: Self::read(&self.write_failures),
            ..StoreStats::default()
        }
    }
}

// == Store Stats ==
/// Point-in-time view of the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Reads served from a fresh cached parse
    pub document_hits: u64,
    /// Reads that went to disk (stale, absent, or forced)
    pub document_misses: u64,
    pub disk_loads: u64,
    /// Loads that found a malformed or unreadable document
    pub load_failures: u64,
    pub index_builds: u64,
    /// `get_record_by_id` lookups answered by the id index
    pub index_hits: u64,
    /// `get_record_by_id` lookups that fell back to a scan
    pub index_misses: u64,
    pub query_hits: u64,
    pub query_misses: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub cached_documents: usize,
    pub cached_queries: usize,
    pub indexed_documents: usize,
}

impl StoreStats {
    /// Fraction of memoizable queries answered from the query cache.
    pub fn query_hit_rate(&self) -> f64 {
        let total = self.query_hits + self.query_misses;
        if total == 0 {
            0.0
        } else {
            self.query_hits as f64 / total as f64
        }
    }
}
