//! Cache Module
//!
//! Provides a bounded in-memory cache with TTL expiration, LRU eviction under
//! a memory ceiling, and optional snapshot persistence.

mod engine;
mod entry;
mod lru;
mod metrics;
mod persistence;


// Re-export public types
pub use engine::IntelligentCache;
pub use entry::{current_timestamp_ms, estimate_size, CacheEntry};
pub use lru::LruTracker;
pub use metrics::CacheMetrics;
pub use persistence::{PersistedEntry, Snapshot, SNAPSHOT_VERSION};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
