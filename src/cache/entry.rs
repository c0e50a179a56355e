//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// Size charged for a value whose serialized form cannot be produced.
pub const FALLBACK_ENTRY_SIZE: usize = 64;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// The stored value
    pub value: Value,
    /// TTL in seconds, None = never expires
    pub ttl_seconds: Option<u64>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last successful read (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Estimated size, fixed at construction
    pub size_bytes: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `key` - The key the entry is stored under
    /// * `value` - The value to store
    /// * `ttl_seconds` - Optional TTL in seconds
    pub fn new(key: impl Into<String>, value: Value, ttl_seconds: Option<u64>) -> Self {
        Self::with_created_at(key, value, ttl_seconds, current_timestamp_ms())
    }

    /// Creates an entry with an explicit creation time, used when restoring snapshots.
    pub fn with_created_at(
        key: impl Into<String>,
        value: Value,
        ttl_seconds: Option<u64>,
        created_at: u64,
    ) -> Self {
        let size_bytes = estimate_size(&value);
        Self {
            key: key.into(),
            value,
            ttl_seconds,
            created_at,
            last_accessed_at: created_at,
            access_count: 0,
            size_bytes,
        }
    }

    // == Expiration ==
    /// Unix millisecond timestamp after which the entry is expired.
    pub fn expires_at(&self) -> Option<u64> {
        self.ttl_seconds
            .map(|ttl| self.created_at.saturating_add(ttl.saturating_mul(1000)))
    }

    /// Checks if the entry has expired.
    ///
    /// An entry is expired once strictly more than its TTL has elapsed since
    /// creation. Exactly at `created_at + ttl` it is still served.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at() {
            Some(expires) => now_ms > expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a read hit.
    pub fn touch(&mut self) {
        // Keep last_accessed_at >= created_at even if the wall clock steps back
        self.last_accessed_at = current_timestamp_ms().max(self.created_at);
        self.access_count = self.access_count.saturating_add(1);
    }

    // == Time To Live ==
    /// Returns remaining TTL in seconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_seconds)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at()
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000)
    }
}

// == Size Estimation ==
/// Cheap, stable size heuristic for a cached value.
///
/// Strings are charged their UTF-8 byte length; every other value is charged
/// the length of its compact JSON encoding.
pub fn estimate_size(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        other => serde_json::to_string(other)
            .map(|s| s.len())
            .unwrap_or(FALLBACK_ENTRY_SIZE),
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("k", json!("test_value"), None);

        assert_eq!(entry.value, json!("test_value"));
        assert!(entry.expires_at().is_none());
        assert!(!entry.is_expired());
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.last_accessed_at, entry.created_at);
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new("k", json!("test_value"), Some(60));

        assert_eq!(entry.expires_at(), Some(entry.created_at + 60_000));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::with_created_at("k", json!("v"), Some(10), 1_000);

        assert!(!entry.is_expired_at(1_000 + 10_000 - 1));
        assert!(!entry.is_expired_at(1_000 + 10_000));
        assert!(entry.is_expired_at(1_000 + 10_000 + 1));
    }

    #[test]
    fn test_backdated_entry_is_expired() {
        let now = current_timestamp_ms();
        let entry = CacheEntry::with_created_at("k", json!("v"), Some(1), now - 5_000);
        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(0));
    }

    #[test]
    fn test_touch_updates_access_metadata() {
        let mut entry = CacheEntry::new("k", json!(1), None);
        entry.touch();
        entry.touch();

        assert_eq!(entry.access_count, 2);
        assert!(entry.last_accessed_at >= entry.created_at);
    }

    #[test]
    fn test_ttl_remaining_seconds() {
        let entry = CacheEntry::new("k", json!("v"), Some(10));

        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining <= 10);
        assert!(remaining >= 9);
    }

    #[test]
    fn test_ttl_remaining_no_expiration() {
        let entry = CacheEntry::new("k", json!("v"), None);
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_size_of_strings_is_byte_length() {
        assert_eq!(estimate_size(&json!("12345")), 5);
        assert_eq!(estimate_size(&json!("")), 0);
        assert_eq!(estimate_size(&json!("é")), 2);
    }

    #[test]
    fn test_size_of_structured_values_is_serialized_length() {
        assert_eq!(estimate_size(&json!({"a": 1})), r#"{"a":1}"#.len());
        assert_eq!(estimate_size(&json!([1, 2, 3])), "[1,2,3]".len());
        assert_eq!(estimate_size(&json!(null)), 4);
    }

    #[test]
    fn test_size_is_stable() {
        let value = json!({"nested": {"list": [1, "two", 3.5]}, "flag": true});
        assert_eq!(estimate_size(&value), estimate_size(&value.clone()));
    }
}
