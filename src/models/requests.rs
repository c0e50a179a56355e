//! Request DTOs for the HTTP API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;
use crate::store::{Filters, Record};

/// Request body for PUT /cache/set
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds; 0 stores without expiry
/// - `category`: Optional named TTL class, used when `ttl` is absent
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub category: Option<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Request body for POST /cache/clear; no pattern clears everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Request body for POST /store/:document/query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Field equality filters, all of which must match
    #[serde(default)]
    pub filters: Option<Filters>,
    /// Whether to consult and fill the query-result cache
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            filters: None,
            use_cache: default_use_cache(),
        }
    }
}

fn default_use_cache() -> bool {
    true
}

/// Request body for PUT /store/:document/records
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRecordsRequest {
    pub records: Vec<Record>,
}

/// Request body for PATCH /store/:document/records/:id
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRecordRequest {
    pub patch: Record,
}

/// One entry of a batch update.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordUpdate {
    pub id: Value,
    pub patch: Record,
}

/// Request body for POST /store/:document/batch
#[derive(Debug, Clone, Deserialize)]
pub struct BatchUpdateRequest {
    pub updates: Vec<RecordUpdate>,
}

impl BatchUpdateRequest {
    pub fn into_pairs(self) -> Vec<(Value, Record)> {
        self.updates
            .into_iter()
            .map(|update| (update.id, update.patch))
            .collect()
    }
}
