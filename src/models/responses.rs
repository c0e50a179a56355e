//! Response DTOs for the HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheMetrics;
use crate::store::{DocumentKind, Record, StoreStats};

/// Response body for GET /cache/get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /cache/set
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /cache/del/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for POST /cache/clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// Response body for GET /cache/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub sets: u64,
    pub deletes: u64,
    pub total_entries: usize,
    pub total_memory_bytes: usize,
    pub memory_limit_bytes: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    pub uptime_seconds: u64,
}

impl StatsResponse {
    pub fn new(metrics: &CacheMetrics, memory_limit_bytes: usize) -> Self {
        Self {
            hits: metrics.hits,
            misses: metrics.misses,
            evictions: metrics.evictions,
            sets: metrics.sets,
            deletes: metrics.deletes,
            total_entries: metrics.total_entries,
            total_memory_bytes: metrics.total_memory_bytes,
            memory_limit_bytes,
            hit_rate: metrics.hit_rate(),
            uptime_seconds: metrics.uptime_seconds(),
        }
    }
}

/// Response body for POST /store/:document/query
#[derive(Debug, Clone, Serialize)]
pub struct RecordsResponse {
    pub document: DocumentKind,
    pub count: usize,
    pub records: Vec<Record>,
}

impl RecordsResponse {
    pub fn new(document: DocumentKind, records: Vec<Record>) -> Self {
        Self {
            document,
            count: records.len(),
            records,
        }
    }
}

/// Response body for GET /store/:document/records/:id
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    pub document: DocumentKind,
    pub record: Record,
}

/// Response body for the store's write endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WriteResponse {
    pub document: DocumentKind,
    /// Number of records written or updated
    pub updated: usize,
}

/// Response body for GET /store/stats
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatsResponse {
    #[serde(flatten)]
    pub stats: StoreStats,
    pub query_hit_rate: f64,
}

impl From<StoreStats> for StoreStatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            query_hit_rate: stats.query_hit_rate(),
            stats,
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
