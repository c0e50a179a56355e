//! API Handlers
//!
//! HTTP request handlers for the cache and document store endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::cache::IntelligentCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    BatchUpdateRequest, ClearRequest, ClearResponse, DeleteResponse, GetResponse, HealthResponse,
    QueryRequest, RecordResponse, RecordsResponse, SaveRecordsRequest, SetRequest, SetResponse,
    StatsResponse, StoreStatsResponse, UpdateRecordRequest, WriteResponse,
};
use crate::store::{DocumentKind, IndexedStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<IntelligentCache>,
    pub store: Arc<IndexedStore>,
}

impl AppState {
    pub fn new(cache: Arc<IntelligentCache>, store: Arc<IndexedStore>) -> Self {
        Self { cache, store }
    }

    /// Builds the cache and store from configuration.
    ///
    /// When a snapshot path is configured the cache is warmed from it.
    pub fn from_config(config: &Config) -> Self {
        let cache = match &config.snapshot_path {
            Some(path) => IntelligentCache::with_persistence(config.cache.clone(), path),
            None => IntelligentCache::new(config.cache.clone()),
        };
        let store = IndexedStore::new(config.store.clone());
        Self::new(Arc::new(cache), Arc::new(store))
    }
}

/// Runs blocking store work off the async executor.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CacheError::Internal(format!("store worker failed: {}", e)))?
}

/// Parses an optional JSON body; an empty body yields the default request.
///
/// A body that is present but malformed is rejected.
pub fn parse_optional_body<T>(body: &Bytes) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| CacheError::InvalidRequest(format!("Malformed request body: {}", e)))
}

/// Interprets a path segment as a record id.
///
/// Segments that parse as JSON numbers match numeric ids; anything else is
/// matched as a string.
pub fn parse_record_id(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(number @ Value::Number(_)) => number,
        _ => Value::String(raw.to_string()),
    }
}

// == Cache Handlers ==

/// Handler for PUT /cache/set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state
        .cache
        .set(req.key.as_str(), req.value, req.ttl, req.category.as_deref())?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key) {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(format!("Key '{}' not found", key))),
    }
}

/// Handler for DELETE /cache/del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.delete(&key) {
        return Err(CacheError::NotFound(format!("Key '{}' not found", key)));
    }
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /cache/clear
///
/// An empty body clears every key.
pub async fn clear_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ClearResponse>> {
    let req: ClearRequest = parse_optional_body(&body)?;
    let removed = state.cache.clear(req.pattern.as_deref());
    Ok(Json(ClearResponse { removed }))
}

/// Handler for GET /cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let metrics = state.cache.metrics();
    Json(StatsResponse::new(&metrics, state.cache.memory_limit()))
}

// == Store Handlers ==

/// Handler for POST /store/:document/query
pub async fn query_handler(
    State(state): State<AppState>,
    Path(document): Path<String>,
    body: Bytes,
) -> Result<Json<RecordsResponse>> {
    let kind: DocumentKind = document.parse()?;
    let req: QueryRequest = parse_optional_body(&body)?;

    let store = state.store.clone();
    let records = run_blocking(move || {
        Ok(store.get_records(kind, req.filters.as_ref(), req.use_cache))
    })
    .await?;

    Ok(Json(RecordsResponse::new(kind, records)))
}

/// Handler for GET /store/:document/records/:id
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path((document, id)): Path<(String, String)>,
) -> Result<Json<RecordResponse>> {
    let kind: DocumentKind = document.parse()?;
    let id = parse_record_id(&id);

    let store = state.store.clone();
    let lookup_id = id.clone();
    let record = run_blocking(move || Ok(store.get_record_by_id(kind, &lookup_id))).await?;

    match record {
        Some(record) => Ok(Json(RecordResponse {
            document: kind,
            record,
        })),
        None => Err(CacheError::NotFound(format!(
            "Record {} not found in {}",
            id, kind
        ))),
    }
}

/// Handler for PUT /store/:document/records
pub async fn save_records_handler(
    State(state): State<AppState>,
    Path(document): Path<String>,
    Json(req): Json<SaveRecordsRequest>,
) -> Result<Json<WriteResponse>> {
    let kind: DocumentKind = document.parse()?;
    let count = req.records.len();

    let store = state.store.clone();
    run_blocking(move || {
        if store.save_records(kind, req.records) {
            Ok(())
        } else {
            Err(CacheError::Persistence(format!("Failed to write {}", kind)))
        }
    })
    .await?;

    Ok(Json(WriteResponse {
        document: kind,
        updated: count,
    }))
}

/// Handler for PATCH /store/:document/records/:id
pub async fn update_record_handler(
    State(state): State<AppState>,
    Path((document, id)): Path<(String, String)>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<Json<WriteResponse>> {
    let kind: DocumentKind = document.parse()?;
    let id = parse_record_id(&id);

    let store = state.store.clone();
    run_blocking(move || {
        if store.update_record(kind, &id, &req.patch) {
            return Ok(());
        }
        if store.get_record_by_id(kind, &id).is_none() {
            Err(CacheError::NotFound(format!(
                "Record {} not found in {}",
                id, kind
            )))
        } else {
            Err(CacheError::Persistence(format!("Failed to write {}", kind)))
        }
    })
    .await?;

    Ok(Json(WriteResponse {
        document: kind,
        updated: 1,
    }))
}

/// Handler for POST /store/:document/batch
pub async fn batch_update_handler(
    State(state): State<AppState>,
    Path(document): Path<String>,
    Json(req): Json<BatchUpdateRequest>,
) -> Result<Json<WriteResponse>> {
    let kind: DocumentKind = document.parse()?;
    let updates = req.into_pairs();
    debug!(document = %kind, requested = updates.len(), "batch update");

    let store = state.store.clone();
    let updated = run_blocking(move || Ok(store.batch_update(kind, &updates))).await?;

    Ok(Json(WriteResponse {
        document: kind,
        updated,
    }))
}

/// Handler for GET /store/stats
pub async fn store_stats_handler(State(state): State<AppState>) -> Json<StoreStatsResponse> {
    Json(state.store.stats().into())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
