//! API Routes
//!
//! Configures the Axum router with the cache and document store endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    batch_update_handler, clear_handler, delete_handler, get_handler, get_record_handler,
    health_handler, query_handler, save_records_handler, set_handler, stats_handler,
    store_stats_handler, update_record_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache/set` - Store a JSON value
/// - `GET /cache/get/:key` - Retrieve a value by key
/// - `DELETE /cache/del/:key` - Delete a key
/// - `POST /cache/clear` - Remove all keys, or those containing a pattern
/// - `GET /cache/stats` - Cache counters
/// - `POST /store/:document/query` - Filtered record query
/// - `GET|PATCH /store/:document/records/:id` - Read or patch one record
/// - `PUT /store/:document/records` - Replace a document's records
/// - `POST /store/:document/batch` - Patch several records in one write
/// - `GET /store/stats` - Document store counters
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cache_routes = Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/clear", post(clear_handler))
        .route("/stats", get(stats_handler));

    let store_routes = Router::new()
        .route("/stats", get(store_stats_handler))
        .route("/:document/query", post(query_handler))
        .route("/:document/records", put(save_records_handler))
        .route(
            "/:document/records/:id",
            get(get_record_handler).patch(update_record_handler),
        )
        .route("/:document/batch", post(batch_update_handler));

    Router::new()
        .nest("/cache", cache_routes)
        .nest("/store", store_routes)
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
