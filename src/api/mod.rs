//! API Module
//!
//! HTTP handlers and routing exposing the cache and the document store.
//!
//! # Endpoints
//! - `/cache/*` - Key/value operations and cache statistics
//! - `/store/*` - Record queries, lookups and writes per document
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
