//! taskcache - In-memory caching and indexed record access for task files
//!
//! A bounded JSON value cache with TTL expiry and LRU eviction, and an
//! indexed store over JSON task documents, exposed over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::IntelligentCache;
pub use config::Config;
pub use error::{CacheError, Result};
pub use store::{DocumentKind, IndexedStore};
pub use tasks::{spawn_cleanup_task, spawn_snapshot_task, BackgroundTask};
