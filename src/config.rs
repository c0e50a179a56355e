//! Configuration Module
//!
//! Handles loading and managing cache, store and server configuration from
//! environment variables.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Category TTLs applied when `set` is called with a category and no explicit TTL.
pub const DEFAULT_CATEGORY_TTLS: &[(&str, u64)] = &[
    ("process", 30),
    ("status", 60),
    ("task", 300),
    ("analysis", 1800),
    ("config", 3600),
    ("static", 86400),
];

/// Settings for an `IntelligentCache` instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on the summed estimated size of resident entries
    pub memory_limit_bytes: usize,
    /// TTL in seconds used when neither a TTL nor a category is given
    pub default_ttl: u64,
    /// Named TTL classes, in seconds
    pub category_ttls: HashMap<String, u64>,
    /// Entries with a TTL above this many seconds are written to snapshots
    pub persist_min_ttl: u64,
}

impl CacheConfig {
    /// Creates a config with the given ceiling and default TTL and the stock category table.
    pub fn new(memory_limit_bytes: usize, default_ttl: u64) -> Self {
        Self {
            memory_limit_bytes,
            default_ttl,
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 100 * 1024 * 1024,
            default_ttl: 300,
            category_ttls: DEFAULT_CATEGORY_TTLS
                .iter()
                .map(|(name, ttl)| (name.to_string(), *ttl))
                .collect(),
            persist_min_ttl: 3600,
        }
    }
}

/// Settings for an `IndexedStore` instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory containing the backing JSON documents
    pub data_dir: PathBuf,
    /// How long a parsed document is served before it is re-read from disk
    pub freshness: Duration,
    /// Maximum number of parsed documents kept in memory
    pub max_cached_documents: usize,
    /// Maximum number of memoized query results
    pub query_cache_size: usize,
}

impl StoreConfig {
    /// Creates a config rooted at `data_dir` with default cache bounds.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            freshness: Duration::from_secs(5),
            max_cached_documents: 10,
            query_cache_size: 100,
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// In-memory cache settings
    pub cache: CacheConfig,
    /// Document store settings
    pub store: StoreConfig,
    /// Snapshot file for long-lived cache entries; `None` disables persistence
    pub snapshot_path: Option<PathBuf>,
    /// Interval in seconds between periodic snapshots
    pub snapshot_interval: u64,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMORY_LIMIT_BYTES` - Cache memory ceiling (default: 100 MiB)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `PERSIST_MIN_TTL` - Minimum TTL for snapshotting (default: 3600)
    /// - `SNAPSHOT_PATH` - Snapshot file (default: unset, persistence off)
    /// - `SNAPSHOT_INTERVAL` - Snapshot frequency in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `DATA_DIR` - Backing document directory (default: `.`)
    /// - `DOCUMENT_FRESHNESS_SECS` - Document freshness window (default: 5)
    /// - `MAX_CACHED_DOCUMENTS` - Parsed document bound (default: 10)
    /// - `QUERY_CACHE_SIZE` - Memoized query bound (default: 100)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache = CacheConfig {
            memory_limit_bytes: env_or("MEMORY_LIMIT_BYTES", defaults.cache.memory_limit_bytes),
            default_ttl: env_or("DEFAULT_TTL", defaults.cache.default_ttl),
            persist_min_ttl: env_or("PERSIST_MIN_TTL", defaults.cache.persist_min_ttl),
            category_ttls: defaults.cache.category_ttls,
        };

        let store = StoreConfig {
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store.data_dir),
            freshness: Duration::from_secs(env_or(
                "DOCUMENT_FRESHNESS_SECS",
                defaults.store.freshness.as_secs(),
            )),
            max_cached_documents: env_or(
                "MAX_CACHED_DOCUMENTS",
                defaults.store.max_cached_documents,
            ),
            query_cache_size: env_or("QUERY_CACHE_SIZE", defaults.store.query_cache_size),
        };

        Self {
            cache,
            store,
            snapshot_path: env::var("SNAPSHOT_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            snapshot_interval: env_or("SNAPSHOT_INTERVAL", defaults.snapshot_interval),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            snapshot_path: None,
            snapshot_interval: 300,
            cleanup_interval: 60,
            server_port: 3000,
        }
    }
}

/// Parses an environment variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache.memory_limit_bytes, 100 * 1024 * 1024);
        assert_eq!(config.cache.default_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 60);
        assert!(config.snapshot_path.is_none());
        assert_eq!(config.store.max_cached_documents, 10);
    }

    #[test]
    fn test_category_table_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.category_ttls.get("process"), Some(&30));
        assert_eq!(config.category_ttls.get("config"), Some(&3600));
        assert_eq!(config.category_ttls.len(), DEFAULT_CATEGORY_TTLS.len());
    }

    #[test]
    fn test_cache_config_new_keeps_categories() {
        let config = CacheConfig::new(10, 5);
        assert_eq!(config.memory_limit_bytes, 10);
        assert_eq!(config.default_ttl, 5);
        assert!(config.category_ttls.contains_key("status"));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MEMORY_LIMIT_BYTES");
        env::remove_var("DEFAULT_TTL");
        env::remove_var("SERVER_PORT");
        env::remove_var("CLEANUP_INTERVAL");
        env::remove_var("SNAPSHOT_PATH");

        let config = Config::from_env();
        assert_eq!(config.cache.default_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 60);
        assert!(config.snapshot_path.is_none());
    }

    #[test]
    fn test_env_or_malformed_falls_back() {
        env::set_var("TASKCACHE_TEST_MALFORMED", "not-a-number");
        assert_eq!(env_or("TASKCACHE_TEST_MALFORMED", 7u64), 7);
        env::remove_var("TASKCACHE_TEST_MALFORMED");
    }
}
