//! Snapshot persistence for long-lived cache entries.
//!
//! Snapshots are JSON documents written atomically through a temp file and
//! rename. Only entries whose TTL exceeds the configured threshold, or that
//! never expire, are written.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, IntelligentCache, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

/// Snapshot layout version written to disk.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Unix milliseconds the snapshot was written at
    pub saved_at: u64,
    pub entries: Vec<PersistedEntry>,
}

/// One persisted cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub key: String,
    pub value: Value,
    pub ttl_seconds: Option<u64>,
    /// Unix milliseconds the entry was originally created at
    pub created_at: u64,
    /// Unix milliseconds the entry was written to the snapshot
    pub saved_at: u64,
}

impl IntelligentCache {
    /// Whether an entry lives long enough to be worth writing to disk.
    fn worth_persisting(&self, entry: &CacheEntry) -> bool {
        entry
            .ttl_seconds
            .map_or(true, |ttl| ttl > self.persist_min_ttl)
    }

    // == Save ==
    /// Writes long-lived, unexpired entries to `path`.
    ///
    /// Returns the number of entries written.
    pub fn save_snapshot(&self, path: &Path) -> Result<usize> {
        let now = current_timestamp_ms();
        let entries: Vec<PersistedEntry> = {
            let table = self.table.lock();
            table
                .entries
                .values()
                .filter(|entry| !entry.is_expired_at(now) && self.worth_persisting(entry))
                .map(|entry| PersistedEntry {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    ttl_seconds: entry.ttl_seconds,
                    created_at: entry.created_at,
                    saved_at: now,
                })
                .collect()
        };

        let count = entries.len();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            entries,
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &data)?;
        fs::rename(&temp_path, path)?;

        debug!(path = %path.display(), count, "cache snapshot saved");
        Ok(count)
    }

    // == Load ==
    /// Restores entries from `path`, skipping any that have expired since they
    /// were saved. A missing file restores nothing.
    ///
    /// Returns the number of entries restored.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache snapshot to load");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::Persistence(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let now = current_timestamp_ms();
        let total = snapshot.entries.len();
        let mut restored = 0;
        {
            let mut table = self.table.lock();
            for persisted in snapshot.entries {
                if persisted.key.is_empty() || persisted.key.len() > MAX_KEY_LENGTH {
                    continue;
                }
                let entry = CacheEntry::with_created_at(
                    persisted.key,
                    persisted.value,
                    persisted.ttl_seconds,
                    persisted.created_at,
                );
                if entry.is_expired_at(now) {
                    continue;
                }
                if table.insert(entry, self.memory_limit()) {
                    restored += 1;
                }
            }
        }

        info!(
            path = %path.display(),
            restored,
            skipped = total - restored,
            "cache snapshot loaded"
        );
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use serde_json::json;
    use tempfile::tempdir;

    fn cache() -> IntelligentCache {
        IntelligentCache::new(CacheConfig::new(1024 * 1024, 300))
    }

    #[test]
    fn test_only_long_lived_entries_are_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = cache();

        cache.set("short", json!("p"), None, Some("process")).unwrap();
        cache.set("long", json!({"theme": "dark"}), None, Some("static")).unwrap();
        cache.set("forever", json!(1), Some(0), None).unwrap();

        assert_eq!(cache.save_snapshot(&path).unwrap(), 2);

        let restored = self::cache();
        assert_eq!(restored.load_snapshot(&path).unwrap(), 2);
        assert_eq!(restored.get("long"), Some(json!({"theme": "dark"})));
        assert_eq!(restored.get("forever"), Some(json!(1)));
        assert_eq!(restored.get("short"), None);
    }

    #[test]
    fn test_load_keeps_original_creation_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = cache();
        cache.set("k", json!("v"), Some(7200), None).unwrap();
        cache.backdate("k", 60_000);
        cache.save_snapshot(&path).unwrap();

        let restored = self::cache();
        restored.load_snapshot(&path).unwrap();

        let created_at = restored.table.lock().entries["k"].created_at;
        let original = cache.table.lock().entries["k"].created_at;
        assert_eq!(created_at, original);
    }

    #[test]
    fn test_expired_entries_are_dropped_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let now = current_timestamp_ms();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            entries: vec![
                PersistedEntry {
                    key: "stale".to_string(),
                    value: json!("old"),
                    ttl_seconds: Some(3601),
                    created_at: now - 3_700_000,
                    saved_at: now - 3_700_000,
                },
                PersistedEntry {
                    key: "live".to_string(),
                    value: json!("new"),
                    ttl_seconds: Some(3601),
                    created_at: now - 1_000,
                    saved_at: now - 1_000,
                },
            ],
        };
        fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let cache = cache();
        assert_eq!(cache.load_snapshot(&path).unwrap(), 1);
        assert!(cache.contains("live"));
        assert!(!cache.contains("stale"));
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = tempdir().unwrap();
        let cache = cache();
        assert_eq!(cache.load_snapshot(&dir.path().join("absent.json")).unwrap(), 0);
    }

    #[test]
    fn test_malformed_snapshot_errors_but_persistence_ctor_survives() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{ this is not json").unwrap();

        assert!(matches!(
            cache().load_snapshot(&path),
            Err(CacheError::Serialization(_))
        ));

        let cache = IntelligentCache::with_persistence(CacheConfig::default(), &path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cache.json");
        let cache = cache();
        cache.set("k", json!("v"), Some(0), None).unwrap();

        assert_eq!(cache.save_snapshot(&path).unwrap(), 1);
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
