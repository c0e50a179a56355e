//! Integration Tests for the indexed store and cache lifecycle
//!
//! Exercises the public library API the way the task runner glue uses it.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use taskcache::config::{CacheConfig, StoreConfig};
use taskcache::store::{Filters, Record};
use taskcache::{spawn_cleanup_task, DocumentKind, IndexedStore, IntelligentCache};
use tempfile::tempdir;

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn status_filter(status: &str) -> Filters {
    Filters::from([("status".to_string(), json!(status))])
}

fn write_tasks(path: &std::path::Path, tasks: Value) {
    fs::write(
        path.join("tasks.json"),
        serde_json::to_vec(&json!({"tasks": tasks, "updated_at": "2024-01-01T00:00:00Z"})).unwrap(),
    )
    .unwrap();
}

// == IndexedStore ==

#[test]
fn test_pending_filter_returns_matching_records_in_order() {
    let dir = tempdir().unwrap();
    write_tasks(
        dir.path(),
        json!([
            {"id": 1, "status": "pending"},
            {"id": 2, "status": "done"},
            {"id": 3, "status": "pending"}
        ]),
    );
    let store = IndexedStore::new(StoreConfig::new(dir.path()));

    let pending = store.get_records(DocumentKind::Tasks, Some(&status_filter("pending")), true);

    assert_eq!(
        pending,
        vec![
            record(json!({"id": 1, "status": "pending"})),
            record(json!({"id": 3, "status": "pending"}))
        ]
    );
}

#[test]
fn test_save_is_visible_to_following_queries() {
    let dir = tempdir().unwrap();
    write_tasks(dir.path(), json!([{"id": 1, "status": "pending"}]));
    let store = IndexedStore::new(StoreConfig::new(dir.path()));

    assert_eq!(store.get_records(DocumentKind::Tasks, Some(&status_filter("pending")), true).len(), 1);

    assert!(store.save_records(
        DocumentKind::Tasks,
        vec![
            record(json!({"id": 1, "status": "done"})),
            record(json!({"id": 2, "status": "pending"}))
        ]
    ));

    let pending = store.get_records(DocumentKind::Tasks, Some(&status_filter("pending")), true);
    assert_eq!(pending, vec![record(json!({"id": 2, "status": "pending"}))]);
    assert_eq!(
        store.get_record_by_id(DocumentKind::Tasks, &json!(1)).unwrap()["status"],
        json!("done")
    );
}

#[test]
fn test_external_edit_is_seen_after_freshness_window() {
    let dir = tempdir().unwrap();
    write_tasks(dir.path(), json!([{"id": 1, "status": "pending"}]));
    let store = IndexedStore::new(StoreConfig {
        freshness: Duration::from_millis(40),
        ..StoreConfig::new(dir.path())
    });

    assert_eq!(store.get_records(DocumentKind::Tasks, None, true).len(), 1);

    write_tasks(dir.path(), json!([{"id": 1, "status": "pending"}, {"id": 2, "status": "pending"}]));
    thread::sleep(Duration::from_millis(80));

    assert_eq!(store.get_records(DocumentKind::Tasks, None, true).len(), 2);
    assert!(store.get_record_by_id(DocumentKind::Tasks, &json!(2)).is_some());
}

#[test]
fn test_malformed_document_reads_as_empty() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("task_status.json"), "not json at all").unwrap();
    let store = IndexedStore::new(StoreConfig::new(dir.path()));

    assert!(store.get_records(DocumentKind::Status, None, true).is_empty());
    assert_eq!(store.stats().load_failures, 1);
}

#[test]
fn test_concurrent_readers_and_writer() {
    let dir = tempdir().unwrap();
    write_tasks(dir.path(), json!([{"id": 0, "status": "pending"}]));
    let store = Arc::new(IndexedStore::new(StoreConfig::new(dir.path())));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let pending =
                        store.get_records(DocumentKind::Tasks, Some(&status_filter("pending")), true);
                    assert!(pending.iter().all(|r| r["status"] == json!("pending")));
                }
            })
        })
        .collect();

    for n in 1..=10 {
        let updated = store.batch_update(
            DocumentKind::Tasks,
            &[(json!(0), record(json!({"status": "pending", "round": n})))],
        );
        assert_eq!(updated, 1);
    }

    for reader in readers {
        reader.join().unwrap();
    }
    let latest = store.get_record_by_id(DocumentKind::Tasks, &json!(0)).unwrap();
    assert_eq!(latest["round"], json!(10));
}

// == IntelligentCache ==

#[test]
fn test_snapshot_survives_restart() {
    let dir = tempdir().unwrap();
    let snapshot = dir.path().join("cache").join("snapshot.json");

    let cache = IntelligentCache::with_persistence(CacheConfig::default(), &snapshot);
    cache.set("static:schema", json!({"v": 2}), None, Some("static")).unwrap();
    cache.set("status:now", json!("busy"), None, Some("status")).unwrap();
    assert_eq!(cache.save_snapshot(&snapshot).unwrap(), 1);

    let restarted = IntelligentCache::with_persistence(CacheConfig::default(), &snapshot);
    assert_eq!(restarted.get("static:schema"), Some(json!({"v": 2})));
    assert_eq!(restarted.get("status:now"), None);
}

#[test]
fn test_get_or_set_runs_producer_once_across_threads() {
    let cache = Arc::new(IntelligentCache::new(CacheConfig::default()));
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                cache
                    .get_or_set("analysis:report", None, Some("analysis"), false, || {
                        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        json!({"score": 7})
                    })
                    .unwrap()
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), json!({"score": 7}));
    }
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cleanup_task_stops_cleanly() {
    let cache = Arc::new(IntelligentCache::new(CacheConfig::default()));
    cache.set("k", json!(1), Some(3600), None).unwrap();

    let task = spawn_cleanup_task(cache.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!task.is_finished());
    task.stop().await;

    assert!(cache.contains("k"));
}
