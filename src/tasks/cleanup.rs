//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{BackgroundTask, MIN_TASK_INTERVAL};
use crate::cache::IntelligentCache;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The first sweep happens one `interval` after spawning. Each sweep takes
/// the cache lock once, so readers wait at most one pass. Intervals below
/// [`MIN_TASK_INTERVAL`] are raised to it.
///
/// # Arguments
/// * `cache` - Shared cache to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A [`BackgroundTask`] that stops the sweep when stopped or dropped.
pub fn spawn_cleanup_task(cache: Arc<IntelligentCache>, interval: Duration) -> BackgroundTask {
    let interval = interval.max(MIN_TASK_INTERVAL);
    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs_f64(), "starting expiry sweep task");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let removed = cache.cleanup_expired();
            if removed > 0 {
                info!(removed, "expiry sweep removed entries");
            } else {
                debug!("expiry sweep found nothing to remove");
            }
        }
    });

    BackgroundTask::new("expiry-sweep", handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use serde_json::json;

    fn shared_cache() -> Arc<IntelligentCache> {
        Arc::new(IntelligentCache::new(CacheConfig::new(1024 * 1024, 300)))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = shared_cache();
        cache.set("expire_soon", json!("value"), Some(1), None).unwrap();
        cache.backdate("expire_soon", 5_000);

        let task = spawn_cleanup_task(cache.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(cache.is_empty(), "expired entry should have been swept");
        assert_eq!(cache.metrics().evictions, 1);
        task.stop().await;
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = shared_cache();
        cache.set("long_lived", json!("value"), Some(3600), None).unwrap();
        cache.set("forever", json!("value"), Some(0), None).unwrap();

        let task = spawn_cleanup_task(cache.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.get("long_lived"), Some(json!("value")));
        assert!(cache.contains("forever"));
        task.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let cache = shared_cache();
        cache.set("stale", json!(1), Some(1), None).unwrap();
        cache.backdate("stale", 5_000);

        let task = spawn_cleanup_task(cache.clone(), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!task.is_finished());
        assert!(cache.is_empty());
        task.stop().await;
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_task() {
        let cache = shared_cache();
        let task = spawn_cleanup_task(cache.clone(), Duration::from_millis(20));
        assert_eq!(task.name(), "expiry-sweep");
        drop(task);

        // The task held the only other reference to the cache
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(Arc::strong_count(&cache), 1);
    }
}
