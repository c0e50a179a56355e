//! Snapshot Task
//!
//! Background task that periodically persists long-lived cache entries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::{BackgroundTask, MIN_TASK_INTERVAL};
use crate::cache::IntelligentCache;

/// Spawns a background task that writes a cache snapshot every `interval`.
///
/// The write runs on the blocking pool. Failures are logged and retried on
/// the next tick. Intervals below [`MIN_TASK_INTERVAL`] are raised to it.
pub fn spawn_snapshot_task(
    cache: Arc<IntelligentCache>,
    path: PathBuf,
    interval: Duration,
) -> BackgroundTask {
    let interval = interval.max(MIN_TASK_INTERVAL);
    let handle = tokio::spawn(async move {
        info!(path = %path.display(), interval_secs = interval.as_secs_f64(), "starting snapshot task");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let cache = Arc::clone(&cache);
            let target = path.clone();
            match tokio::task::spawn_blocking(move || cache.save_snapshot(&target)).await {
                Ok(Ok(saved)) => debug!(saved, "cache snapshot written"),
                Ok(Err(e)) => error!(path = %path.display(), error = %e, "cache snapshot failed"),
                Err(e) => error!(error = %e, "cache snapshot worker panicked"),
            }
        }
    });

    BackgroundTask::new("snapshot", handle)
}
