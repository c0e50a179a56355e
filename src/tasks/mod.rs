//! Background Tasks Module
//!
//! Periodic maintenance that runs alongside the server.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries
//! - Snapshot: writes long-lived cache entries to disk

mod cleanup;
mod snapshot;

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

pub use cleanup::spawn_cleanup_task;
pub use snapshot::spawn_snapshot_task;

/// Shortest period a task will tick at; `tokio::time::interval` rejects zero.
pub const MIN_TASK_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a spawned periodic task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stops the task and waits for it to wind down.
    pub async fn stop(mut self) {
        self.handle.abort();
        // Cancellation is the expected outcome here
        let _ = (&mut self.handle).await;
        debug!(task = self.name, "background task stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
