//! Process lifecycle coordination.
//!
//! One [`Lifecycle`] exists per process. It owns the cancellation signal that
//! every long-running task observes and tracks those tasks so shutdown can
//! wait for them to unwind.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

/// Cancellation signal plus a wait-group for long-running tasks.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    token: CancellationToken,
    tracker: TaskTracker,
    max_drain_time: Duration,
}

impl Lifecycle {
    /// Create a new lifecycle
    pub fn new(max_drain_time: Duration) -> Self {
        debug!(
            max_drain_time_secs = max_drain_time.as_secs(),
            "Creating process lifecycle"
        );
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            max_drain_time,
        }
    }

    /// Cancellation token shared with tasks
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Future resolving once shutdown was requested
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Request process shutdown
    ///
    /// Used both for OS termination signals and for internal fatal errors.
    pub fn abort(&self, reason: &str) {
        if self.token.is_cancelled() {
            trace!(reason = %reason, "Shutdown already requested");
            return;
        }
        info!(
            reason = %reason,
            active_tasks = self.tracker.len(),
            "Shutdown requested"
        );
        self.token.cancel();
    }

    /// Check if shutdown was requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a tracked task
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "Starting task");
        self.tracker.spawn(async move {
            task.await;
            debug!(task = name, "Task finished");
        });
    }

    /// Number of tracked tasks still running
    pub fn active_count(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel everything and wait for tracked tasks to finish
    ///
    /// Returns `true` if all tasks finished within the drain timeout.
    pub async fn shutdown(&self) -> bool {
        self.token.cancel();
        self.tracker.close();

        let start = Instant::now();
        info!(
            active_tasks = self.tracker.len(),
            max_drain_time_secs = self.max_drain_time.as_secs(),
            "Waiting for tasks to finish"
        );

        match tokio::time::timeout(self.max_drain_time, self.tracker.wait()).await {
            Ok(()) => {
                info!(
                    elapsed_ms = start.elapsed().as_millis(),
                    "All tasks finished"
                );
                true
            }
            Err(_) => {
                warn!(
                    remaining_tasks = self.tracker.len(),
                    elapsed_secs = start.elapsed().as_secs(),
                    "Drain timeout reached, tasks still running"
                );
                false
            }
        }
    }
}
