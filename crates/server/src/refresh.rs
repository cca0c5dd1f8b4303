//! Periodic refresh control loop.
//!
//! One loop drives each reloadable subsystem. The first run happens one
//! interval after start (initial loads happen at bootstrap). After a failure
//! the next attempt waits the fixed error delay; after a success, the normal
//! interval. A [`RefreshHandle`] can request an immediate run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Error type returned by refreshers
pub type RefreshError = Box<dyn std::error::Error + Send + Sync>;

/// A subsystem that can reload itself
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self) -> Result<(), RefreshError>;
}

/// Loop state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Waiting for the first run
    Idle,
    Fetching,
    /// Last run succeeded
    Applied,
    /// Last run failed; the previous data is still in use
    Failed,
}

/// Trigger and state access for a running loop
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    name: &'static str,
    notify: Arc<Notify>,
    state: Arc<Mutex<RefreshState>>,
}

impl RefreshHandle {
    /// Request a run now instead of waiting for the timer
    pub fn trigger(&self) {
        debug!(refresh = self.name, "Refresh requested");
        self.notify.notify_one();
    }

    pub fn state(&self) -> RefreshState {
        *self.state.lock()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Timer-driven refresh loop
pub struct RefreshLoop {
    name: &'static str,
    refresher: Arc<dyn Refresh>,
    interval: Duration,
    error_delay: Duration,
    cancel: CancellationToken,
    handle: RefreshHandle,
}

impl RefreshLoop {
    pub fn new(
        name: &'static str,
        refresher: Arc<dyn Refresh>,
        interval: Duration,
        error_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            refresher,
            interval,
            error_delay,
            cancel,
            handle: RefreshHandle {
                name,
                notify: Arc::new(Notify::new()),
                state: Arc::new(Mutex::new(RefreshState::Idle)),
            },
        }
    }

    pub fn handle(&self) -> RefreshHandle {
        self.handle.clone()
    }

    fn set_state(&self, state: RefreshState) {
        *self.handle.state.lock() = state;
    }

    /// Run until cancelled
    pub async fn run(self) {
        info!(
            refresh = self.name,
            interval_secs = self.interval.as_secs(),
            error_delay_secs = self.error_delay.as_secs(),
            "Starting refresh loop"
        );

        let mut delay = self.interval;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.handle.notify.notified() => {
                    trace!(refresh = self.name, "Refresh triggered on demand");
                }
                _ = tokio::time::sleep(delay) => {}
            }

            self.set_state(RefreshState::Fetching);
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = self.refresher.refresh() => outcome,
            };

            match outcome {
                Ok(()) => {
                    self.set_state(RefreshState::Applied);
                    debug!(
                        refresh = self.name,
                        elapsed_ms = started.elapsed().as_millis(),
                        "Refresh applied"
                    );
                    delay = self.interval;
                }
                Err(e) => {
                    self.set_state(RefreshState::Failed);
                    error!(
                        refresh = self.name,
                        error = %e,
                        retry_in_secs = self.error_delay.as_secs(),
                        "Refresh failed, keeping previous data"
                    );
                    delay = self.error_delay;
                }
            }
        }

        info!(refresh = self.name, "Refresh loop stopped");
    }
}
