// Loop pacing shared by the collector, the dedup worker and the scheduler jobs.
// One unit of work, then sleep `interval` (or `backoff` after a failure), until shutdown.

use tokio::sync::oneshot;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: Duration,
    pub backoff: Duration,
}

impl Cadence {
    pub fn from_secs(interval_secs: u64, backoff_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            backoff: Duration::from_secs(backoff_secs),
        }
    }

    /// Delay before the next iteration given how the last one ended.
    pub fn next_delay<T, E>(&self, result: &Result<T, E>) -> Duration {
        if result.is_ok() {
            self.interval
        } else {
            self.backoff
        }
    }
}

/// Sleeps for `delay`. Returns true if shutdown was requested (or its sender dropped) first.
pub async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut oneshot::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown_rx => true,
    }
}
