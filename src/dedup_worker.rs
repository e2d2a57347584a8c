// Consumer: turns the cached snapshot into status-change history.
//
// A container gets a new record only when it has none yet or its status differs from its
// latest record. The cycle's records are committed as one batch; a failed commit is retried
// whole after backoff. If the latest-record lookup itself fails (cold store), every observed
// container is persisted for that cycle so no observation is lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::cache::{self, SharedCache};
use crate::cadence::{self, Cadence};
use crate::clock::Clock;
use crate::error::PipelineError;
use crate::history::HistoryStore;
use crate::models::{ContainerSnapshot, NewRecord};

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Containers in the snapshot that was read (0 when the cache had no data).
    pub observed: usize,
    /// Records committed to history.
    pub appended: usize,
    /// Latest-record lookup failed and the full snapshot was persisted.
    pub degraded: bool,
}

pub struct DedupWorker {
    cache: Arc<dyn SharedCache>,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    /// Newest record timestamp this worker has read or written. Floors fallback timestamps.
    high_water: AtomicI64,
}

impl DedupWorker {
    pub fn new(
        cache: Arc<dyn SharedCache>,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            store,
            clock,
            high_water: AtomicI64::new(0),
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let set = match cache::read_snapshot_set(self.cache.as_ref()).await {
            Ok(Some(set)) => set,
            Ok(None) => {
                debug!(operation = "dedup_cycle", "no data in cache yet");
                return Ok(CycleOutcome::default());
            }
            Err(e @ PipelineError::DataFormat { .. }) => {
                warn!(error = %e, operation = "dedup_cycle", "unreadable cache payload, treating as no data");
                return Ok(CycleOutcome::default());
            }
            Err(e) => return Err(e),
        };

        let now = self.clock.now_ms();
        let (batch, degraded) = self.plan_batch(&set.containers, now).await;
        let mut outcome = CycleOutcome {
            observed: set.containers.len(),
            appended: 0,
            degraded,
        };
        if batch.is_empty() {
            return Ok(outcome);
        }

        let written = self
            .store
            .append_batch(&batch)
            .await
            .map_err(|e| PipelineError::partial_batch(batch.len(), e))?;
        if let Some(newest) = batch.iter().map(|r| r.timestamp).max() {
            self.high_water.fetch_max(newest, Ordering::SeqCst);
        }
        outcome.appended = written as usize;
        Ok(outcome)
    }

    /// Records to append for this cycle, and whether the cold-start fallback was taken.
    async fn plan_batch(&self, containers: &[ContainerSnapshot], now: i64) -> (Vec<NewRecord>, bool) {
        let mut batch = Vec::new();
        for snapshot in containers {
            let lookup = self.store.latest_record(&snapshot.name).await;
            if let Ok(Some(last)) = &lookup {
                self.high_water.fetch_max(last.timestamp, Ordering::SeqCst);
            }
            match lookup {
                Ok(Some(last)) if last.status == snapshot.status => {}
                Ok(Some(last)) => {
                    // Per-name timestamps must stay strictly increasing.
                    let ts = now.max(last.timestamp + 1);
                    batch.push(NewRecord::from_snapshot(snapshot, ts));
                }
                Ok(None) => batch.push(NewRecord::from_snapshot(snapshot, now)),
                Err(e) => {
                    warn!(
                        error = %e,
                        operation = "latest_record",
                        container = %snapshot.name,
                        "last-record lookup failed; persisting every observed container this cycle"
                    );
                    // The failed name's last timestamp is unknown; stay past everything seen.
                    let ts = now.max(self.high_water.load(Ordering::SeqCst) + 1);
                    let all = containers
                        .iter()
                        .map(|s| NewRecord::from_snapshot(s, ts))
                        .collect();
                    return (all, true);
                }
            }
        }
        (batch, false)
    }

    #[instrument(name = "dedup_worker", skip_all, fields(interval_secs = cadence.interval.as_secs()))]
    pub async fn run(self, cadence: Cadence, mut shutdown_rx: oneshot::Receiver<()>) {
        loop {
            let result = self.run_cycle().await;
            match &result {
                Ok(outcome) if outcome.appended > 0 => info!(
                    operation = "dedup_cycle",
                    observed = outcome.observed,
                    appended = outcome.appended,
                    degraded = outcome.degraded,
                    "history updated"
                ),
                Ok(outcome) => debug!(
                    operation = "dedup_cycle",
                    observed = outcome.observed,
                    "no status changes"
                ),
                Err(e) => warn!(
                    error = %e,
                    kind = e.kind(),
                    operation = "dedup_cycle",
                    "cycle failed; retrying after backoff"
                ),
            }
            if cadence::sleep_or_shutdown(cadence.next_delay(&result), &mut shutdown_rx).await {
                debug!("Dedup worker shutting down");
                break;
            }
        }
    }
}

pub fn spawn(
    worker: DedupWorker,
    cadence: Cadence,
    shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(worker.run(cadence, shutdown_rx))
}
