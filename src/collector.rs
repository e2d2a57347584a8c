// Producer: polls the container runtime and publishes each full listing to the shared cache.
// A failed poll leaves the previous generation in place.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::cache::{self, SharedCache};
use crate::cadence::{self, Cadence};
use crate::clock::Clock;
use crate::error::PipelineError;
use crate::models::ContainerSnapshot;
use crate::runtime::ContainerRuntime;

pub struct Collector {
    runtime: Arc<dyn ContainerRuntime>,
    cache: Arc<dyn SharedCache>,
    clock: Arc<dyn Clock>,
}

impl Collector {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        cache: Arc<dyn SharedCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runtime,
            cache,
            clock,
        }
    }

    /// One poll: list everything, stamp it, overwrite the cached generation.
    /// Returns the number of containers published.
    pub async fn collect_once(&self) -> Result<usize, PipelineError> {
        let listed = self
            .runtime
            .list_all()
            .await
            .map_err(|e| PipelineError::transient("runtime", e))?;

        let now = self.clock.now_ms();
        let snapshots: Vec<ContainerSnapshot> = listed
            .into_iter()
            .map(|c| ContainerSnapshot {
                name: c.name,
                status: c.state,
                image: c.image,
                id: c.id,
                collected_at: now,
            })
            .collect();

        cache::write_snapshot_set(self.cache.as_ref(), &snapshots, now).await?;
        Ok(snapshots.len())
    }

    #[instrument(name = "collector", skip_all, fields(interval_secs = cadence.interval.as_secs()))]
    pub async fn run(self, cadence: Cadence, mut shutdown_rx: oneshot::Receiver<()>) {
        loop {
            let result = self.collect_once().await;
            match &result {
                Ok(count) => debug!(operation = "collect", containers = count, "snapshot published"),
                Err(e) => warn!(
                    error = %e,
                    kind = e.kind(),
                    operation = "collect",
                    "collection failed; cache left unchanged"
                ),
            }
            if cadence::sleep_or_shutdown(cadence.next_delay(&result), &mut shutdown_rx).await {
                debug!("Collector shutting down");
                break;
            }
        }
    }
}

pub fn spawn(
    collector: Collector,
    cadence: Cadence,
    shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(collector.run(cadence, shutdown_rx))
}
