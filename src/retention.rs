// Periodic jobs over the history store: purge, report, health probe.
// Each job has its own trigger (cron expression in local time, or a fixed interval).
// Purge and report share one executor loop; health probes run on a separate task.
// A failed purge is retried every `retry_backoff` until it succeeds.
// Jobs share no transaction with the dedup worker.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use crate::cache::SharedCache;
use crate::clock::Clock;
use crate::error::PipelineError;
use crate::health::{self, HealthReport};
use crate::history::HistoryStore;

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Purge,
    Report,
    Health,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Purge => "purge",
            Job::Report => "report",
            Job::Health => "health",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSchedule {
    /// Cron expression (with seconds field), evaluated in local time.
    Cron(String),
    Every(Duration),
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub purge: JobSchedule,
    pub report: JobSchedule,
    pub health: JobSchedule,
    /// Delay before a failed purge is tried again.
    pub retry_backoff: Duration,
}

pub struct RetentionScheduler {
    cache: Arc<dyn SharedCache>,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    retention_ms: i64,
}

impl RetentionScheduler {
    pub fn new(
        cache: Arc<dyn SharedCache>,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        retention: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            clock,
            retention_ms: retention.as_millis() as i64,
        }
    }

    pub fn with_retention_days(
        cache: Arc<dyn SharedCache>,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        retention_days: u32,
    ) -> Self {
        let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
        Self::new(cache, store, clock, retention)
    }

    /// Deletes records strictly older than the retention window. A record exactly at the
    /// boundary is kept.
    #[instrument(skip(self), fields(operation = "purge"))]
    pub async fn purge_once(&self) -> Result<u64, PipelineError> {
        let cutoff = self.clock.now_ms() - self.retention_ms;
        let deleted = self
            .store
            .purge_older_than(cutoff)
            .await
            .map_err(|e| PipelineError::transient("history", e))?;
        info!(deleted, cutoff_ms = cutoff, "purged old container history");
        Ok(deleted)
    }

    /// Reserved; currently only records that it ran.
    pub async fn report_once(&self) -> Result<(), PipelineError> {
        debug!(operation = "report", "daily report (no-op)");
        Ok(())
    }

    pub async fn health_probe(&self) -> HealthReport {
        let report = health::probe(self.cache.as_ref(), self.store.as_ref()).await;
        if report.is_healthy() {
            debug!(operation = "health", "cache and history reachable");
        } else {
            for s in report.subsystems.iter().filter(|s| s.message.is_some()) {
                warn!(
                    operation = "health",
                    subsystem = %s.name,
                    message = s.message.as_deref().unwrap_or_default(),
                    "subsystem unhealthy"
                );
            }
        }
        report
    }

    async fn run_job(&self, job: Job) -> Result<(), PipelineError> {
        match job {
            Job::Purge => self.purge_once().await.map(|_| ()),
            Job::Report => self.report_once().await,
            Job::Health => {
                self.health_probe().await;
                Ok(())
            }
        }
    }
}

/// Spawns the trigger tasks and the executor loop. Returns the executor's join handle.
pub fn spawn(
    scheduler: Arc<RetentionScheduler>,
    config: SchedulerConfig,
    shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(scheduler, config, shutdown_rx))
}

#[instrument(name = "retention_scheduler", skip_all)]
async fn run(
    scheduler: Arc<RetentionScheduler>,
    config: SchedulerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let (job_tx, mut job_rx) = mpsc::channel::<Job>(8);
    // Health probes run on their own task so a slow purge never holds them up.
    let (health_tx, mut health_rx) = mpsc::channel::<Job>(1);
    let health_runner = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            while health_rx.recv().await.is_some() {
                scheduler.health_probe().await;
            }
        })
    };
    let tasks = [
        tokio::spawn(trigger(Job::Purge, config.purge.clone(), job_tx.clone())),
        tokio::spawn(trigger(Job::Report, config.report.clone(), job_tx.clone())),
        tokio::spawn(trigger(Job::Health, config.health.clone(), health_tx)),
        health_runner,
    ];
    // At most one purge retry is pending at a time.
    let retry_pending = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            Some(job) = job_rx.recv() => {
                if let Err(e) = scheduler.run_job(job).await {
                    warn!(error = %e, kind = e.kind(), job = job.name(), "scheduled job failed");
                    if job == Job::Purge && !retry_pending.swap(true, Ordering::SeqCst) {
                        let retry_tx = job_tx.clone();
                        let pending = retry_pending.clone();
                        let backoff = config.retry_backoff;
                        tokio::spawn(async move {
                            tokio::time::sleep(backoff).await;
                            pending.store(false, Ordering::SeqCst);
                            let _ = retry_tx.send(Job::Purge).await;
                        });
                    }
                }
            }
            _ = &mut shutdown_rx => {
                debug!("Retention scheduler shutting down");
                break;
            }
        }
    }

    for t in tasks {
        t.abort();
    }
}

/// Sends `job` on `tx` at each scheduled time until the executor goes away.
async fn trigger(job: Job, schedule: JobSchedule, tx: mpsc::Sender<Job>) {
    match schedule {
        JobSchedule::Cron(expr) => {
            let Ok(schedule) = cron::Schedule::from_str(&expr) else {
                warn!(cron = %expr, job = job.name(), "invalid schedule; job will not run");
                return;
            };
            loop {
                let now = chrono::Local::now();
                let Some(next) = schedule.after(&now).next() else {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    continue;
                };
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(job).await.is_err() {
                    break;
                }
            }
        }
        JobSchedule::Every(period) => loop {
            tokio::time::sleep(period).await;
            if tx.send(job).await.is_err() {
                break;
            }
        },
    }
}
