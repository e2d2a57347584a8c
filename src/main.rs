use anyhow::{Context, Result};
use dockwatch::cache::{MemoryCache, SharedCache, SqliteCache};
use dockwatch::clock::{Clock, SystemClock};
use dockwatch::collector::{self, Collector};
use dockwatch::config::{AppConfig, CacheBackend};
use dockwatch::dedup_worker::{self, DedupWorker};
use dockwatch::history::{HistoryStore, SqliteHistory};
use dockwatch::retention::{self, RetentionScheduler};
use dockwatch::routes;
use dockwatch::runtime::{ContainerRuntime, DockerRuntime};
use dockwatch::version::{NAME, VERSION};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = AppConfig::load()?;
    tracing::info!(name = NAME, version = VERSION, roles = ?app_config.roles, "starting");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Schema setup failure aborts startup; everything after this is retried in-loop.
    let history = SqliteHistory::connect(&app_config.database.path).await?;
    history
        .init()
        .await
        .context("failed to initialise history schema")?;
    let store: Arc<dyn HistoryStore> = Arc::new(history);

    let cache: Arc<dyn SharedCache> = match app_config.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Sqlite => {
            let path = app_config.cache.path.as_deref().unwrap_or_default();
            let cache = SqliteCache::open(path)?;
            // Not fatal: every cache call retries the schema until the file is reachable.
            if let Err(e) = cache.init().await {
                tracing::warn!(error = %e, path, "shared cache not reachable yet");
            }
            Arc::new(cache)
        }
    };

    let mut shutdowns: Vec<oneshot::Sender<()>> = Vec::new();
    let mut handles: Vec<tokio::task::JoinHandle<()>> = Vec::new();

    if app_config.roles.collector {
        let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::connect()?);
        let (tx, rx) = oneshot::channel();
        shutdowns.push(tx);
        handles.push(collector::spawn(
            Collector::new(runtime, cache.clone(), clock.clone()),
            app_config.collector.cadence(),
            rx,
        ));
    }

    if app_config.roles.worker {
        let (tx, rx) = oneshot::channel();
        shutdowns.push(tx);
        handles.push(dedup_worker::spawn(
            DedupWorker::new(cache.clone(), store.clone(), clock.clone()),
            app_config.worker.cadence(),
            rx,
        ));
    }

    if app_config.roles.scheduler {
        let (tx, rx) = oneshot::channel();
        shutdowns.push(tx);
        let scheduler = Arc::new(RetentionScheduler::with_retention_days(
            cache.clone(),
            store.clone(),
            clock.clone(),
            app_config.database.retention_days,
        ));
        handles.push(retention::spawn(
            scheduler,
            app_config.scheduler.to_scheduler_config(),
            rx,
        ));
    }

    if app_config.roles.api {
        let app = routes::app(cache, store, clock);
        let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Listening on http://{}", addr);
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = shutdown_signal() => {}
        }
    } else {
        shutdown_signal().await;
    }

    tracing::info!("Received shutdown signal");
    for tx in shutdowns {
        let _ = tx.send(());
    }
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
