// End-to-end: collector -> cache -> dedup worker -> history, with in-memory backends

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{StubRuntime, assert_dedup_invariant, container};
use dockwatch::cache::MemoryCache;
use dockwatch::cadence::Cadence;
use dockwatch::clock::ManualClock;
use dockwatch::collector::{self, Collector};
use dockwatch::dedup_worker::{self, DedupWorker};
use dockwatch::history::{HistoryStore, MemoryHistory};
use dockwatch::models::ContainerState::{Exited, Paused, Running};
use tokio::sync::oneshot;

const T0: i64 = 1_700_000_000_000;

#[tokio::test]
async fn status_change_is_recorded_exactly_once() {
    let runtime = Arc::new(StubRuntime::new(vec![
        container("web", Running),
        container("db", Exited),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let store = Arc::new(MemoryHistory::new());
    let clock = Arc::new(ManualClock::new(T0));
    let collector = Collector::new(runtime.clone(), cache.clone(), clock.clone());
    let worker = DedupWorker::new(cache.clone(), store.clone(), clock.clone());

    // Cold start: both containers recorded.
    collector.collect_once().await.unwrap();
    assert_eq!(worker.run_cycle().await.unwrap().appended, 2);

    // Nothing changed.
    clock.advance(Duration::from_secs(60));
    collector.collect_once().await.unwrap();
    assert_eq!(worker.run_cycle().await.unwrap().appended, 0);

    // web stops.
    clock.advance(Duration::from_secs(60));
    runtime.set(vec![container("web", Exited), container("db", Exited)]);
    collector.collect_once().await.unwrap();
    assert_eq!(worker.run_cycle().await.unwrap().appended, 1);

    let records = store.records_since(i64::MIN).await.unwrap();
    assert_eq!(records.len(), 3);
    let last = records.last().unwrap();
    assert_eq!(last.name, "web");
    assert_eq!(last.status, Exited);
    assert_eq!(last.timestamp, T0 + 120_000);
    assert_eq!(last.image, "web:latest");
    assert_dedup_invariant(&records);
}

#[tokio::test]
async fn removed_container_keeps_its_history() {
    let runtime = Arc::new(StubRuntime::new(vec![
        container("web", Running),
        container("batch", Running),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let store = Arc::new(MemoryHistory::new());
    let clock = Arc::new(ManualClock::new(T0));
    let collector = Collector::new(runtime.clone(), cache.clone(), clock.clone());
    let worker = DedupWorker::new(cache.clone(), store.clone(), clock.clone());

    collector.collect_once().await.unwrap();
    worker.run_cycle().await.unwrap();

    clock.advance(Duration::from_secs(60));
    runtime.set(vec![container("web", Running)]);
    collector.collect_once().await.unwrap();
    assert_eq!(worker.run_cycle().await.unwrap().appended, 0);

    let batch = store.latest_record("batch").await.unwrap().unwrap();
    assert_eq!(batch.status, Running);
}

#[tokio::test(start_paused = true)]
async fn loops_converge_on_latest_statuses() {
    let runtime = Arc::new(StubRuntime::new(vec![
        container("web", Running),
        container("db", Running),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let store = Arc::new(MemoryHistory::new());
    let clock = Arc::new(ManualClock::new(T0));

    let (collector_tx, collector_rx) = oneshot::channel();
    let (worker_tx, worker_rx) = oneshot::channel();
    let collector_handle = collector::spawn(
        Collector::new(runtime.clone(), cache.clone(), clock.clone()),
        Cadence::from_secs(10, 5),
        collector_rx,
    );
    // Let the first collection land before the worker reads the cache.
    tokio::task::yield_now().await;
    let worker_handle = dedup_worker::spawn(
        DedupWorker::new(cache.clone(), store.clone(), clock.clone()),
        Cadence::from_secs(30, 10),
        worker_rx,
    );

    let script = [
        vec![container("web", Exited), container("db", Running)],
        vec![container("web", Exited), container("db", Paused)],
        vec![container("web", Running), container("db", Paused)],
    ];
    for containers in script {
        tokio::time::sleep(Duration::from_secs(45)).await;
        clock.advance(Duration::from_secs(45));
        runtime.set(containers);
    }
    tokio::time::sleep(Duration::from_secs(45)).await;

    collector_tx.send(()).unwrap();
    worker_tx.send(()).unwrap();
    collector_handle.await.unwrap();
    worker_handle.await.unwrap();

    let records = store.records_since(i64::MIN).await.unwrap();
    assert_dedup_invariant(&records);
    assert_eq!(
        store.latest_record("web").await.unwrap().unwrap().status,
        Running
    );
    assert_eq!(
        store.latest_record("db").await.unwrap().unwrap().status,
        Paused
    );
    // Initial pair plus one record per scripted change.
    assert_eq!(records.len(), 5);
}
