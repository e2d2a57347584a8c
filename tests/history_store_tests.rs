// SqliteHistory tests: connect, init, append, latest, range, purge, batch atomicity

mod common;

use std::sync::Arc;

use common::publish;
use dockwatch::cache::MemoryCache;
use dockwatch::clock::ManualClock;
use dockwatch::dedup_worker::DedupWorker;
use dockwatch::history::{HistoryStore, SqliteHistory};
use dockwatch::models::{ContainerState, NewRecord};
use tempfile::TempDir;

fn record(name: &str, status: ContainerState, timestamp: i64) -> NewRecord {
    NewRecord {
        name: name.into(),
        status,
        image: "img".into(),
        timestamp,
    }
}

async fn open(dir: &TempDir) -> (SqliteHistory, String) {
    let path = dir.path().join("history.db");
    let path_str = path.to_str().unwrap().to_string();
    let repo = SqliteHistory::connect(&path_str).await.unwrap();
    repo.init().await.unwrap();
    (repo, path_str)
}

#[tokio::test]
async fn history_connect_and_init() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = open(&dir).await;
    // Second init is no-op (IF NOT EXISTS)
    repo.init().await.unwrap();
    repo.ping().await.unwrap();
}

#[tokio::test]
async fn history_ping_fails_before_init() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("history.db");
    let repo = SqliteHistory::connect(path.to_str().unwrap()).await.unwrap();
    assert!(repo.ping().await.is_err());
    assert!(repo.latest_record("web").await.is_err());
}

#[tokio::test]
async fn history_latest_record_picks_newest_timestamp() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = open(&dir).await;

    let n = repo
        .append_batch(&[
            record("web", ContainerState::Running, 1_000),
            record("web", ContainerState::Exited, 3_000),
            record("db", ContainerState::Running, 2_000),
        ])
        .await
        .unwrap();
    assert_eq!(n, 3);

    let latest = repo.latest_record("web").await.unwrap().unwrap();
    assert_eq!(latest.status, ContainerState::Exited);
    assert_eq!(latest.timestamp, 3_000);
    assert!(latest.id > 0);
    assert!(repo.latest_record("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn history_append_empty_no_op() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = open(&dir).await;
    assert_eq!(repo.append_batch(&[]).await.unwrap(), 0);
    assert!(repo.records_since(i64::MIN).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_records_since_is_ordered_and_inclusive() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = open(&dir).await;
    repo.append_batch(&[
        record("b", ContainerState::Running, 3_000),
        record("a", ContainerState::Running, 1_000),
        record("c", ContainerState::Exited, 2_000),
    ])
    .await
    .unwrap();

    let since = repo.records_since(2_000).await.unwrap();
    let names: Vec<_> = since.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["c", "b"]);
}

#[tokio::test]
async fn history_purge_keeps_boundary_row() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = open(&dir).await;
    let cutoff = 1_700_000_000_000;
    repo.append_batch(&[
        record("old", ContainerState::Running, cutoff - 1_000),
        record("edge", ContainerState::Running, cutoff),
        record("new", ContainerState::Running, cutoff + 1_000),
    ])
    .await
    .unwrap();

    assert_eq!(repo.purge_older_than(cutoff).await.unwrap(), 1);
    let left: Vec<_> = repo
        .records_since(i64::MIN)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(left, vec!["edge", "new"]);

    // Second purge with the same cutoff removes nothing.
    assert_eq!(repo.purge_older_than(cutoff).await.unwrap(), 0);
}

#[tokio::test]
async fn history_failed_batch_rolls_back_every_row() {
    let dir = TempDir::new().unwrap();
    let (repo, path) = open(&dir).await;

    let admin = sqlx::SqlitePool::connect(&format!("sqlite:{}", path))
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_poison BEFORE INSERT ON container_history
         WHEN NEW.container_name = 'poison'
         BEGIN SELECT RAISE(ABORT, 'poisoned row'); END",
    )
    .execute(&admin)
    .await
    .unwrap();

    let err = repo
        .append_batch(&[
            record("web", ContainerState::Running, 1_000),
            record("poison", ContainerState::Running, 1_000),
        ])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("poisoned"));
    assert!(repo.records_since(i64::MIN).await.unwrap().is_empty());
}

#[tokio::test]
async fn dedup_worker_retries_rolled_back_cycle_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let (repo, path) = open(&dir).await;
    let store = Arc::new(repo);
    let cache = Arc::new(MemoryCache::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let worker = DedupWorker::new(cache.clone(), store.clone(), clock);

    let admin = sqlx::SqlitePool::connect(&format!("sqlite:{}", path))
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_db BEFORE INSERT ON container_history
         WHEN NEW.container_name = 'db'
         BEGIN SELECT RAISE(ABORT, 'db rejected'); END",
    )
    .execute(&admin)
    .await
    .unwrap();

    publish(
        cache.as_ref(),
        &[("web", ContainerState::Running), ("db", ContainerState::Exited)],
        1_000,
    )
    .await;
    let err = worker.run_cycle().await.unwrap_err();
    assert_eq!(err.kind(), "partial_batch");
    assert!(store.records_since(i64::MIN).await.unwrap().is_empty());

    sqlx::query("DROP TRIGGER reject_db")
        .execute(&admin)
        .await
        .unwrap();
    let outcome = worker.run_cycle().await.unwrap();
    assert_eq!(outcome.appended, 2);
    assert_eq!(store.records_since(i64::MIN).await.unwrap().len(), 2);
}
