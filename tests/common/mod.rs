// Shared test helpers: scripted runtime, fault-injecting history, snapshot builders

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dockwatch::cache::{self, SharedCache};
use dockwatch::history::{HistoryStore, MemoryHistory};
use dockwatch::models::*;
use dockwatch::runtime::{ContainerRuntime, RuntimeContainer};

pub fn container(name: &str, state: ContainerState) -> RuntimeContainer {
    RuntimeContainer {
        id: format!("id-{}", name),
        name: name.to_string(),
        image: format!("{}:latest", name),
        state,
    }
}

pub fn snapshot(name: &str, status: ContainerState, collected_at: i64) -> ContainerSnapshot {
    ContainerSnapshot {
        name: name.to_string(),
        status,
        image: format!("{}:latest", name),
        id: format!("id-{}", name),
        collected_at,
    }
}

/// Publishes `[(name, status)]` to the cache the way the collector does.
pub async fn publish(cache: &dyn SharedCache, entries: &[(&str, ContainerState)], now_ms: i64) {
    let snapshots: Vec<ContainerSnapshot> = entries
        .iter()
        .map(|(n, s)| snapshot(n, *s, now_ms))
        .collect();
    cache::write_snapshot_set(cache, &snapshots, now_ms)
        .await
        .unwrap();
}

/// Per name: timestamps strictly increase and adjacent statuses differ.
pub fn assert_dedup_invariant(records: &[ContainerRecord]) {
    let mut by_name: HashMap<&str, Vec<&ContainerRecord>> = HashMap::new();
    for r in records {
        by_name.entry(r.name.as_str()).or_default().push(r);
    }
    for (name, mut rows) in by_name {
        rows.sort_by_key(|r| (r.timestamp, r.id));
        for pair in rows.windows(2) {
            assert!(
                pair[0].timestamp < pair[1].timestamp,
                "{}: timestamps not strictly increasing ({} then {})",
                name,
                pair[0].timestamp,
                pair[1].timestamp
            );
            assert_ne!(
                pair[0].status, pair[1].status,
                "{}: adjacent records share status {}",
                name, pair[0].status
            );
        }
    }
}

/// Runtime whose listing is set by the test; can be told to fail the next N polls.
#[derive(Default)]
pub struct StubRuntime {
    containers: Mutex<Vec<RuntimeContainer>>,
    failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl StubRuntime {
    pub fn new(containers: Vec<RuntimeContainer>) -> Self {
        Self {
            containers: Mutex::new(containers),
            ..Default::default()
        }
    }

    pub fn set(&self, containers: Vec<RuntimeContainer>) {
        *self.containers.lock().unwrap() = containers;
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for StubRuntime {
    async fn list_all(&self) -> anyhow::Result<Vec<RuntimeContainer>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures) {
            anyhow::bail!("Cannot connect to the Docker daemon at unix:///var/run/docker.sock");
        }
        Ok(self.containers.lock().unwrap().clone())
    }
}

/// MemoryHistory with injectable lookup / append / purge / ping failures.
#[derive(Default)]
pub struct FlakyHistory {
    pub inner: MemoryHistory,
    lookup_failures: AtomicUsize,
    append_failures: AtomicUsize,
    purge_failures: AtomicUsize,
    purge_stalls: AtomicBool,
    ping_fails: AtomicBool,
    pub append_calls: AtomicUsize,
    pub purge_calls: AtomicUsize,
    pub ping_calls: AtomicUsize,
}

impl FlakyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_lookups(&self, n: usize) {
        self.lookup_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, n: usize) {
        self.append_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_purges(&self, n: usize) {
        self.purge_failures.store(n, Ordering::SeqCst);
    }

    /// Purge calls never return while set.
    pub fn stall_purges(&self, stall: bool) {
        self.purge_stalls.store(stall, Ordering::SeqCst);
    }

    pub fn fail_ping(&self, fail: bool) {
        self.ping_fails.store(fail, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<ContainerRecord> {
        self.inner.records_since(i64::MIN).await.unwrap()
    }
}

#[async_trait]
impl HistoryStore for FlakyHistory {
    async fn latest_record(&self, name: &str) -> anyhow::Result<Option<ContainerRecord>> {
        if take_one(&self.lookup_failures) {
            anyhow::bail!("no such table: container_history");
        }
        self.inner.latest_record(name).await
    }

    async fn append_batch(&self, records: &[NewRecord]) -> anyhow::Result<u64> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.append_failures) {
            anyhow::bail!("database is locked");
        }
        self.inner.append_batch(records).await
    }

    async fn purge_older_than(&self, cutoff_ms: i64) -> anyhow::Result<u64> {
        self.purge_calls.fetch_add(1, Ordering::SeqCst);
        if self.purge_stalls.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if take_one(&self.purge_failures) {
            anyhow::bail!("database is locked");
        }
        self.inner.purge_older_than(cutoff_ms).await
    }

    async fn records_since(&self, since_ms: i64) -> anyhow::Result<Vec<ContainerRecord>> {
        self.inner.records_since(since_ms).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if self.ping_fails.load(Ordering::SeqCst) {
            anyhow::bail!("unable to open database file");
        }
        self.inner.ping().await
    }
}

/// Consumes one scripted failure if any are left.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
