// In-memory history for tests and single-shot tooling. One mutex guards the whole table,
// so a batch is visible all at once.

use std::sync::Mutex;

use async_trait::async_trait;

use super::HistoryStore;
use crate::models::{ContainerRecord, NewRecord};

#[derive(Default)]
pub struct MemoryHistory {
    inner: Mutex<Table>,
}

#[derive(Default)]
struct Table {
    rows: Vec<ContainerRecord>,
    next_id: i64,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Table>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("history lock poisoned: {}", e))
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn latest_record(&self, name: &str) -> anyhow::Result<Option<ContainerRecord>> {
        let table = self.lock()?;
        Ok(table
            .rows
            .iter()
            .filter(|r| r.name == name)
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn append_batch(&self, records: &[NewRecord]) -> anyhow::Result<u64> {
        let mut table = self.lock()?;
        for r in records {
            table.next_id += 1;
            let id = table.next_id;
            table.rows.push(ContainerRecord {
                id,
                name: r.name.clone(),
                status: r.status,
                image: r.image.clone(),
                timestamp: r.timestamp,
            });
        }
        Ok(records.len() as u64)
    }

    async fn purge_older_than(&self, cutoff_ms: i64) -> anyhow::Result<u64> {
        let mut table = self.lock()?;
        let before = table.rows.len();
        table.rows.retain(|r| r.timestamp >= cutoff_ms);
        Ok((before - table.rows.len()) as u64)
    }

    async fn records_since(&self, since_ms: i64) -> anyhow::Result<Vec<ContainerRecord>> {
        let table = self.lock()?;
        let mut out: Vec<ContainerRecord> = table
            .rows
            .iter()
            .filter(|r| r.timestamp >= since_ms)
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.timestamp, r.id));
        Ok(out)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.lock().map(|_| ())
    }
}
