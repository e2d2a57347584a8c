// Durable, append-only container status history.
// Rows are inserted by the dedup worker (or bulk ingest) and deleted only by age-based purge.

mod memory;
mod sqlite;

pub use memory::MemoryHistory;
pub use sqlite::SqliteHistory;

use async_trait::async_trait;

use crate::models::{ContainerRecord, NewRecord};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recent record for `name` (by timestamp, then id).
    async fn latest_record(&self, name: &str) -> anyhow::Result<Option<ContainerRecord>>;

    /// Inserts all records in one transaction: either every row persists or none does.
    async fn append_batch(&self, records: &[NewRecord]) -> anyhow::Result<u64>;

    /// Deletes records with timestamp < cutoff_ms in one transaction. Returns rows removed.
    async fn purge_older_than(&self, cutoff_ms: i64) -> anyhow::Result<u64>;

    /// Records with timestamp >= since_ms, ascending by timestamp (ties by id).
    async fn records_since(&self, since_ms: i64) -> anyhow::Result<Vec<ContainerRecord>>;

    /// Cheap reachability check for the health probe.
    async fn ping(&self) -> anyhow::Result<()>;
}
