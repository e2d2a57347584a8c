// Shared cache: last-value hand-off between the collector and the dedup worker.
// Plain put/get with full overwrite; no merge, dedup or expiry here.

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::{ContainerSnapshot, CurrentSnapshotSet};

/// Serialized `Vec<ContainerSnapshot>` (JSON array).
pub const CONTAINERS_STATUS_KEY: &str = "containers_status";
/// Epoch seconds of the last successful collector write.
pub const LAST_UPDATE_KEY: &str = "last_update";

#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Replaces the value under `key` as a whole.
    async fn put(&self, key: &str, value: String) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Cheap reachability check for the health probe.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Writes one full generation: the snapshot list in a single put, then `last_update`.
pub async fn write_snapshot_set(
    cache: &dyn SharedCache,
    containers: &[ContainerSnapshot],
    now_ms: i64,
) -> Result<(), PipelineError> {
    let payload = serde_json::to_string(containers).map_err(|e| PipelineError::DataFormat {
        key: CONTAINERS_STATUS_KEY.to_string(),
        reason: e.to_string(),
    })?;
    cache
        .put(CONTAINERS_STATUS_KEY, payload)
        .await
        .map_err(|e| PipelineError::transient("cache", e))?;
    cache
        .put(LAST_UPDATE_KEY, (now_ms / 1000).to_string())
        .await
        .map_err(|e| PipelineError::transient("cache", e))?;
    Ok(())
}

/// Reads the current snapshot set. `Ok(None)` when nothing has been written yet;
/// `Err(DataFormat)` when the payload is not a JSON array.
pub async fn read_snapshot_set(
    cache: &dyn SharedCache,
) -> Result<Option<CurrentSnapshotSet>, PipelineError> {
    let raw = cache
        .get(CONTAINERS_STATUS_KEY)
        .await
        .map_err(|e| PipelineError::transient("cache", e))?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let containers = parse_snapshot_payload(&raw)?;

    let updated_at = match cache.get(LAST_UPDATE_KEY).await {
        Ok(Some(v)) => v.trim().parse::<i64>().ok(),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(error = %e, key = LAST_UPDATE_KEY, "cache read failed");
            None
        }
    };

    Ok(Some(CurrentSnapshotSet {
        containers,
        updated_at,
    }))
}

/// Validates a `containers_status` payload. Entries that do not match the snapshot schema,
/// or that have an empty name, are dropped; a repeated name keeps its first entry.
pub fn parse_snapshot_payload(raw: &str) -> Result<Vec<ContainerSnapshot>, PipelineError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| PipelineError::DataFormat {
            key: CONTAINERS_STATUS_KEY.to_string(),
            reason: e.to_string(),
        })?;

    let mut seen = HashSet::with_capacity(entries.len());
    let mut out = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let snapshot: ContainerSnapshot = match serde_json::from_value(entry) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, index, "rejecting malformed snapshot entry");
                continue;
            }
        };
        if snapshot.name.trim().is_empty() {
            tracing::warn!(index, "rejecting snapshot entry with empty name");
            continue;
        }
        if !seen.insert(snapshot.name.clone()) {
            tracing::debug!(name = %snapshot.name, "duplicate name in snapshot, keeping first");
            continue;
        }
        out.push(snapshot);
    }
    Ok(out)
}
