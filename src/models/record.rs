// History record models (what the dedup worker appends to the store)

use serde::{Deserialize, Serialize};

use super::{ContainerSnapshot, ContainerState, UNKNOWN_IMAGE};

/// One persisted row of container_history. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub id: i64,
    pub name: String,
    pub status: ContainerState,
    pub image: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Insert-side record; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub name: String,
    pub status: ContainerState,
    pub image: String,
    pub timestamp: i64,
}

impl NewRecord {
    pub fn from_snapshot(s: &ContainerSnapshot, timestamp: i64) -> Self {
        Self {
            name: s.name.clone(),
            status: s.status,
            image: s.image.clone(),
            timestamp,
        }
    }
}

/// Body entry of `POST /api/containers/history` (out-of-band bulk ingest).
#[derive(Debug, Clone, Deserialize)]
pub struct IngestEntry {
    pub name: String,
    pub status: ContainerState,
    #[serde(default)]
    pub image: Option<String>,
}

impl IngestEntry {
    pub fn into_record(self, timestamp: i64) -> NewRecord {
        NewRecord {
            name: self.name,
            status: self.status,
            image: self
                .image
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| UNKNOWN_IMAGE.to_string()),
            timestamp,
        }
    }
}
