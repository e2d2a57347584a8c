// Container snapshot models (what the collector hands to the cache)

use serde::{Deserialize, Serialize};

/// Docker container state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from Docker API state string (e.g. "running", "exited").
    pub fn from_docker(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    /// Column value in container_history.status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image name used when the runtime or an ingest payload does not report one.
pub const UNKNOWN_IMAGE: &str = "unknown";

/// One container as seen by a single collector poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub name: String,
    pub status: ContainerState,
    pub image: String,
    pub id: String,
    /// Epoch milliseconds of the poll that produced this entry.
    pub collected_at: i64,
}

/// Latest complete listing from the cache: `containers_status` plus `last_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSnapshotSet {
    pub containers: Vec<ContainerSnapshot>,
    /// Epoch seconds of the last successful collector write, if recorded.
    pub updated_at: Option<i64>,
}

/// Public shape of a current container (`GET /api/containers/current`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentContainer {
    pub name: String,
    pub status: ContainerState,
    pub image: String,
    pub id: String,
}

impl From<&ContainerSnapshot> for CurrentContainer {
    fn from(s: &ContainerSnapshot) -> Self {
        Self {
            name: s.name.clone(),
            status: s.status,
            image: s.image.clone(),
            id: s.id.clone(),
        }
    }
}
