// Reachability probe for the cache and the history store.
// Read-only pings with a timeout; never takes a write transaction.

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, timeout};

use crate::cache::SharedCache;
use crate::history::HistoryStore;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub subsystems: Vec<SubsystemHealth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

pub async fn probe(cache: &dyn SharedCache, store: &dyn HistoryStore) -> HealthReport {
    let (cache_result, store_result) = tokio::join!(
        timeout(PROBE_TIMEOUT, cache.ping()),
        timeout(PROBE_TIMEOUT, store.ping()),
    );
    let subsystems = vec![
        subsystem("cache", cache_result),
        subsystem("history", store_result),
    ];
    let status = if subsystems.iter().all(|s| s.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };
    HealthReport { status, subsystems }
}

fn subsystem(
    name: &str,
    result: Result<anyhow::Result<()>, tokio::time::error::Elapsed>,
) -> SubsystemHealth {
    let (status, message) = match result {
        Ok(Ok(())) => (HealthStatus::Healthy, None),
        Ok(Err(e)) => (HealthStatus::Unhealthy, Some(e.to_string())),
        Err(_) => (
            HealthStatus::Unhealthy,
            Some(format!("no answer within {}s", PROBE_TIMEOUT.as_secs())),
        ),
    };
    SubsystemHealth {
        name: name.to_string(),
        status,
        message,
    }
}
