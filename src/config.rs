use serde::Deserialize;
use std::time::Duration;

use crate::cadence::Cadence;
use crate::retention::{DEFAULT_RETENTION_DAYS, JobSchedule, SchedulerConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub collector: LoopConfig,
    #[serde(default = "default_worker_loop")]
    pub worker: LoopConfig,
    #[serde(default)]
    pub scheduler: RetentionSchedulerConfig,
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process; all roles must run in the same process.
    #[default]
    Memory,
    /// Shared SQLite file; roles may run as separate processes.
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Required when backend = "sqlite".
    pub path: Option<String>,
}

/// Poll interval and failure backoff of a long-lived loop.
#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    pub interval_secs: u64,
    pub backoff_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            backoff_secs: 5,
        }
    }
}

impl LoopConfig {
    pub fn cadence(&self) -> Cadence {
        Cadence::from_secs(self.interval_secs, self.backoff_secs)
    }
}

fn default_worker_loop() -> LoopConfig {
    LoopConfig {
        interval_secs: 60,
        backoff_secs: 10,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSchedulerConfig {
    /// Cron expression for purge (local time). Takes precedence over purge_interval_secs.
    #[serde(default = "default_purge_schedule")]
    pub purge_schedule: Option<String>,
    #[serde(default = "default_daily_secs")]
    pub purge_interval_secs: u64,
    #[serde(default = "default_report_schedule")]
    pub report_schedule: Option<String>,
    #[serde(default = "default_daily_secs")]
    pub report_interval_secs: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
}

fn default_purge_schedule() -> Option<String> {
    Some("0 0 2 * * *".into())
}

fn default_report_schedule() -> Option<String> {
    Some("0 0 9 * * *".into())
}

fn default_daily_secs() -> u64 {
    24 * 60 * 60
}

fn default_health_interval_secs() -> u64 {
    600
}

fn default_retry_backoff_secs() -> u64 {
    60
}

impl Default for RetentionSchedulerConfig {
    fn default() -> Self {
        Self {
            purge_schedule: default_purge_schedule(),
            purge_interval_secs: default_daily_secs(),
            report_schedule: default_report_schedule(),
            report_interval_secs: default_daily_secs(),
            health_interval_secs: default_health_interval_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
        }
    }
}

impl RetentionSchedulerConfig {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        fn pick(cron: &Option<String>, every_secs: u64) -> JobSchedule {
            match cron {
                Some(expr) if !expr.trim().is_empty() => JobSchedule::Cron(expr.clone()),
                _ => JobSchedule::Every(Duration::from_secs(every_secs)),
            }
        }
        SchedulerConfig {
            purge: pick(&self.purge_schedule, self.purge_interval_secs),
            report: pick(&self.report_schedule, self.report_interval_secs),
            health: JobSchedule::Every(Duration::from_secs(self.health_interval_secs)),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        }
    }
}

/// Which roles this process runs. Defaults to all of them.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    #[serde(default = "default_true")]
    pub collector: bool,
    #[serde(default = "default_true")]
    pub worker: bool,
    #[serde(default = "default_true")]
    pub scheduler: bool,
    #[serde(default = "default_true")]
    pub api: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            collector: true,
            worker: true,
            scheduler: true,
            api: true,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.retention_days > 0,
            "database.retention_days must be > 0, got {}",
            self.database.retention_days
        );
        if self.cache.backend == CacheBackend::Sqlite {
            anyhow::ensure!(
                self.cache.path.as_deref().is_some_and(|p| !p.is_empty()),
                "cache.path must be set when cache.backend = \"sqlite\""
            );
        }
        for (name, l) in [("collector", &self.collector), ("worker", &self.worker)] {
            anyhow::ensure!(
                l.interval_secs > 0,
                "{}.interval_secs must be > 0, got {}",
                name,
                l.interval_secs
            );
            anyhow::ensure!(
                l.backoff_secs > 0,
                "{}.backoff_secs must be > 0, got {}",
                name,
                l.backoff_secs
            );
        }
        anyhow::ensure!(
            self.scheduler.purge_interval_secs > 0,
            "scheduler.purge_interval_secs must be > 0, got {}",
            self.scheduler.purge_interval_secs
        );
        anyhow::ensure!(
            self.scheduler.report_interval_secs > 0,
            "scheduler.report_interval_secs must be > 0, got {}",
            self.scheduler.report_interval_secs
        );
        anyhow::ensure!(
            self.scheduler.health_interval_secs > 0,
            "scheduler.health_interval_secs must be > 0, got {}",
            self.scheduler.health_interval_secs
        );
        anyhow::ensure!(
            self.scheduler.retry_backoff_secs > 0,
            "scheduler.retry_backoff_secs must be > 0, got {}",
            self.scheduler.retry_backoff_secs
        );
        Ok(())
    }
}
