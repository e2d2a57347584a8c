// File-backed cache so the collector and the worker can run as separate processes.
// Each put is a single upsert statement, so readers see the old or the new value only.
// An unreachable file is a per-call error, never a startup failure.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;
use tracing::{instrument, warn};

use super::SharedCache;

pub struct SqliteCache {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

impl SqliteCache {
    /// Opens the cache without touching the file; connection and schema are set up on first
    /// use and retried on every call until they succeed. Errors only on an unparsable path.
    pub fn open(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(error = %e, path, "cannot create cache directory yet");
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_lazy_with(opts);
        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    /// Creates the table if needed. Idempotent; other calls run it implicitly.
    pub async fn init(&self) -> anyhow::Result<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS cache_entries (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
                )
                .execute(&self.pool)
                .await
                .map(|_| ())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SharedCache for SqliteCache {
    #[instrument(skip(self, value), fields(repo = "cache", operation = "put"))]
    async fn put(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.init().await?;
        sqlx::query(
            "INSERT INTO cache_entries (key, value) VALUES ($1, $2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.init().await?;
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM cache_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.init().await?;
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
