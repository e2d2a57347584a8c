// SQLite history. One narrow table, indexed for "latest by name" and for range/purge by time.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::instrument;

use super::HistoryStore;
use crate::models::{ContainerRecord, ContainerState, NewRecord};

pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Connect to SQLite at `path`, create parent dir and DB if missing, enable WAL + pragmas.
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    /// Creates the schema. Idempotent; a failure here is fatal at startup.
    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS container_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                container_name TEXT NOT NULL,
                status TEXT NOT NULL,
                image TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_name_timestamp ON container_history(container_name, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_timestamp ON container_history(timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn parse_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<ContainerRecord> {
        let status: String = row.try_get("status")?;
        Ok(ContainerRecord {
            id: row.try_get("id")?,
            name: row.try_get("container_name")?,
            status: ContainerState::from_docker(&status),
            image: row.try_get("image")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    #[instrument(skip(self), fields(repo = "history", operation = "latest_record"))]
    async fn latest_record(&self, name: &str) -> anyhow::Result<Option<ContainerRecord>> {
        let row = sqlx::query(
            "SELECT id, container_name, status, image, timestamp FROM container_history
             WHERE container_name = $1 ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }

    #[instrument(skip(self, records), fields(repo = "history", operation = "append_batch", records_count = records.len()))]
    async fn append_batch(&self, records: &[NewRecord]) -> anyhow::Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        // Dropping `tx` on an early `?` rolls the whole batch back.
        let mut tx = self.pool.begin().await?;
        for r in records {
            sqlx::query(
                "INSERT INTO container_history (container_name, status, image, timestamp) VALUES ($1, $2, $3, $4)",
            )
            .bind(&r.name)
            .bind(r.status.as_str())
            .bind(&r.image)
            .bind(r.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len() as u64)
    }

    #[instrument(skip(self), fields(repo = "history", operation = "purge_older_than"))]
    async fn purge_older_than(&self, cutoff_ms: i64) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let r = sqlx::query("DELETE FROM container_history WHERE timestamp < $1")
            .bind(cutoff_ms)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(r.rows_affected())
    }

    #[instrument(skip(self), fields(repo = "history", operation = "records_since"))]
    async fn records_since(&self, since_ms: i64) -> anyhow::Result<Vec<ContainerRecord>> {
        let rows = sqlx::query(
            "SELECT id, container_name, status, image, timestamp FROM container_history
             WHERE timestamp >= $1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::parse_row(&row)?);
        }
        Ok(out)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1 FROM container_history LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(())
    }
}
