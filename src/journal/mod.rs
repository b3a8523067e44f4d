// SQLite journal of captured records, so the rolling history survives restarts.
// Rows hold the capture time (epoch ms) and the record's wincode payload behind a version byte.
// The journal is trimmed to the in-memory window after every flush, so it never outgrows the
// store budget.

mod blob;

use crate::models::Record;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

pub struct Journal {
    pool: SqlitePool,
}

impl Journal {
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

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_journal (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                captured_at INTEGER NOT NULL,
                data BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_journal_captured_at ON snapshot_journal(captured_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, records), fields(repo = "journal", operation = "append_batch", records_count = records.len()))]
    pub async fn append_batch(&self, records: &[Arc<Record>]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for r in records {
            let data = blob::with_version_prefix(blob::SNAPSHOT_BLOB_VERSION, r.encode()?);
            sqlx::query("INSERT INTO snapshot_journal (captured_at, data) VALUES ($1, $2)")
                .bind(r.captured_at().timestamp_millis())
                .bind(&data)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Newest records whose sizes add up to at most `budget_bytes`, returned oldest first.
    /// Rows that fail to decode are skipped.
    #[instrument(skip(self), fields(repo = "journal", operation = "load_recent"))]
    pub async fn load_recent(&self, budget_bytes: usize) -> anyhow::Result<Vec<Record>> {
        let mut rows = sqlx::query(
            "SELECT captured_at, data FROM snapshot_journal ORDER BY captured_at DESC, id DESC",
        )
        .fetch(&self.pool);

        let mut out = Vec::new();
        let mut used = 0usize;
        while let Some(row) = rows.try_next().await? {
            let Some(record) = parse_row(&row) else {
                continue;
            };
            if used + record.encoded_len() > budget_bytes {
                break;
            }
            used += record.encoded_len();
            out.push(record);
        }
        out.reverse();
        Ok(out)
    }

    /// Most recent `limit` records, oldest first.
    pub async fn recent(&self, limit: u32) -> anyhow::Result<Vec<Record>> {
        let rows = sqlx::query(
            "SELECT captured_at, data FROM snapshot_journal ORDER BY captured_at DESC, id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut out: Vec<Record> = rows.iter().filter_map(parse_row).collect();
        out.reverse();
        Ok(out)
    }

    /// Delete rows captured before `cutoff`. Returns rows removed.
    #[instrument(skip(self), fields(repo = "journal", operation = "prune_before"))]
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let r = sqlx::query("DELETE FROM snapshot_journal WHERE captured_at < $1")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM snapshot_journal")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Reclaim space after deletes.
    #[instrument(skip(self), fields(repo = "journal", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Option<Record> {
    let decoded = (|| -> anyhow::Result<Record> {
        let captured_at: i64 = row.try_get("captured_at")?;
        let data: Vec<u8> = row.try_get("data")?;
        let payload = blob::blob_payload(&data, blob::SNAPSHOT_BLOB_VERSION)
            .ok_or_else(|| anyhow::anyhow!("unknown journal blob version"))?;
        Record::decode(captured_at, payload)
    })();
    match decoded {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::debug!(error = %e, "skipping undecodable journal row");
            None
        }
    }
}
