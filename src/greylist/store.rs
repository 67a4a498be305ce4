use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use tracing::debug;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::error::GreylistError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS greylist (
    address  TEXT PRIMARY KEY,
    mx_host  TEXT NOT NULL,
    last_try INTEGER NOT NULL,
    next_try INTEGER NOT NULL,
    tries    INTEGER NOT NULL CHECK (tries >= 1)
)";

const UPSERT: &str = "INSERT INTO greylist (address, mx_host, last_try, next_try, tries)
    VALUES (?1, ?2, ?3, ?4, 1)
    ON CONFLICT(address) DO UPDATE SET
        mx_host  = excluded.mx_host,
        last_try = excluded.last_try,
        next_try = excluded.next_try,
        tries    = greylist.tries + 1
    RETURNING address, mx_host, last_try, next_try, tries";

/// One queued address awaiting another SMTP attempt. Timestamps are epoch
/// seconds.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreylistRecord {
    pub address: String,
    pub mx_host: String,
    pub last_attempt: i64,
    pub next_attempt: i64,
    pub attempt_count: u32,
}

impl GreylistRecord {
    pub fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.next_attempt, 0)
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let tries: i64 = row.try_get("tries")?;
        Ok(Self {
            address: row.try_get("address")?,
            mx_host: row.try_get("mx_host")?,
            last_attempt: row.try_get("last_try")?,
            next_attempt: row.try_get("next_try")?,
            attempt_count: u32::try_from(tries).unwrap_or(u32::MAX),
        })
    }
}

/// SQLite-backed retry queue, one row per address.
#[derive(Debug, Clone)]
pub struct GreylistStore {
    pool: SqlitePool,
}

impl GreylistStore {
    /// Opens (creating if needed) the database at `path` in WAL mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, GreylistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| GreylistError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        debug!(path = %path.display(), "greylist database opened");
        Self::with_pool(pool).await
    }

    /// Private database living as long as the store; used by tests and
    /// one-shot runs.
    pub async fn open_in_memory() -> Result<Self, GreylistError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, GreylistError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn upsert(
        &self,
        address: &str,
        mx_host: &str,
        delay: Duration,
    ) -> Result<GreylistRecord, GreylistError> {
        self.upsert_at(address, mx_host, delay, Utc::now().timestamp())
            .await
    }

    /// Inserts with one attempt, or overwrites host and timestamps and bumps
    /// the attempt count. `next_attempt` is at least one second after `now`.
    pub async fn upsert_at(
        &self,
        address: &str,
        mx_host: &str,
        delay: Duration,
        now: i64,
    ) -> Result<GreylistRecord, GreylistError> {
        let delay = i64::try_from(delay.as_secs()).unwrap_or(i64::MAX).max(1);
        let next = now.saturating_add(delay);

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(UPSERT)
            .bind(address)
            .bind(mx_host)
            .bind(now)
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;
        let record = GreylistRecord::from_row(&row)?;
        tx.commit().await?;

        debug!(
            address,
            mx_host,
            tries = record.attempt_count,
            next_try = record.next_attempt,
            "greylist entry stored"
        );
        Ok(record)
    }

    pub async fn fetch_due(&self, limit: u32) -> Result<Vec<GreylistRecord>, GreylistError> {
        self.fetch_due_at(Utc::now().timestamp(), limit).await
    }

    /// Up to `limit` records whose next attempt is at or before `now`,
    /// earliest first.
    pub async fn fetch_due_at(
        &self,
        now: i64,
        limit: u32,
    ) -> Result<Vec<GreylistRecord>, GreylistError> {
        let rows = sqlx::query(
            "SELECT address, mx_host, last_try, next_try, tries FROM greylist
             WHERE next_try <= ?1 ORDER BY next_try LIMIT ?2",
        )
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(GreylistRecord::from_row)
            .collect::<Result<_, _>>()
            .map_err(GreylistError::from)
    }

    /// Removing an absent address is not an error.
    pub async fn delete(&self, address: &str) -> Result<(), GreylistError> {
        sqlx::query("DELETE FROM greylist WHERE address = ?1")
            .bind(address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, address: &str) -> Result<Option<GreylistRecord>, GreylistError> {
        let row = sqlx::query(
            "SELECT address, mx_host, last_try, next_try, tries FROM greylist WHERE address = ?1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(GreylistRecord::from_row).transpose()?)
    }

    pub async fn count(&self) -> Result<u64, GreylistError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM greylist")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
