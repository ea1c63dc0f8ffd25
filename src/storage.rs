//! Storage layer for code-keyed video entries
//!
//! Provides the [`ContentStore`] contract and a SQLite-backed implementation.
//! Every mutation runs as a single statement on one connection guarded by a
//! mutex, so each call is atomic and increments of the same code serialize.

use crate::code::{Code, InvalidCode};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS videos (
    code      TEXT PRIMARY KEY NOT NULL,
    file_id   TEXT NOT NULL,
    downloads INTEGER NOT NULL DEFAULT 0 CHECK (downloads >= 0),
    created   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_videos_created ON videos (created);
";

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The code is not three ASCII digits
    #[error("Validation error: {0}")]
    Validation(#[from] InvalidCode),
    /// No entry exists for the code
    #[error("No entry for code {0}")]
    NotFound(Code),
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The connection mutex was poisoned by a panicking holder
    #[error("Database lock poisoned")]
    LockPoisoned,
    /// The blocking database task failed to complete
    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// A stored row could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Returns `true` for errors caused by the storage backend itself
    /// (as opposed to bad input or a missing entry).
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}

/// A stored video entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Lookup code
    pub code: Code,
    /// Telegram file id of the video
    pub asset_ref: String,
    /// Successful deliveries since the entry was (re)created
    pub downloads: u64,
    /// When the entry was (re)created
    pub created_at: DateTime<Utc>,
}

/// Aggregate numbers for the `/stats` command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of live entries
    pub entries: u64,
    /// Sum of download counters across live entries
    pub total_downloads: u64,
}

/// Interface for content stores
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert or fully replace the entry for `code`.
    ///
    /// A replace resets `downloads` to 0 and `created_at` to `now`.
    async fn put(&self, code: &Code, asset_ref: &str, now: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Look up the entry for `code`.
    async fn get(&self, code: &Code) -> Result<Entry, StoreError>;

    /// Atomically add one to the download counter and return the new value.
    async fn record_delivery(&self, code: &Code) -> Result<u64, StoreError>;

    /// Delete every entry created strictly before `cutoff`.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Entry count and download total.
    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Check that the backend answers queries.
    async fn check_connection(&self) -> Result<(), StoreError>;

    /// Validate a raw code string and [`put`](Self::put) it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for malformed codes, otherwise
    /// whatever `put` returns.
    async fn put_raw(
        &self,
        code: &str,
        asset_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Code, StoreError> {
        let code = Code::parse(code)?;
        self.put(&code, asset_ref, now).await?;
        Ok(code)
    }
}

/// SQLite-backed content store.
///
/// `rusqlite` is synchronous, so every call runs on the blocking pool via
/// `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening video database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn put(
        &self,
        code: &Code,
        asset_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let code = code.clone();
        let asset_ref = asset_ref.to_string();
        let created = encode_timestamp(now);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO videos (code, file_id, downloads, created)
                 VALUES (?1, ?2, 0, ?3)",
                params![code.as_str(), asset_ref, created],
            )?;
            debug!("Stored entry for code {code}");
            Ok(())
        })
        .await
    }

    async fn get(&self, code: &Code) -> Result<Entry, StoreError> {
        let code = code.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT file_id, downloads, created FROM videos WHERE code = ?1",
                    [code.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((asset_ref, downloads, created)) = row else {
                return Err(StoreError::NotFound(code));
            };

            Ok(Entry {
                downloads: decode_counter(downloads)?,
                created_at: decode_timestamp(&created)?,
                code,
                asset_ref,
            })
        })
        .await
    }

    async fn record_delivery(&self, code: &Code) -> Result<u64, StoreError> {
        let code = code.clone();
        self.with_conn(move |conn| {
            let downloads = conn
                .query_row(
                    "UPDATE videos SET downloads = downloads + 1 WHERE code = ?1
                     RETURNING downloads",
                    [code.as_str()],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;

            match downloads {
                Some(n) => decode_counter(n),
                None => Err(StoreError::NotFound(code)),
            }
        })
        .await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = encode_timestamp(cutoff);
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM videos WHERE created < ?1", [cutoff.as_str()])?;
            u64::try_from(deleted).map_err(|e| StoreError::InvalidData(e.to_string()))
        })
        .await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.with_conn(|conn| {
            let (entries, total): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(downloads), 0) FROM videos",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(StoreStats {
                entries: decode_counter(entries)?,
                total_downloads: decode_counter(total)?,
            })
        })
        .await
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        let result = self
            .with_conn(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await;

        match &result {
            Ok(()) => info!("Video database is reachable."),
            Err(e) => error!("Video database connectivity test failed: {e}"),
        }
        result
    }
}

/// Fixed-width RFC 3339 UTC form, so lexical order in SQL matches time order.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {raw:?}: {e}")))
}

fn decode_counter(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::InvalidData(format!("negative counter {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("Failed to create test DB")
    }

    fn code(raw: &str) -> Code {
        Code::parse(raw).expect("valid code")
    }

    #[test]
    fn test_timestamp_encoding_is_sortable() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("valid time");
        let late = early + chrono::TimeDelta::microseconds(1);
        let (a, b) = (encode_timestamp(early), encode_timestamp(late));
        assert_eq!(a, "2026-01-02T03:04:05.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(decode_timestamp(&a).expect("decodes"), early);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = test_store();
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).single().expect("valid time");

        store.put(&code("007"), "vid123", now).await.expect("put");
        let entry = store.get(&code("007")).await.expect("get");

        assert_eq!(entry.asset_ref, "vid123");
        assert_eq!(entry.downloads, 0);
        assert_eq!(entry.created_at, now);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = test_store();
        let err = store.get(&code("404")).await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(ref c) if c.as_str() == "404"));
        assert!(!err.is_storage());
    }

    #[tokio::test]
    async fn test_record_delivery_missing_creates_nothing() {
        let store = test_store();
        let err = store.record_delivery(&code("999")).await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.stats().await.expect("stats"), StoreStats::default());
    }

    #[tokio::test]
    async fn test_put_raw_rejects_malformed() {
        let store = test_store();
        let err = store
            .put_raw("12a", "vid", Utc::now())
            .await
            .expect_err("malformed");
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.stats().await.expect("stats").entries, 0);
    }

    #[tokio::test]
    async fn test_stats_sums_downloads() {
        let store = test_store();
        let now = Utc::now();
        store.put(&code("001"), "a", now).await.expect("put");
        store.put(&code("002"), "b", now).await.expect("put");
        store.record_delivery(&code("001")).await.expect("record");
        store.record_delivery(&code("001")).await.expect("record");
        store.record_delivery(&code("002")).await.expect("record");

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_downloads, 3);
    }

    #[tokio::test]
    async fn test_check_connection() {
        assert!(test_store().check_connection().await.is_ok());
    }
}
