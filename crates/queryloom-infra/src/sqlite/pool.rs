//! SQLite pool pair backing the checkpoint store.
//!
//! Checkpoint durability rests on the write path: a save must be visible to
//! any subsequent load before the engine hands control back to the caller.
//! A single-connection writer serializes those saves while a small read-only
//! pool serves status and listing queries concurrently; WAL keeps the
//! readers from blocking the writer.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Status/list queries are short; a handful of readers is plenty.
const READER_CONNECTIONS: u32 = 8;

/// Reader/writer pool pair over one SQLite file.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if missing) the database at `db_file` and run pending
    /// migrations.
    ///
    /// The writer opens first and migrates so the schema exists before the
    /// read-only pool connects. Both sides run WAL with a 5 second busy
    /// timeout.
    pub async fn open(db_file: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::new()
            .filename(db_file)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts.clone())
            .await?;

        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(opts.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_file = dir.path().join("checkpoints.db");

        let pool = DatabasePool::open(&db_file).await.unwrap();
        assert!(db_file.exists());

        let (count,): (i64,) = sqlx::query_as(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'checkpoints'",
        )
        .fetch_one(&pool.reader)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_open_is_wal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(dir.path().join("wal.db")).await.unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_reader_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(dir.path().join("ro.db")).await.unwrap();

        let result = sqlx::query("DELETE FROM checkpoints")
            .execute(&pool.reader)
            .await;
        assert!(result.is_err(), "reader pool must be read-only");
    }
}
