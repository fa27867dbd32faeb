//! SQLite checkpoint repository implementation.
//!
//! Implements `CheckpointRepository` from `queryloom-core` using sqlx with
//! split read/write pools. Workflow state and suspend prompts are stored as
//! JSON blobs; a thread's row is overwritten on every save, so the table
//! always holds exactly the latest snapshot per thread.

use chrono::{DateTime, Utc};
use queryloom_core::repository::checkpoint::CheckpointRepository;
use queryloom_types::checkpoint::{Checkpoint, SuspendPrompt, ThreadStatus};
use queryloom_types::error::RepositoryError;
use queryloom_types::state::WorkflowState;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointRepository`.
pub struct SqliteCheckpointRepository {
    pool: DatabasePool,
}

impl SqliteCheckpointRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct CheckpointRow {
    thread_id: String,
    status: String,
    state: String,
    suspended_node: Option<String>,
    prompt: Option<String>,
    pending_producers: String,
    created_at: String,
    updated_at: String,
}

impl CheckpointRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            thread_id: row.try_get("thread_id")?,
            status: row.try_get("status")?,
            state: row.try_get("state")?,
            suspended_node: row.try_get("suspended_node")?,
            prompt: row.try_get("prompt")?,
            pending_producers: row.try_get("pending_producers")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_checkpoint(self) -> Result<Checkpoint, RepositoryError> {
        let thread_id = parse_uuid(&self.thread_id)?;

        let status: ThreadStatus =
            serde_json::from_value(serde_json::Value::String(self.status.clone()))
                .map_err(|_| RepositoryError::Corrupt(format!("invalid status: {}", self.status)))?;

        let state: WorkflowState = serde_json::from_str(&self.state)
            .map_err(|e| RepositoryError::Corrupt(format!("invalid state JSON: {e}")))?;

        let prompt: Option<SuspendPrompt> = self
            .prompt
            .as_deref()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| RepositoryError::Corrupt(format!("invalid prompt JSON: {e}")))
            })
            .transpose()?;

        let pending_producers: Vec<String> = serde_json::from_str(&self.pending_producers)
            .map_err(|e| RepositoryError::Corrupt(format!("invalid pending_producers JSON: {e}")))?;

        Ok(Checkpoint {
            thread_id,
            status,
            state,
            suspended_node: self.suspended_node,
            prompt,
            pending_producers,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Corrupt(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn status_str(status: &ThreadStatus) -> Result<String, RepositoryError> {
    serde_json::to_value(status)
        .map_err(|e| RepositoryError::Corrupt(e.to_string()))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RepositoryError::Corrupt("status did not serialize to a string".to_string()))
}

// ---------------------------------------------------------------------------
// CheckpointRepository impl
// ---------------------------------------------------------------------------

impl CheckpointRepository for SqliteCheckpointRepository {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let status = status_str(&checkpoint.status)?;

        let state_json = serde_json::to_string(&checkpoint.state)
            .map_err(|e| RepositoryError::Corrupt(format!("serialize state: {e}")))?;

        let prompt_json = checkpoint
            .prompt
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Corrupt(format!("serialize prompt: {e}")))?;

        let pending_json = serde_json::to_string(&checkpoint.pending_producers)
            .map_err(|e| RepositoryError::Corrupt(format!("serialize pending_producers: {e}")))?;

        sqlx::query(
            r#"INSERT INTO checkpoints
               (thread_id, status, state, suspended_node, prompt, pending_producers,
                created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(thread_id) DO UPDATE SET
                 status = excluded.status,
                 state = excluded.state,
                 suspended_node = excluded.suspended_node,
                 prompt = excluded.prompt,
                 pending_producers = excluded.pending_producers,
                 updated_at = excluded.updated_at"#,
        )
        .bind(checkpoint.thread_id.to_string())
        .bind(&status)
        .bind(&state_json)
        .bind(&checkpoint.suspended_node)
        .bind(&prompt_json)
        .bind(&pending_json)
        .bind(format_datetime(&checkpoint.created_at))
        .bind(format_datetime(&checkpoint.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn load(&self, thread_id: &Uuid) -> Result<Option<Checkpoint>, RepositoryError> {
        let row = sqlx::query(
            "SELECT thread_id, status, state, suspended_node, prompt, pending_producers, \
             created_at, updated_at FROM checkpoints WHERE thread_id = ?",
        )
        .bind(thread_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        match row {
            Some(row) => {
                let r = CheckpointRow::from_row(&row)
                    .map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
                Ok(Some(r.into_checkpoint()?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, thread_id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: u32) -> Result<Vec<Checkpoint>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT thread_id, status, state, suspended_node, prompt, pending_producers, \
             created_at, updated_at FROM checkpoints ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        let mut checkpoints = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = CheckpointRow::from_row(row)
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
            checkpoints.push(r.into_checkpoint()?);
        }
        Ok(checkpoints)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use queryloom_types::state::{Candidate, StateUpdate, TranscriptEntry};

    use super::*;
    use crate::sqlite::pool::DatabasePool;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_file = dir.path().join("test.db");
        std::mem::forget(dir);
        DatabasePool::open(db_file).await.unwrap()
    }

    fn sample_checkpoint() -> Checkpoint {
        let mut state = WorkflowState::new("how many orders shipped yesterday?");
        state.apply(StateUpdate {
            candidates: vec![Candidate::new("basic", "SELECT COUNT(*) FROM orders")],
            transcript: vec![TranscriptEntry::assistant("one moment")],
            ..Default::default()
        });
        Checkpoint::new(Uuid::now_v7(), state)
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        let mut cp = sample_checkpoint();
        cp.status = ThreadStatus::Suspended;
        cp.suspended_node = Some("await_feedback".to_string());
        cp.prompt = Some(SuspendPrompt {
            action: "wait_user_feedback".to_string(),
            candidates: cp.state.candidates.clone(),
            question: vec!["What should I run?".to_string()],
        });
        cp.pending_producers = vec!["basic".to_string(), "optimized".to_string()];

        repo.save(&cp).await.unwrap();
        let loaded = repo.load(&cp.thread_id).await.unwrap().unwrap();

        assert_eq!(loaded.thread_id, cp.thread_id);
        assert_eq!(loaded.status, ThreadStatus::Suspended);
        assert_eq!(loaded.suspended_node.as_deref(), Some("await_feedback"));
        assert_eq!(loaded.prompt, cp.prompt);
        assert_eq!(loaded.pending_producers, cp.pending_producers);
        assert_eq!(loaded.state, cp.state);
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);

        let loaded = repo.load(&Uuid::now_v7()).await.unwrap();

        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_row() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        let mut cp = sample_checkpoint();
        repo.save(&cp).await.unwrap();

        cp.status = ThreadStatus::Completed;
        cp.updated_at = cp.updated_at + Duration::seconds(2);
        repo.save(&cp).await.unwrap();

        let loaded = repo.load(&cp.thread_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ThreadStatus::Completed);

        let all = repo.list(10).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        let cp = sample_checkpoint();
        repo.save(&cp).await.unwrap();

        assert!(repo.delete(&cp.thread_id).await.unwrap());
        assert!(!repo.delete(&cp.thread_id).await.unwrap());
        assert!(repo.load(&cp.thread_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_updated_at_desc() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);

        let mut old = sample_checkpoint();
        old.updated_at = old.updated_at - Duration::minutes(5);
        repo.save(&old).await.unwrap();

        let fresh = sample_checkpoint();
        repo.save(&fresh).await.unwrap();

        let listed = repo.list(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].thread_id, fresh.thread_id);
        assert_eq!(listed[1].thread_id, old.thread_id);

        let limited = repo.list(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].thread_id, fresh.thread_id);
    }

    #[tokio::test]
    async fn test_suspension_fields_null_when_absent() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        let cp = sample_checkpoint();
        repo.save(&cp).await.unwrap();

        let loaded = repo.load(&cp.thread_id).await.unwrap().unwrap();
        assert!(loaded.suspended_node.is_none());
        assert!(loaded.prompt.is_none());
        assert!(loaded.pending_producers.is_empty());
    }

    #[tokio::test]
    async fn test_suspended_checkpoint_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_file = dir.path().join("restart.db");

        let mut cp = sample_checkpoint();
        cp.status = ThreadStatus::Suspended;
        cp.suspended_node = Some("await_feedback".to_string());
        cp.prompt = Some(SuspendPrompt {
            action: "wait_user_feedback".to_string(),
            candidates: cp.state.candidates.clone(),
            question: vec!["What should I run?".to_string()],
        });

        {
            let repo = SqliteCheckpointRepository::new(DatabasePool::open(&db_file).await.unwrap());
            repo.save(&cp).await.unwrap();
        }

        // Fresh pool on the same file, as after a process restart.
        let repo = SqliteCheckpointRepository::new(DatabasePool::open(&db_file).await.unwrap());
        let loaded = repo.load(&cp.thread_id).await.unwrap().unwrap();

        assert_eq!(loaded.status, ThreadStatus::Suspended);
        assert_eq!(loaded.suspended_node.as_deref(), Some("await_feedback"));
        assert_eq!(loaded.prompt, cp.prompt);
        assert_eq!(loaded.state, cp.state);
    }
}
