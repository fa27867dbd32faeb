//! Durable checkpoint manager for thread execution state.
//!
//! Wraps `CheckpointRepository` to provide a higher-level API for recording
//! thread-level transitions. Every transition (running -> suspended ->
//! running -> completed/failed) is persisted before the engine hands control
//! back, so a restarted process can always resume from the last durable
//! snapshot.

use chrono::Utc;
use queryloom_types::checkpoint::{Checkpoint, SuspendPrompt, ThreadStatus};
use queryloom_types::state::WorkflowState;
use uuid::Uuid;

use crate::repository::checkpoint::CheckpointRepository;

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Manages durable checkpoints for workflow threads.
///
/// Generic over `R: CheckpointRepository` so it works with any storage
/// backend (SQLite, in-memory, etc.). The engine mutates the in-flight
/// [`Checkpoint`] and calls back into the manager at every transition; the
/// manager stamps `updated_at` and persists before returning.
pub struct CheckpointManager<R: CheckpointRepository> {
    repo: R,
}

impl<R: CheckpointRepository> CheckpointManager<R> {
    /// Create a new checkpoint manager backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Persist a fresh RUNNING checkpoint for a thread that is starting.
    ///
    /// Overwrites any restartable (completed or failed) checkpoint stored
    /// under the same thread id.
    pub async fn begin(
        &self,
        thread_id: Uuid,
        state: WorkflowState,
    ) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = Checkpoint::new(thread_id, state);
        self.persist(&checkpoint).await?;
        tracing::debug!(thread_id = %thread_id, "checkpointed thread start");
        Ok(checkpoint)
    }

    /// Flip a suspended checkpoint back to RUNNING before a resume walk.
    pub async fn mark_running(&self, checkpoint: &mut Checkpoint) -> Result<(), CheckpointError> {
        checkpoint.status = ThreadStatus::Running;
        checkpoint.suspended_node = None;
        checkpoint.prompt = None;
        checkpoint.updated_at = Utc::now();
        self.persist(checkpoint).await?;
        tracing::debug!(thread_id = %checkpoint.thread_id, "checkpointed thread resume");
        Ok(())
    }

    /// Persist a mid-walk RUNNING snapshot.
    ///
    /// Called before a fan-out dispatch so a crash leaves behind the set of
    /// branches that were in flight.
    pub async fn save_running(&self, checkpoint: &mut Checkpoint) -> Result<(), CheckpointError> {
        checkpoint.updated_at = Utc::now();
        self.persist(checkpoint).await?;
        tracing::debug!(thread_id = %checkpoint.thread_id, "checkpointed running snapshot");
        Ok(())
    }

    /// Persist a SUSPENDED checkpoint carrying the prompt for the caller.
    ///
    /// Must complete before the engine returns the suspension, so the thread
    /// is resumable even if the caller never sees the response.
    pub async fn suspend(
        &self,
        checkpoint: &mut Checkpoint,
        node: &str,
        prompt: SuspendPrompt,
    ) -> Result<(), CheckpointError> {
        checkpoint.status = ThreadStatus::Suspended;
        checkpoint.suspended_node = Some(node.to_string());
        checkpoint.prompt = Some(prompt);
        checkpoint.pending_producers.clear();
        checkpoint.updated_at = Utc::now();
        self.persist(checkpoint).await?;
        tracing::debug!(thread_id = %checkpoint.thread_id, node, "checkpointed suspension");
        Ok(())
    }

    /// Persist a COMPLETED checkpoint with the final state.
    pub async fn complete(&self, checkpoint: &mut Checkpoint) -> Result<(), CheckpointError> {
        self.finish(checkpoint, ThreadStatus::Completed).await?;
        tracing::debug!(thread_id = %checkpoint.thread_id, "checkpointed completion");
        Ok(())
    }

    /// Persist a FAILED checkpoint with the state at the point of failure.
    pub async fn fail(&self, checkpoint: &mut Checkpoint) -> Result<(), CheckpointError> {
        self.finish(checkpoint, ThreadStatus::Failed).await?;
        tracing::debug!(thread_id = %checkpoint.thread_id, "checkpointed failure");
        Ok(())
    }

    async fn finish(
        &self,
        checkpoint: &mut Checkpoint,
        status: ThreadStatus,
    ) -> Result<(), CheckpointError> {
        checkpoint.status = status;
        checkpoint.suspended_node = None;
        checkpoint.prompt = None;
        checkpoint.pending_producers.clear();
        checkpoint.updated_at = Utc::now();
        self.persist(checkpoint).await
    }

    async fn persist(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.repo
            .save(checkpoint)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Load the checkpoint stored for a thread, if any.
    pub async fn load(&self, thread_id: Uuid) -> Result<Option<Checkpoint>, CheckpointError> {
        self.repo
            .load(&thread_id)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))
    }

    /// Delete a thread's checkpoint. Returns `false` if none existed.
    pub async fn delete(&self, thread_id: Uuid) -> Result<bool, CheckpointError> {
        let deleted = self
            .repo
            .delete(&thread_id)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        if deleted {
            tracing::debug!(thread_id = %thread_id, "deleted checkpoint");
        }
        Ok(deleted)
    }

    /// List checkpoints ordered by most recently updated, newest first.
    pub async fn list(&self, limit: u32) -> Result<Vec<Checkpoint>, CheckpointError> {
        self.repo
            .list(limit)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying repository operation failed.
    #[error("checkpoint repository error: {0}")]
    Repository(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use dashmap::DashMap;
    use queryloom_types::error::RepositoryError;

    use super::*;

    #[derive(Default)]
    struct MemoryRepo {
        rows: DashMap<Uuid, Checkpoint>,
    }

    impl CheckpointRepository for MemoryRepo {
        async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
            self.rows.insert(checkpoint.thread_id, checkpoint.clone());
            Ok(())
        }

        async fn load(&self, thread_id: &Uuid) -> Result<Option<Checkpoint>, RepositoryError> {
            Ok(self.rows.get(thread_id).map(|row| row.clone()))
        }

        async fn delete(&self, thread_id: &Uuid) -> Result<bool, RepositoryError> {
            Ok(self.rows.remove(thread_id).is_some())
        }

        async fn list(&self, limit: u32) -> Result<Vec<Checkpoint>, RepositoryError> {
            let mut rows: Vec<Checkpoint> =
                self.rows.iter().map(|row| row.value().clone()).collect();
            rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            rows.truncate(limit as usize);
            Ok(rows)
        }
    }

    fn sample_prompt() -> SuspendPrompt {
        SuspendPrompt {
            action: "wait_user_feedback".to_string(),
            candidates: Vec::new(),
            question: vec!["pick one".to_string()],
        }
    }

    #[tokio::test]
    async fn begin_persists_running_checkpoint() {
        let manager = CheckpointManager::new(MemoryRepo::default());
        let thread_id = Uuid::now_v7();

        let checkpoint = manager
            .begin(thread_id, WorkflowState::new("list users"))
            .await
            .unwrap();

        assert_eq!(checkpoint.status, ThreadStatus::Running);
        let stored = manager.load(thread_id).await.unwrap().unwrap();
        assert_eq!(stored.state.user_request, "list users");
    }

    #[tokio::test]
    async fn suspend_records_node_and_prompt() {
        let manager = CheckpointManager::new(MemoryRepo::default());
        let thread_id = Uuid::now_v7();
        let mut checkpoint = manager
            .begin(thread_id, WorkflowState::new("q"))
            .await
            .unwrap();

        manager
            .suspend(&mut checkpoint, "await_feedback", sample_prompt())
            .await
            .unwrap();

        let stored = manager.load(thread_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ThreadStatus::Suspended);
        assert_eq!(stored.suspended_node.as_deref(), Some("await_feedback"));
        assert!(stored.prompt.is_some());
    }

    #[tokio::test]
    async fn mark_running_clears_suspension_fields() {
        let manager = CheckpointManager::new(MemoryRepo::default());
        let thread_id = Uuid::now_v7();
        let mut checkpoint = manager
            .begin(thread_id, WorkflowState::new("q"))
            .await
            .unwrap();
        manager
            .suspend(&mut checkpoint, "await_feedback", sample_prompt())
            .await
            .unwrap();

        manager.mark_running(&mut checkpoint).await.unwrap();

        let stored = manager.load(thread_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ThreadStatus::Running);
        assert!(stored.suspended_node.is_none());
        assert!(stored.prompt.is_none());
    }

    #[tokio::test]
    async fn complete_and_fail_clear_pending_producers() {
        let manager = CheckpointManager::new(MemoryRepo::default());
        let thread_id = Uuid::now_v7();
        let mut checkpoint = manager
            .begin(thread_id, WorkflowState::new("q"))
            .await
            .unwrap();
        checkpoint.pending_producers = vec!["generate_basic".to_string()];

        manager.complete(&mut checkpoint).await.unwrap();
        let stored = manager.load(thread_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ThreadStatus::Completed);
        assert!(stored.pending_producers.is_empty());

        manager.fail(&mut checkpoint).await.unwrap();
        let stored = manager.load(thread_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ThreadStatus::Failed);
    }

    #[tokio::test]
    async fn delete_reports_missing_checkpoint() {
        let manager = CheckpointManager::new(MemoryRepo::default());
        let thread_id = Uuid::now_v7();

        assert!(!manager.delete(thread_id).await.unwrap());

        manager
            .begin(thread_id, WorkflowState::new("q"))
            .await
            .unwrap();
        assert!(manager.delete(thread_id).await.unwrap());
        assert!(manager.load(thread_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_honors_limit() {
        let manager = CheckpointManager::new(MemoryRepo::default());
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        manager
            .begin(first, WorkflowState::new("first"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        manager
            .begin(second, WorkflowState::new("second"))
            .await
            .unwrap();

        let listed = manager.list(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].thread_id, second);

        let limited = manager.list(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn checkpoint_error_display() {
        let err = CheckpointError::Repository("connection lost".to_string());
        assert!(err.to_string().contains("connection lost"));
    }
}
