//! Thread session service.
//!
//! The surface the HTTP handlers and the CLI talk to. Validates input,
//! allocates thread ids, and delegates lifecycle work to the engine.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use queryloom_types::checkpoint::Checkpoint;
use queryloom_types::event::EngineEvent;

use crate::engine::checkpoint::CheckpointError;
use crate::engine::executor::{Engine, EngineError, ExecutionResult};
use crate::repository::checkpoint::CheckpointRepository;

/// Service orchestrating workflow threads for the outer surfaces.
///
/// Generic over the checkpoint repository to maintain clean architecture --
/// queryloom-core never depends on queryloom-infra.
pub struct SessionService<R: CheckpointRepository> {
    engine: Arc<Engine<R>>,
}

impl<R: CheckpointRepository> SessionService<R> {
    /// Create a new SessionService over a shared engine.
    pub fn new(engine: Arc<Engine<R>>) -> Self {
        Self { engine }
    }

    /// Start a new thread for `question`.
    ///
    /// Allocates a UUIDv7 when the caller does not supply an id. Runs the
    /// workflow until it suspends or terminates and returns the outcome.
    pub async fn start(
        &self,
        thread_id: Option<Uuid>,
        question: &str,
    ) -> Result<ExecutionResult, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyRequest);
        }

        let thread_id = thread_id.unwrap_or_else(Uuid::now_v7);
        Ok(self.engine.start(thread_id, question).await?)
    }

    /// Feed reviewer input into a suspended thread and continue the walk.
    pub async fn resume(
        &self,
        thread_id: Uuid,
        input: &str,
    ) -> Result<ExecutionResult, SessionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        Ok(self.engine.resume(thread_id, input).await?)
    }

    /// Fetch the current checkpoint of a thread.
    pub async fn status(&self, thread_id: Uuid) -> Result<Checkpoint, SessionError> {
        self.engine
            .checkpoints()
            .load(thread_id)
            .await?
            .ok_or(SessionError::UnknownThread(thread_id))
    }

    /// Remove a thread's checkpoint.
    pub async fn discard(&self, thread_id: Uuid) -> Result<(), SessionError> {
        if self.engine.checkpoints().delete(thread_id).await? {
            Ok(())
        } else {
            Err(SessionError::UnknownThread(thread_id))
        }
    }

    /// List the most recently updated threads.
    pub async fn list(&self, limit: u32) -> Result<Vec<Checkpoint>, SessionError> {
        Ok(self.engine.checkpoints().list(limit).await?)
    }

    /// Subscribe to engine lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.events().subscribe()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced by the session service.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The question was empty after trimming.
    #[error("question cannot be empty")]
    EmptyRequest,

    /// The reviewer input was empty after trimming.
    #[error("input cannot be empty")]
    EmptyInput,

    /// No checkpoint exists under this thread id.
    #[error("unknown thread '{0}'")]
    UnknownThread(Uuid),

    /// The engine rejected or aborted the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Checkpoint persistence failed outside a walk.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use dashmap::DashMap;
    use queryloom_types::checkpoint::ThreadStatus;
    use queryloom_types::error::RepositoryError;
    use queryloom_types::state::{StateUpdate, WorkflowState};

    use super::*;
    use crate::engine::graph::{Graph, GraphBuilder, NodeFault};
    use crate::event::EventBus;

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

    async fn done(_state: WorkflowState) -> Result<StateUpdate, NodeFault> {
        Ok(StateUpdate::default())
    }

    fn tiny_graph() -> Graph {
        GraphBuilder::new("start")
            .transform("start", done)
            .edge("start", "end")
            .terminal("end", done)
            .build()
            .unwrap()
    }

    fn sample_service() -> SessionService<MemoryRepo> {
        let engine = Engine::new(tiny_graph(), MemoryRepo::default(), EventBus::new(16));
        SessionService::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn start_allocates_thread_id_when_missing() {
        let service = sample_service();

        let result = service.start(None, "list users").await.unwrap();

        assert_eq!(result.status, ThreadStatus::Completed);
        let stored = service.status(result.thread_id).await.unwrap();
        assert_eq!(stored.thread_id, result.thread_id);
    }

    #[tokio::test]
    async fn start_rejects_blank_question() {
        let service = sample_service();

        let result = service.start(None, "   ").await;

        assert!(matches!(result, Err(SessionError::EmptyRequest)));
    }

    #[tokio::test]
    async fn resume_rejects_blank_input() {
        let service = sample_service();

        let result = service.resume(Uuid::now_v7(), "\n\t").await;

        assert!(matches!(result, Err(SessionError::EmptyInput)));
    }

    #[tokio::test]
    async fn status_of_unknown_thread_errors() {
        let service = sample_service();

        let result = service.status(Uuid::now_v7()).await;

        assert!(matches!(result, Err(SessionError::UnknownThread(_))));
    }

    #[tokio::test]
    async fn discard_removes_thread_once() {
        let service = sample_service();
        let thread_id = Uuid::now_v7();
        service.start(Some(thread_id), "list users").await.unwrap();

        service.discard(thread_id).await.unwrap();

        let again = service.discard(thread_id).await;
        assert!(matches!(again, Err(SessionError::UnknownThread(_))));
    }

    #[tokio::test]
    async fn list_returns_recent_threads() {
        let service = sample_service();
        service.start(None, "first").await.unwrap();
        service.start(None, "second").await.unwrap();

        let threads = service.list(10).await.unwrap();

        assert_eq!(threads.len(), 2);
    }

    #[tokio::test]
    async fn subscribe_sees_lifecycle_events() {
        let service = sample_service();
        let mut events = service.subscribe();

        service.start(None, "list users").await.unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, EngineEvent::ThreadStarted { .. }));
    }
}
