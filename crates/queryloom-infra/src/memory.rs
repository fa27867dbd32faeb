//! In-memory checkpoint store.
//!
//! Implements `CheckpointRepository` over a `DashMap`. Nothing survives a
//! restart; intended for development, demos, and tests where SQLite durability
//! is not needed.

use dashmap::DashMap;
use queryloom_core::repository::checkpoint::CheckpointRepository;
use queryloom_types::checkpoint::Checkpoint;
use queryloom_types::error::RepositoryError;
use uuid::Uuid;

/// Process-local checkpoint store keyed by thread id.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    rows: DashMap<Uuid, Checkpoint>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored threads.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl CheckpointRepository for InMemoryCheckpointStore {
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
        let mut rows: Vec<Checkpoint> = self.rows.iter().map(|row| row.value().clone()).collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
