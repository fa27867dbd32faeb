//! Checkpoint repository trait definition.
//!
//! Defines the storage interface for thread checkpoints. The infrastructure
//! layer (queryloom-infra) implements this trait with SQLite persistence and
//! an in-memory store for tests and ephemeral sessions.

use queryloom_types::checkpoint::Checkpoint;
use queryloom_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for checkpoint persistence.
///
/// One checkpoint row per thread: `save` overwrites whatever was stored
/// under `checkpoint.thread_id`. Implementations must make `save` durable
/// before returning -- the engine relies on that guarantee at suspension
/// and completion.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointRepository: Send + Sync {
    /// Insert or overwrite the checkpoint for its thread.
    fn save(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load the checkpoint stored for a thread.
    fn load(
        &self,
        thread_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send;

    /// Delete a thread's checkpoint. Returns `true` if it existed.
    fn delete(
        &self,
        thread_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// List up to `limit` checkpoints, ordered by updated_at DESC.
    fn list(
        &self,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send;
}
