//! Durable checkpoint storage on SQLite.
//!
//! One WAL-mode database file holds the checkpoints table; `pool` owns the
//! reader/writer split and `checkpoint` the repository over it.

pub mod checkpoint;
pub mod pool;

pub use checkpoint::SqliteCheckpointRepository;
pub use pool::DatabasePool;
