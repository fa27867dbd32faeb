//! Query execution trait definition (port).
//!
//! The engine never talks to the operational database directly; it hands the
//! selected query to a `QueryExecutor`. The infrastructure layer implements
//! this trait over a MySQL pool and renders the rows to text.

use thiserror::Error;

/// Executes finalized SQL against the operational database.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait QueryExecutor: Send + Sync {
    /// Run `query` and render the result set as display text.
    fn execute(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<String, QueryError>> + Send;
}

/// Errors surfaced by a query executor backend.
///
/// Both variants end up as data on the thread state; the workflow routes to
/// its error terminal instead of aborting.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The database was unreachable.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// The database rejected the query.
    #[error("query execution failed: {0}")]
    Execution(String),
}
