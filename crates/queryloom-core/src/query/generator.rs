//! Query generation trait definition (port).
//!
//! A generator is one strategy for turning a natural-language question into
//! a SQL query. The infrastructure layer (queryloom-infra) implements this
//! trait against an OpenAI-compatible chat endpoint; tests implement it with
//! canned responses.

use queryloom_types::query::GeneratedQuery;
use thiserror::Error;

// ---------------------------------------------------------------------------
// GenerationContext
// ---------------------------------------------------------------------------

/// Schema context shared by every generation strategy.
///
/// Assembled once per process from the operational database and the ER
/// document, then cloned into each producer node.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    /// SQL dialect name presented to the model (e.g. "MySQL").
    pub dialect: String,

    /// Human-readable description of the usable tables and columns.
    pub tables: String,

    /// Entity-relationship notes loaded from the schema document.
    pub entity_relationship: String,

    /// Row cap the generated query should respect.
    pub row_limit: u32,
}

// ---------------------------------------------------------------------------
// QueryGenerator
// ---------------------------------------------------------------------------

/// A strategy that proposes one SQL query for a natural-language question.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait QueryGenerator: Send + Sync {
    /// Short identifier stamped on every candidate this generator produces.
    fn name(&self) -> &str;

    /// Produce a query for `question`, steered by accumulated `feedback`.
    ///
    /// `feedback` is empty on the first generation round.
    fn generate(
        &self,
        question: &str,
        feedback: &str,
        context: &GenerationContext,
    ) -> impl std::future::Future<Output = Result<GeneratedQuery, GeneratorError>> + Send;
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced by a query generator backend.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The backend call itself failed (network, auth, rate limit).
    #[error("generation backend error: {0}")]
    Backend(String),

    /// The backend answered, but not with a usable query payload.
    #[error("malformed generator response: {0}")]
    Malformed(String),
}
