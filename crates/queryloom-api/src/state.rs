//! Application state wiring the engine and its backends together.
//!
//! AppState holds the concrete session service used by both CLI and REST API.
//! The engine is generic over the checkpoint repository and the generation/
//! execution backends, but AppState pins them to the concrete infra
//! implementations: SQLite checkpoints, OpenAI generators, MySQL executor.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use queryloom_core::engine::executor::Engine;
use queryloom_core::event::EventBus;
use queryloom_core::query::flow::build_query_flow;
use queryloom_core::query::retry::RetryPolicy;
use queryloom_core::service::SessionService;
use queryloom_infra::config;
use queryloom_infra::llm::{OpenAiQueryGenerator, PromptSet};
use queryloom_infra::mysql::MySqlQueryExecutor;
use queryloom_infra::schema::build_generation_context;
use queryloom_infra::sqlite::checkpoint::SqliteCheckpointRepository;
use queryloom_infra::sqlite::pool::DatabasePool;
use queryloom_types::config::Settings;

/// Concrete type alias for the session service pinned to infra implementations.
pub type ConcreteSessionService = SessionService<SqliteCheckpointRepository>;

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<ConcreteSessionService>,
    pub settings: Settings,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, open the checkpoint
    /// store, connect the operational database, and assemble the workflow.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = config::data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let settings = config::load_settings(&data_dir).await;

        // Checkpoint store (SQLite, WAL mode)
        let db_pool = DatabasePool::open(data_dir.join("queryloom.db")).await?;
        let checkpoints = SqliteCheckpointRepository::new(db_pool);

        // Generation backends
        let api_key = config::openai_api_key().context(
            "OPENAI_API_KEY not set. Export it before starting a session.",
        )?;
        let prompts = PromptSet::load(&settings.resources.prompt_dir()).await;
        let basic = OpenAiQueryGenerator::basic(&api_key, &settings.llm, &prompts);
        let optimized = OpenAiQueryGenerator::optimized(&api_key, &settings.llm, &prompts);
        let advanced = OpenAiQueryGenerator::advanced(&api_key, &settings.llm, &prompts);

        // Operational database; connecting eagerly surfaces a bad target now
        let executor = MySqlQueryExecutor::connect(&settings.database)
            .await
            .with_context(|| {
                format!(
                    "Could not connect to MySQL at {}:{}",
                    settings.database.hostname, settings.database.port
                )
            })?;
        let context = build_generation_context(&settings, executor.pool())
            .await
            .context("Could not build the generation context")?;
        tracing::debug!(
            dialect = %context.dialect,
            row_limit = context.row_limit,
            "generation context ready"
        );

        let graph = build_query_flow(
            basic,
            optimized,
            advanced,
            executor,
            context,
            RetryPolicy::default(),
        )?;
        let engine = Engine::new(graph, checkpoints, EventBus::new(64));
        let session = SessionService::new(Arc::new(engine));

        Ok(Self {
            session: Arc::new(session),
            settings,
            data_dir,
        })
    }
}
