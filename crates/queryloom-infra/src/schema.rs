//! Schema context assembly.
//!
//! Builds the [`GenerationContext`] handed to every generation strategy:
//! entity-relationship notes come from the configured ERD file, table
//! descriptions from live `information_schema` introspection of the target
//! database. Assembled once at startup and cloned into the producer nodes.

use std::path::Path;

use sqlx::mysql::MySqlPool;
use sqlx::Row;
use thiserror::Error;

use queryloom_core::query::generator::GenerationContext;
use queryloom_types::config::Settings;

/// Errors raised while assembling schema context.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The entity-relationship notes file could not be read.
    #[error("failed to read schema notes {path}: {source}")]
    ErdRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Table introspection against the target database failed.
    #[error("schema introspection failed: {0}")]
    Introspection(#[from] sqlx::Error),
}

/// Load entity-relationship notes from `path`.
///
/// Each line is trimmed; the result is the trimmed lines rejoined. A missing
/// file is an error because generators produce unusable queries without the
/// relationship notes.
pub async fn load_erd(path: &Path) -> Result<String, SchemaError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SchemaError::ErdRead {
            path: path.display().to_string(),
            source,
        })?;
    Ok(raw.lines().map(str::trim).collect::<Vec<_>>().join("\n"))
}

/// Describe the usable tables of the connected schema, one
/// `table(col, col, ...)` line per table.
pub async fn describe_tables(pool: &MySqlPool) -> Result<String, SchemaError> {
    // Aliases pin the result-set labels; information_schema reports them
    // uppercase on some server versions.
    let rows = sqlx::query(
        r#"
        SELECT table_name AS table_name, column_name AS column_name
        FROM information_schema.columns
        WHERE table_schema = DATABASE()
        ORDER BY table_name, ordinal_position
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut pairs = Vec::with_capacity(rows.len());
    for row in rows {
        let table: String = row.try_get("table_name")?;
        let column: String = row.try_get("column_name")?;
        pairs.push((table, column));
    }

    Ok(fold_columns(pairs))
}

/// Assemble the full generation context from settings and a live pool.
pub async fn build_generation_context(
    settings: &Settings,
    pool: &MySqlPool,
) -> Result<GenerationContext, SchemaError> {
    let entity_relationship = load_erd(&settings.resources.erd_path()).await?;
    let tables = describe_tables(pool).await?;
    Ok(GenerationContext {
        dialect: settings.database.dialect.clone(),
        tables,
        entity_relationship,
        row_limit: settings.llm.row_limit,
    })
}

/// Group (table, column) pairs, already ordered by table, into
/// `table(col, col)` lines.
fn fold_columns(pairs: Vec<(String, String)>) -> String {
    let mut tables: Vec<(String, Vec<String>)> = Vec::new();
    for (table, column) in pairs {
        match tables.last_mut() {
            Some((name, columns)) if *name == table => columns.push(column),
            _ => tables.push((table, vec![column])),
        }
    }
    tables
        .into_iter()
        .map(|(name, columns)| format!("{name}({})", columns.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
