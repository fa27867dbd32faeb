//! MySQL query executor.
//!
//! Implements the `QueryExecutor` port over a sqlx MySQL pool. The selected
//! query runs as-is; the result set is rendered to pipe-separated display
//! text with a bounded row count, since the rendering lands in checkpointed
//! thread state.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row};

use queryloom_core::query::executor::{QueryError, QueryExecutor};
use queryloom_types::config::DatabaseSettings;

/// Executor pool size. One query runs per suspended thread at a time, so a
/// small pool covers concurrent threads comfortably.
const MAX_CONNECTIONS: u32 = 5;

/// Rendered-output row cap. Generated queries carry a LIMIT, but a query
/// without one must not flood the checkpoint store.
const MAX_RENDERED_ROWS: usize = 100;

/// Runs finalized queries against the operational MySQL database.
#[derive(Clone)]
pub struct MySqlQueryExecutor {
    pool: MySqlPool,
}

impl MySqlQueryExecutor {
    /// Wrap an existing pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Connect to the database described by `settings`.
    ///
    /// Establishes a connection eagerly so a misconfigured target fails at
    /// startup rather than on the first executed query.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, QueryError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&settings.url())
            .await
            .map_err(map_mysql_error)?;
        Ok(Self { pool })
    }

    /// The underlying pool, shared with schema introspection.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl QueryExecutor for MySqlQueryExecutor {
    async fn execute(&self, query: &str) -> Result<String, QueryError> {
        // String literals are masked in logs; they can carry user data.
        tracing::info!(query = %mask_literals(query), "executing selected query");

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_mysql_error)?;

        Ok(render_rows(&rows))
    }
}

/// Map a sqlx error onto the executor error surface.
///
/// Transport-level failures become `Connection`; everything else, including
/// SQL rejected by the server, becomes `Execution`.
fn map_mysql_error(err: sqlx::Error) -> QueryError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => QueryError::Connection(err.to_string()),
        _ => QueryError::Execution(err.to_string()),
    }
}

/// Render a result set as pipe-separated text: header line, one line per
/// row, and a row-count footer.
fn render_rows(rows: &[MySqlRow]) -> String {
    if rows.is_empty() {
        return "(0 rows)".to_string();
    }

    let columns: Vec<&str> = rows[0].columns().iter().map(|c| c.name()).collect();
    let mut out = columns.join(" | ");

    for row in rows.iter().take(MAX_RENDERED_ROWS) {
        let values: Vec<String> = (0..columns.len()).map(|i| render_value(row, i)).collect();
        out.push('\n');
        out.push_str(&values.join(" | "));
    }

    out.push('\n');
    if rows.len() > MAX_RENDERED_ROWS {
        out.push_str(&format!(
            "(showing first {MAX_RENDERED_ROWS} of {} rows)",
            rows.len()
        ));
    } else {
        let plural = if rows.len() == 1 { "" } else { "s" };
        out.push_str(&format!("({} row{plural})", rows.len()));
    }
    out
}

/// Render one cell without knowing the column type up front.
///
/// Tries the common decodings in order and degrades to a placeholder for
/// anything exotic rather than failing the whole result.
fn render_value(row: &MySqlRow, index: usize) -> String {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<u64>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_rfc3339());
    }
    if let Ok(value) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| format!("<{} bytes>", v.len()));
    }
    "<unsupported>".to_string()
}

/// Replace the contents of single-quoted string literals with `?`.
///
/// Keeps query shape readable in logs while dropping literal values, which
/// can carry user data. Handles `''` escape sequences inside literals.
fn mask_literals(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                } else {
                    in_string = false;
                    out.push('?');
                    out.push('\'');
                }
            }
        } else {
            out.push(c);
            if c == '\'' {
                in_string = true;
            }
        }
    }
    if in_string {
        out.push('?');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
