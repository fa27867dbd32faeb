//! Prompt templates for the generation strategies.
//!
//! Each strategy has a system template with embedded defaults, overridable
//! by a file of the same name under `{resource_dir}/prompt/`. Templates use
//! `{dialect}`, `{top_k}`, `{table_info}`, `{entity_relationship}`, and
//! `{user_feedback}` placeholders, substituted per generation call.

use std::path::Path;

use queryloom_core::query::generator::GenerationContext;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One prompt strategy. Basic and optimized share a model; advanced runs on
/// the smart model and is the only strategy that fills `suggestions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStrategy {
    Basic,
    Optimized,
    Advanced,
}

impl QueryStrategy {
    /// Template filename under the prompt directory.
    pub fn template_file(&self) -> &'static str {
        match self {
            QueryStrategy::Basic => "basic_sql_agent.template",
            QueryStrategy::Optimized => "optimized_sql_agent.template",
            QueryStrategy::Advanced => "advanced_sql_agent.template",
        }
    }

    fn embedded_template(&self) -> &'static str {
        match self {
            QueryStrategy::Basic => BASIC_TEMPLATE,
            QueryStrategy::Optimized => OPTIMIZED_TEMPLATE,
            QueryStrategy::Advanced => ADVANCED_TEMPLATE,
        }
    }
}

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const BASIC_TEMPLATE: &str = r#"You are a {dialect} expert. Given an input question, create a syntactically correct {dialect} query to run.

Unless the user specifies a number of results to obtain, limit the query to at most {top_k} rows. Never query for all columns from a table; select only the columns needed to answer the question.

Only use the following tables:
{table_info}

Entity relationships:
{entity_relationship}

Feedback from the user's review of earlier drafts (may be empty):
{user_feedback}

Fill `query` with the SQL. Leave `suggestions` empty."#;

const OPTIMIZED_TEMPLATE: &str = r#"You are a {dialect} expert. Given an input question, create a syntactically correct and performant {dialect} query to run.

Unless the user specifies a number of results to obtain, limit the query to at most {top_k} rows. Never query for all columns from a table; select only the columns needed to answer the question.

Prefer index-friendly constructs: avoid wrapping indexed columns in functions inside WHERE clauses, avoid leading-wildcard LIKE patterns, and start joins from the most selective table.

Only use the following tables:
{table_info}

Entity relationships:
{entity_relationship}

Feedback from the user's review of earlier drafts (may be empty):
{user_feedback}

Fill `query` with the SQL. Leave `suggestions` empty."#;

const ADVANCED_TEMPLATE: &str = r#"You are a {dialect} expert and database architect. Given an input question, create a syntactically correct {dialect} query to run.

Unless the user specifies a number of results to obtain, limit the query to at most {top_k} rows. Never query for all columns from a table; select only the columns needed to answer the question.

Only use the following tables:
{table_info}

Entity relationships:
{entity_relationship}

Feedback from the user's review of earlier drafts (may be empty):
{user_feedback}

After writing the query, review the schema for changes that would make this kind of question cheaper to answer, such as missing indexes or denormalization candidates. Fill `query` with the SQL and put each schema improvement in `suggestions`."#;

// ---------------------------------------------------------------------------
// PromptSet
// ---------------------------------------------------------------------------

/// The three resolved system templates, one per strategy.
#[derive(Debug, Clone)]
pub struct PromptSet {
    basic: String,
    optimized: String,
    advanced: String,
}

impl PromptSet {
    /// The embedded defaults, no filesystem involved.
    pub fn embedded() -> Self {
        Self {
            basic: BASIC_TEMPLATE.to_string(),
            optimized: OPTIMIZED_TEMPLATE.to_string(),
            advanced: ADVANCED_TEMPLATE.to_string(),
        }
    }

    /// Resolve templates from `prompt_dir`, falling back to the embedded
    /// default per strategy when its file is absent or unreadable.
    pub async fn load(prompt_dir: &Path) -> Self {
        Self {
            basic: read_or_embedded(prompt_dir, QueryStrategy::Basic).await,
            optimized: read_or_embedded(prompt_dir, QueryStrategy::Optimized).await,
            advanced: read_or_embedded(prompt_dir, QueryStrategy::Advanced).await,
        }
    }

    /// The template for one strategy.
    pub fn template(&self, strategy: QueryStrategy) -> &str {
        match strategy {
            QueryStrategy::Basic => &self.basic,
            QueryStrategy::Optimized => &self.optimized,
            QueryStrategy::Advanced => &self.advanced,
        }
    }
}

async fn read_or_embedded(prompt_dir: &Path, strategy: QueryStrategy) -> String {
    let path = prompt_dir.join(strategy.template_file());
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no template override, using embedded default");
            strategy.embedded_template().to_string()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read template, using embedded default");
            strategy.embedded_template().to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Substitute the template placeholders from the schema context and the
/// accumulated user feedback.
pub fn render(template: &str, context: &GenerationContext, feedback: &str) -> String {
    template
        .replace("{dialect}", &context.dialect)
        .replace("{top_k}", &context.row_limit.to_string())
        .replace("{table_info}", &context.tables)
        .replace("{entity_relationship}", &context.entity_relationship)
        .replace("{user_feedback}", feedback)
}

/// The user message accompanying every generation call.
pub fn user_message(question: &str) -> String {
    format!("Question: {question}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> GenerationContext {
        GenerationContext {
            dialect: "MySQL".to_string(),
            tables: "users(id, name)".to_string(),
            entity_relationship: "users is standalone".to_string(),
            row_limit: 5,
        }
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let rendered = render(
            BASIC_TEMPLATE,
            &sample_context(),
            "only count active users",
        );
        assert!(rendered.contains("You are a MySQL expert"));
        assert!(rendered.contains("at most 5 rows"));
        assert!(rendered.contains("users(id, name)"));
        assert!(rendered.contains("users is standalone"));
        assert!(rendered.contains("only count active users"));
        assert!(!rendered.contains('{'));
    }

    #[test]
    fn test_render_with_empty_feedback() {
        let rendered = render(BASIC_TEMPLATE, &sample_context(), "");
        assert!(rendered.contains("(may be empty):\n\n"));
    }

    #[test]
    fn test_templates_differ_per_strategy() {
        assert!(OPTIMIZED_TEMPLATE.contains("index-friendly"));
        assert!(!BASIC_TEMPLATE.contains("index-friendly"));
        assert!(ADVANCED_TEMPLATE.contains("suggestions"));
        assert!(BASIC_TEMPLATE.contains("Leave `suggestions` empty"));
    }

    #[test]
    fn test_embedded_set_matches_constants() {
        let prompts = PromptSet::embedded();
        assert_eq!(prompts.template(QueryStrategy::Basic), BASIC_TEMPLATE);
        assert_eq!(prompts.template(QueryStrategy::Advanced), ADVANCED_TEMPLATE);
    }

    #[tokio::test]
    async fn test_load_prefers_file_over_embedded() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("basic_sql_agent.template"),
            "custom basic for {dialect}",
        )
        .await
        .unwrap();

        let prompts = PromptSet::load(dir.path()).await;
        assert_eq!(
            prompts.template(QueryStrategy::Basic),
            "custom basic for {dialect}"
        );
        // Missing files keep the embedded defaults.
        assert_eq!(prompts.template(QueryStrategy::Optimized), OPTIMIZED_TEMPLATE);
    }

    #[test]
    fn test_user_message_shape() {
        assert_eq!(user_message("show all users"), "Question: show all users");
    }
}
