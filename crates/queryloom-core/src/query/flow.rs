//! The SQL review workflow: generate candidates, pause for review, execute.
//!
//! Wires the graph every thread walks:
//!
//! ```text
//! gateway -> plan_candidates -> {generate_basic, generate_optimized,
//!            generate_advanced} -> aggregate -> await_feedback
//! await_feedback -> run_query -> {end_success | end_error}
//! await_feedback -> end_cancel
//! await_feedback -> gateway            (feedback retry loop)
//! ```
//!
//! Node handlers are pure state functions; durability, merging, and routing
//! stay in the engine. Generation faults never escape a producer -- they
//! become placeholder candidates so the review always sees all three slots.

use std::sync::Arc;

use queryloom_types::checkpoint::SuspendPrompt;
use queryloom_types::state::{Candidate, Patch, StateUpdate, TranscriptEntry, WorkflowState};

use crate::engine::graph::{Dispatch, Graph, GraphBuilder, GraphError, NodeFault};
use crate::query::executor::QueryExecutor;
use crate::query::generator::{GenerationContext, QueryGenerator};
use crate::query::retry::{RetryPolicy, with_retry};

// ---------------------------------------------------------------------------
// Node names
// ---------------------------------------------------------------------------

/// Entry node; clears per-round session fields.
pub const GATEWAY: &str = "gateway";
/// Fan-out dispatcher seeding the three producers.
pub const PLAN_CANDIDATES: &str = "plan_candidates";
/// Producer node for the plain generation strategy.
pub const GENERATE_BASIC: &str = "generate_basic";
/// Producer node for the index-aware generation strategy.
pub const GENERATE_OPTIMIZED: &str = "generate_optimized";
/// Producer node for the strategy that also emits refactoring suggestions.
pub const GENERATE_ADVANCED: &str = "generate_advanced";
/// Join node the three producers converge on.
pub const AGGREGATE: &str = "aggregate";
/// Suspend point where the thread waits for a reviewer.
pub const AWAIT_FEEDBACK: &str = "await_feedback";
/// Runs the selected query against the operational database.
pub const RUN_QUERY: &str = "run_query";
/// Terminal for a successful execution.
pub const END_SUCCESS: &str = "end_success";
/// Terminal reporting an execution error or node fault.
pub const END_ERROR: &str = "end_error";
/// Terminal for a reviewer-cancelled thread.
pub const END_CANCEL: &str = "end_cancel";

/// Producer id for the plain strategy; selected with "1".
pub const PRODUCER_BASIC: &str = "basic";
/// Producer id for the index-aware strategy; selected with "2".
pub const PRODUCER_OPTIMIZED: &str = "optimized";
/// Producer id for the suggestion-emitting strategy; selected with "3".
pub const PRODUCER_ADVANCED: &str = "advanced";

/// Producer ids in selection order; display numbering follows this array.
pub const PRODUCERS: [&str; 3] = [PRODUCER_BASIC, PRODUCER_OPTIMIZED, PRODUCER_ADVANCED];

/// Inputs that cancel a suspended thread instead of selecting or refining.
const CANCEL_WORDS: [&str; 4] = ["stop", "cancel", "exit", "quit"];

// ---------------------------------------------------------------------------
// Flow assembly
// ---------------------------------------------------------------------------

/// Assemble the review workflow over the given backends.
///
/// Generic over the three generation strategies and the executor so tests
/// can substitute canned backends; production wiring uses three
/// OpenAI-backed generators and a MySQL executor.
pub fn build_query_flow<B, O, A, X>(
    basic: B,
    optimized: O,
    advanced: A,
    executor: X,
    context: GenerationContext,
    retry: RetryPolicy,
) -> Result<Graph, GraphError>
where
    B: QueryGenerator + 'static,
    O: QueryGenerator + 'static,
    A: QueryGenerator + 'static,
    X: QueryExecutor + 'static,
{
    let context = Arc::new(context);
    let retry = Arc::new(retry);
    let executor = Arc::new(executor);

    GraphBuilder::new(GATEWAY)
        .transform(GATEWAY, |_state: WorkflowState| async move {
            gateway_reset()
        })
        .edge(GATEWAY, PLAN_CANDIDATES)
        .fan_out(
            PLAN_CANDIDATES,
            dispatch_producers,
            &[GENERATE_BASIC, GENERATE_OPTIMIZED, GENERATE_ADVANCED],
        )
        .transform(GENERATE_BASIC, producer(basic, &context, &retry))
        .edge(GENERATE_BASIC, AGGREGATE)
        .transform(GENERATE_OPTIMIZED, producer(optimized, &context, &retry))
        .edge(GENERATE_OPTIMIZED, AGGREGATE)
        .transform(GENERATE_ADVANCED, producer(advanced, &context, &retry))
        .edge(GENERATE_ADVANCED, AGGREGATE)
        .transform(AGGREGATE, |_state: WorkflowState| async move {
            Ok::<_, NodeFault>(StateUpdate::default())
        })
        .edge(AGGREGATE, AWAIT_FEEDBACK)
        .suspend(AWAIT_FEEDBACK, feedback_prompt, absorb_feedback)
        .route(
            AWAIT_FEEDBACK,
            route_after_feedback,
            &[
                ("execute", RUN_QUERY),
                ("cancel", END_CANCEL),
                ("retry", GATEWAY),
            ],
        )
        .transform(RUN_QUERY, {
            let executor = Arc::clone(&executor);
            move |state: WorkflowState| {
                let executor = Arc::clone(&executor);
                async move { execute_selected(executor.as_ref(), &state).await }
            }
        })
        .route(
            RUN_QUERY,
            route_after_execution,
            &[("success", END_SUCCESS), ("error", END_ERROR)],
        )
        .terminal(END_SUCCESS, |state: WorkflowState| async move {
            success_update(&state)
        })
        .terminal(END_ERROR, |state: WorkflowState| async move {
            failure_update(&state)
        })
        .terminal(END_CANCEL, |_state: WorkflowState| async move {
            cancel_update()
        })
        .on_fault(END_ERROR)
        .build()
}

/// Wrap one generation strategy as a producer node handler.
fn producer<G>(
    generator: G,
    context: &Arc<GenerationContext>,
    retry: &Arc<RetryPolicy>,
) -> impl Fn(WorkflowState) -> futures_util::future::BoxFuture<'static, Result<StateUpdate, NodeFault>>
+ Send
+ Sync
+ 'static
where
    G: QueryGenerator + 'static,
{
    let generator = Arc::new(generator);
    let context = Arc::clone(context);
    let retry = Arc::clone(retry);
    move |state: WorkflowState| {
        let generator = Arc::clone(&generator);
        let context = Arc::clone(&context);
        let retry = Arc::clone(&retry);
        Box::pin(async move { produce(generator.as_ref(), &retry, &context, &state).await })
    }
}

// ---------------------------------------------------------------------------
// Node handlers
// ---------------------------------------------------------------------------

/// Clear the per-round session fields before a new generation round.
///
/// Candidates and transcript are append-only and survive the reset.
fn gateway_reset() -> Result<StateUpdate, NodeFault> {
    Ok(StateUpdate {
        selected_query: Patch::Clear,
        refinement_notes: Patch::Clear,
        execution_result: Patch::Clear,
        error: Patch::Clear,
        ..Default::default()
    })
}

/// Seed all three producers with the question and accumulated feedback.
fn dispatch_producers(state: &WorkflowState) -> Vec<Dispatch> {
    let seed = StateUpdate {
        user_request: Some(state.user_request.clone()),
        user_feedback: Some(state.user_feedback.clone()),
        ..Default::default()
    };
    [GENERATE_BASIC, GENERATE_OPTIMIZED, GENERATE_ADVANCED]
        .iter()
        .map(|target| Dispatch::new(*target, seed.clone()))
        .collect()
}

/// Run one generation strategy and record its candidate.
///
/// A backend failure after all retries becomes a placeholder candidate
/// carrying the fault, so the review round always sees every producer slot.
async fn produce<G: QueryGenerator>(
    generator: &G,
    retry: &RetryPolicy,
    context: &GenerationContext,
    state: &WorkflowState,
) -> Result<StateUpdate, NodeFault> {
    let outcome = with_retry(retry, |_attempt| {
        generator.generate(&state.user_request, &state.user_feedback, context)
    })
    .await;

    let candidate = match outcome {
        Ok(generated) => {
            let mut candidate = Candidate::new(generator.name(), generated.query);
            candidate.suggestions = generated.suggestions;
            candidate
        }
        Err(error) => {
            tracing::error!(producer = generator.name(), error = %error, "query generation failed");
            Candidate::faulted(generator.name(), &error.to_string())
        }
    };

    Ok(StateUpdate {
        candidates: vec![candidate],
        ..Default::default()
    })
}

/// Build the review prompt from the latest candidate of each producer.
///
/// Candidates are listed in selection order so the prompt's numbering always
/// matches what "1"/"2"/"3" would pick, regardless of branch join order.
fn feedback_prompt(state: &WorkflowState) -> SuspendPrompt {
    SuspendPrompt {
        action: "wait_user_feedback".to_string(),
        candidates: PRODUCERS
            .iter()
            .filter_map(|producer| state.latest_for(producer))
            .cloned()
            .collect(),
        question: vec![
            "What should I run?".to_string(),
            "Enter 1, 2, or 3 to execute that query.".to_string(),
            "Enter stop, cancel, exit, or quit to abort execution.".to_string(),
            "Enter anything else as feedback to regenerate the queries.".to_string(),
        ],
    }
}

/// Fold the reviewer's input into the state.
///
/// "1"/"2"/"3" select the latest candidate of the matching producer ("3"
/// also copies its suggestions into the refinement notes). A selection with
/// no recorded candidate degrades to feedback. Everything else, cancel
/// keywords included, is stored as feedback for the router to classify.
fn absorb_feedback(state: &WorkflowState, input: &str) -> StateUpdate {
    let input = input.trim();

    if let Some(producer) = selection_producer(input) {
        if let Some(candidate) = state.latest_for(producer) {
            let mut update = StateUpdate {
                user_feedback: Some(input.to_string()),
                selected_query: Patch::Set(candidate.query.clone()),
                ..Default::default()
            };
            if producer == PRODUCER_ADVANCED && !candidate.suggestions.is_empty() {
                update.refinement_notes = Patch::Set(candidate.suggestions.clone());
            }
            return update;
        }
    }

    StateUpdate {
        user_feedback: Some(input.to_string()),
        ..Default::default()
    }
}

fn selection_producer(input: &str) -> Option<&'static str> {
    match input {
        "1" => Some(PRODUCER_BASIC),
        "2" => Some(PRODUCER_OPTIMIZED),
        "3" => Some(PRODUCER_ADVANCED),
        _ => None,
    }
}

fn route_after_feedback(state: &WorkflowState) -> String {
    if state.selected_query.is_some() {
        "execute".to_string()
    } else if is_cancel(&state.user_feedback) {
        "cancel".to_string()
    } else {
        "retry".to_string()
    }
}

fn is_cancel(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    CANCEL_WORDS.contains(&normalized.as_str())
}

/// Run the selected query; both outcomes are recorded as data.
async fn execute_selected<X: QueryExecutor>(
    executor: &X,
    state: &WorkflowState,
) -> Result<StateUpdate, NodeFault> {
    let Some(query) = state.selected_query.as_deref() else {
        return Err(NodeFault::new("no query selected for execution"));
    };

    match executor.execute(query).await {
        Ok(result) => Ok(StateUpdate {
            execution_result: Patch::Set(result),
            error: Patch::Clear,
            ..Default::default()
        }),
        Err(error) => {
            tracing::error!(error = %error, "query execution failed");
            Ok(StateUpdate {
                execution_result: Patch::Clear,
                error: Patch::Set(error.to_string()),
                ..Default::default()
            })
        }
    }
}

fn route_after_execution(state: &WorkflowState) -> String {
    if state.error.is_none() {
        "success".to_string()
    } else {
        "error".to_string()
    }
}

fn success_update(state: &WorkflowState) -> Result<StateUpdate, NodeFault> {
    let mut transcript = vec![TranscriptEntry::assistant("Query executed successfully.")];
    if let Some(result) = &state.execution_result {
        transcript.push(TranscriptEntry::assistant(result.clone()));
    }
    if !state.refinement_notes.is_empty() {
        transcript.push(TranscriptEntry::assistant(state.refinement_notes.join("\n")));
    }
    Ok(StateUpdate {
        transcript,
        ..Default::default()
    })
}

fn failure_update(state: &WorkflowState) -> Result<StateUpdate, NodeFault> {
    let message = state
        .error
        .clone()
        .unwrap_or_else(|| "unknown error".to_string());
    Ok(StateUpdate {
        transcript: vec![
            TranscriptEntry::assistant("Query execution failed."),
            TranscriptEntry::assistant(message),
        ],
        ..Default::default()
    })
}

fn cancel_update() -> Result<StateUpdate, NodeFault> {
    Ok(StateUpdate {
        transcript: vec![TranscriptEntry::assistant("Query execution cancelled.")],
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use dashmap::DashMap;
    use queryloom_types::checkpoint::{Checkpoint, ThreadStatus};
    use queryloom_types::error::RepositoryError;
    use queryloom_types::query::GeneratedQuery;
    use uuid::Uuid;

    use super::*;
    use crate::engine::executor::Engine;
    use crate::event::EventBus;
    use crate::query::executor::QueryError;
    use crate::query::generator::GeneratorError;
    use crate::repository::checkpoint::CheckpointRepository;

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

    struct StubGenerator {
        name: &'static str,
        query: &'static str,
        suggestions: Vec<String>,
        failures: AtomicU32,
    }

    impl StubGenerator {
        fn new(name: &'static str, query: &'static str) -> Self {
            Self {
                name,
                query,
                suggestions: Vec::new(),
                failures: AtomicU32::new(0),
            }
        }

        fn with_suggestions(mut self, suggestions: &[&str]) -> Self {
            self.suggestions = suggestions.iter().map(|s| s.to_string()).collect();
            self
        }

        fn failing_first(self, failures: u32) -> Self {
            self.failures.store(failures, Ordering::SeqCst);
            self
        }
    }

    impl QueryGenerator for StubGenerator {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(
            &self,
            _question: &str,
            feedback: &str,
            _context: &GenerationContext,
        ) -> Result<GeneratedQuery, GeneratorError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(GeneratorError::Backend("model unavailable".to_string()));
            }
            let mut query = self.query.to_string();
            if !feedback.is_empty() {
                query.push_str(" -- ");
                query.push_str(feedback);
            }
            Ok(GeneratedQuery {
                query,
                suggestions: self.suggestions.clone(),
            })
        }
    }

    struct StubExecutor {
        fail: bool,
    }

    impl QueryExecutor for StubExecutor {
        async fn execute(&self, query: &str) -> Result<String, QueryError> {
            if self.fail {
                Err(QueryError::Execution("syntax error near FROM".to_string()))
            } else {
                Ok(format!("2 rows\n{query}"))
            }
        }
    }

    fn sample_context() -> GenerationContext {
        GenerationContext {
            dialect: "MySQL".to_string(),
            tables: "users(id, name)".to_string(),
            entity_relationship: "users is standalone".to_string(),
            row_limit: 5,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
        }
    }

    fn sample_generators() -> (StubGenerator, StubGenerator, StubGenerator) {
        (
            StubGenerator::new(PRODUCER_BASIC, "SELECT id FROM users"),
            StubGenerator::new(PRODUCER_OPTIMIZED, "SELECT id FROM users USE INDEX (pk)"),
            StubGenerator::new(PRODUCER_ADVANCED, "SELECT u.id FROM users u")
                .with_suggestions(&["add covering index", "avoid SELECT *"]),
        )
    }

    fn sample_engine(executor_fails: bool) -> Engine<MemoryRepo> {
        let (basic, optimized, advanced) = sample_generators();
        let graph = build_query_flow(
            basic,
            optimized,
            advanced,
            StubExecutor {
                fail: executor_fails,
            },
            sample_context(),
            fast_retry(),
        )
        .unwrap();
        Engine::new(graph, MemoryRepo::default(), EventBus::new(64))
    }

    #[tokio::test]
    async fn first_round_suspends_with_review_prompt() {
        let engine = sample_engine(false);
        let thread_id = Uuid::now_v7();

        let result = engine.start(thread_id, "show all users").await.unwrap();

        assert_eq!(result.status, ThreadStatus::Suspended);
        let prompt = result.prompt.unwrap();
        assert_eq!(prompt.action, "wait_user_feedback");
        assert_eq!(prompt.question.len(), 4);

        // Candidates are listed in selection order whatever the join order was
        let producers: Vec<&str> = prompt.candidates.iter().map(|c| c.producer.as_str()).collect();
        assert_eq!(producers, vec![PRODUCER_BASIC, PRODUCER_OPTIMIZED, PRODUCER_ADVANCED]);

        let stored = engine.checkpoints().load(thread_id).await.unwrap().unwrap();
        assert_eq!(stored.suspended_node.as_deref(), Some(AWAIT_FEEDBACK));
    }

    #[tokio::test]
    async fn selecting_basic_executes_and_completes() {
        let engine = sample_engine(false);
        let thread_id = Uuid::now_v7();
        engine.start(thread_id, "show all users").await.unwrap();

        let result = engine.resume(thread_id, "1").await.unwrap();

        assert_eq!(result.status, ThreadStatus::Completed);
        assert_eq!(
            result.state.selected_query.as_deref(),
            Some("SELECT id FROM users")
        );
        let execution = result.state.execution_result.as_deref().unwrap();
        assert!(execution.contains("2 rows"));
        assert_eq!(result.state.user_feedback, "1");

        // user question + completion message + result text
        assert_eq!(result.state.transcript.len(), 3);
        assert_eq!(
            result.state.transcript[1].text,
            "Query executed successfully."
        );
    }

    #[tokio::test]
    async fn feedback_regenerates_and_suspends_again() {
        let engine = sample_engine(false);
        let thread_id = Uuid::now_v7();
        engine.start(thread_id, "show all users").await.unwrap();

        let result = engine
            .resume(thread_id, "only active users please")
            .await
            .unwrap();

        assert_eq!(result.status, ThreadStatus::Suspended);
        assert_eq!(result.state.user_feedback, "only active users please");
        // Three new candidates appended; history retained
        assert_eq!(result.state.candidates.len(), 6);

        // The prompt shows only the latest per producer, steered by feedback
        let prompt = result.prompt.unwrap();
        assert_eq!(prompt.candidates.len(), 3);
        assert!(
            prompt
                .candidates
                .iter()
                .all(|c| c.query.contains("only active users please"))
        );
    }

    #[tokio::test]
    async fn selection_after_feedback_uses_latest_candidate() {
        let engine = sample_engine(false);
        let thread_id = Uuid::now_v7();
        engine.start(thread_id, "show all users").await.unwrap();
        engine.resume(thread_id, "add a limit").await.unwrap();

        let result = engine.resume(thread_id, "2").await.unwrap();

        assert_eq!(result.status, ThreadStatus::Completed);
        let selected = result.state.selected_query.as_deref().unwrap();
        assert!(selected.starts_with("SELECT id FROM users USE INDEX (pk)"));
        assert!(selected.contains("add a limit"));
    }

    #[tokio::test]
    async fn selecting_advanced_copies_suggestions_into_notes() {
        let engine = sample_engine(false);
        let thread_id = Uuid::now_v7();
        engine.start(thread_id, "show all users").await.unwrap();

        let result = engine.resume(thread_id, "3").await.unwrap();

        assert_eq!(result.status, ThreadStatus::Completed);
        assert_eq!(
            result.state.refinement_notes,
            vec!["add covering index", "avoid SELECT *"]
        );
        // user question + completion + result + notes
        assert_eq!(result.state.transcript.len(), 4);
        assert!(result.state.transcript[3].text.contains("covering index"));
    }

    #[tokio::test]
    async fn cancel_words_finish_without_executing() {
        for word in ["stop", "cancel", "exit", "quit"] {
            let engine = sample_engine(false);
            let thread_id = Uuid::now_v7();
            engine.start(thread_id, "show all users").await.unwrap();

            let result = engine.resume(thread_id, word).await.unwrap();

            assert_eq!(result.status, ThreadStatus::Completed, "word: {word}");
            assert!(result.state.execution_result.is_none());
            assert!(result.state.selected_query.is_none());
            let last = result.state.transcript.last().unwrap();
            assert_eq!(last.text, "Query execution cancelled.");
        }
    }

    #[tokio::test]
    async fn execution_error_reports_through_error_terminal() {
        let engine = sample_engine(true);
        let thread_id = Uuid::now_v7();
        engine.start(thread_id, "show all users").await.unwrap();

        let result = engine.resume(thread_id, "1").await.unwrap();

        assert_eq!(result.status, ThreadStatus::Completed);
        assert!(result.state.execution_result.is_none());
        let error = result.state.error.as_deref().unwrap();
        assert!(error.contains("syntax error near FROM"));

        let texts: Vec<&str> = result
            .state
            .transcript
            .iter()
            .map(|entry| entry.text.as_str())
            .collect();
        assert!(texts.contains(&"Query execution failed."));
    }

    #[tokio::test]
    async fn generation_fault_becomes_placeholder_candidate() {
        let (_, optimized, advanced) = sample_generators();
        let basic =
            StubGenerator::new(PRODUCER_BASIC, "unused").failing_first(u32::MAX);
        let graph = build_query_flow(
            basic,
            optimized,
            advanced,
            StubExecutor { fail: false },
            sample_context(),
            RetryPolicy {
                attempts: 2,
                delay: Duration::from_millis(1),
            },
        )
        .unwrap();
        let engine = Engine::new(graph, MemoryRepo::default(), EventBus::new(64));
        let thread_id = Uuid::now_v7();

        let result = engine.start(thread_id, "show all users").await.unwrap();

        assert_eq!(result.status, ThreadStatus::Suspended);
        let prompt = result.prompt.unwrap();
        assert_eq!(prompt.candidates.len(), 3);

        let placeholder = result.state.latest_for(PRODUCER_BASIC).unwrap();
        assert!(placeholder.is_faulted());
        assert!(placeholder.query.starts_with("-- Error:"));
        assert!(placeholder.query.contains("model unavailable"));

        let healthy = result.state.latest_for(PRODUCER_OPTIMIZED).unwrap();
        assert!(!healthy.is_faulted());
    }

    #[tokio::test]
    async fn transient_generation_failure_recovers_within_retry_budget() {
        let (_, optimized, advanced) = sample_generators();
        let basic =
            StubGenerator::new(PRODUCER_BASIC, "SELECT id FROM users").failing_first(2);
        let graph = build_query_flow(
            basic,
            optimized,
            advanced,
            StubExecutor { fail: false },
            sample_context(),
            fast_retry(),
        )
        .unwrap();
        let engine = Engine::new(graph, MemoryRepo::default(), EventBus::new(64));
        let thread_id = Uuid::now_v7();

        let result = engine.start(thread_id, "show all users").await.unwrap();

        let candidate = result.state.latest_for(PRODUCER_BASIC).unwrap();
        assert!(!candidate.is_faulted());
        assert_eq!(candidate.query, "SELECT id FROM users");
    }

    // -----------------------------------------------------------------------
    // Handler units
    // -----------------------------------------------------------------------

    #[test]
    fn gateway_reset_clears_session_fields() {
        let mut state = WorkflowState::new("q");
        state.selected_query = Some("SELECT 1".to_string());
        state.refinement_notes = vec!["note".to_string()];
        state.execution_result = Some("1 row".to_string());
        state.error = Some("boom".to_string());
        state.candidates.push(Candidate::new("basic", "SELECT 1"));

        state.apply(gateway_reset().unwrap());

        assert!(state.selected_query.is_none());
        assert!(state.refinement_notes.is_empty());
        assert!(state.execution_result.is_none());
        assert!(state.error.is_none());
        // Append-only fields survive the reset
        assert_eq!(state.candidates.len(), 1);
    }

    #[test]
    fn absorb_selection_without_candidate_degrades_to_feedback() {
        let state = WorkflowState::new("q");

        let update = absorb_feedback(&state, "1");

        assert!(update.selected_query.is_keep());
        assert_eq!(update.user_feedback.as_deref(), Some("1"));
    }

    #[test]
    fn route_after_feedback_classifies_inputs() {
        let mut state = WorkflowState::new("q");
        state.user_feedback = "make it faster".to_string();
        assert_eq!(route_after_feedback(&state), "retry");

        state.user_feedback = "QUIT".to_string();
        assert_eq!(route_after_feedback(&state), "cancel");

        state.selected_query = Some("SELECT 1".to_string());
        assert_eq!(route_after_feedback(&state), "execute");
    }

    #[test]
    fn route_after_execution_checks_error_field() {
        let mut state = WorkflowState::new("q");
        assert_eq!(route_after_execution(&state), "success");

        state.error = Some("boom".to_string());
        assert_eq!(route_after_execution(&state), "error");
    }

    #[test]
    fn dispatch_seeds_question_and_feedback() {
        let mut state = WorkflowState::new("show users");
        state.user_feedback = "smaller".to_string();

        let dispatches = dispatch_producers(&state);

        assert_eq!(dispatches.len(), 3);
        assert_eq!(dispatches[0].target, GENERATE_BASIC);
        for dispatch in &dispatches {
            assert_eq!(dispatch.seed.user_request.as_deref(), Some("show users"));
            assert_eq!(dispatch.seed.user_feedback.as_deref(), Some("smaller"));
        }
    }
}
