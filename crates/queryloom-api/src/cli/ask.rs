//! Interactive query session: draft candidates, review, execute.
//!
//! Drives one thread from question to terminal. Starts the walk, renders
//! the candidate table at each suspension, reads reviewer input, and
//! prints the final transcript. A spinner tracks engine events while the
//! walk is off calling backends.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};

use queryloom_core::engine::executor::ExecutionResult;
use queryloom_core::service::SessionError;
use queryloom_types::checkpoint::ThreadStatus;
use queryloom_types::event::EngineEvent;

use crate::cli::render;
use crate::state::AppState;

/// Run an interactive query session.
///
/// With `--resume`, picks up a suspended thread instead of starting a new
/// one. With `--json`, runs a single walk and prints the outcome without
/// entering the input loop.
pub async fn run(
    state: &AppState,
    question: Option<String>,
    resume: Option<String>,
    json: bool,
) -> Result<()> {
    if let Some(thread_id) = resume {
        anyhow::ensure!(
            !json,
            "--resume is interactive; resume over the REST API for JSON output"
        );
        let tid = super::parse_thread_id(&thread_id)?;
        let checkpoint = state
            .session
            .status(tid)
            .await
            .with_context(|| format!("Thread '{thread_id}' not found"))?;
        anyhow::ensure!(
            checkpoint.status.is_suspended(),
            "Thread {} is {}; only suspended threads can be resumed",
            render::short_id(&tid),
            render::status_name(checkpoint.status)
        );

        print_session_banner(state);
        print_thread_line(&tid);

        let seed = ExecutionResult {
            thread_id: tid,
            status: checkpoint.status,
            state: checkpoint.state,
            prompt: checkpoint.prompt,
        };
        return drive_to_terminal(state, seed).await;
    }

    let question = match question {
        Some(question) => question,
        None => Input::<String>::new()
            .with_prompt("Your question")
            .interact_text()?,
    };

    if json {
        let result = state.session.start(None, &question).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_session_banner(state);

    let result = with_spinner(state, state.session.start(None, &question)).await?;
    print_thread_line(&result.thread_id);

    drive_to_terminal(state, result).await
}

/// Loop a thread through review rounds until it reaches a terminal.
async fn drive_to_terminal(state: &AppState, mut result: ExecutionResult) -> Result<()> {
    while result.status.is_suspended() {
        let Some(prompt) = &result.prompt else { break };
        render::print_review_prompt(prompt);

        let input: String = match Input::new().with_prompt("  Your choice").interact_text() {
            Ok(input) => input,
            Err(dialoguer::Error::IO(error))
                if error.kind() == std::io::ErrorKind::Interrupted =>
            {
                println!();
                println!(
                    "  {} Session paused. Pick it up with: {}",
                    style("i").blue().bold(),
                    style(format!("qloom ask --resume {}", result.thread_id)).yellow()
                );
                println!();
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        result = with_spinner(state, state.session.resume(result.thread_id, &input)).await?;
    }

    print_outcome(&result);
    Ok(())
}

/// Run one walk with a spinner fed by engine events.
///
/// The subscription is opened before the walk is awaited, so no event is
/// missed; the listener is dropped once the walk returns.
async fn with_spinner<F>(state: &AppState, walk: F) -> Result<ExecutionResult, SessionError>
where
    F: Future<Output = Result<ExecutionResult, SessionError>>,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.set_message("planning...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let mut events = state.session.subscribe();
    let progress = spinner.clone();
    let listener = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Some(message) = spinner_message(&event) {
                progress.set_message(message);
            }
        }
    });

    let result = walk.await;
    listener.abort();
    spinner.finish_and_clear();
    result
}

/// Map an engine event onto a spinner message.
///
/// `None` keeps the current message; terminal events are left to the
/// caller, which clears the spinner when the walk returns.
fn spinner_message(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::ThreadStarted { .. } | EngineEvent::ThreadResumed { .. } => {
            Some("planning...".to_string())
        }
        EngineEvent::NodeEntered { node, .. } => Some(format!("{}...", node.replace('_', " "))),
        EngineEvent::FanOutDispatched { targets, .. } => {
            Some(format!("drafting {} candidates...", targets.len()))
        }
        EngineEvent::ProducerCompleted {
            producer, faulted, ..
        } => Some(format!(
            "{producer} {}...",
            if *faulted { "failed" } else { "ready" }
        )),
        EngineEvent::ThreadSuspended { .. }
        | EngineEvent::ThreadCompleted { .. }
        | EngineEvent::ThreadFailed { .. } => None,
    }
}

/// Print the session banner: target database and generation models.
fn print_session_banner(state: &AppState) {
    let database = &state.settings.database;
    let llm = &state.settings.llm;

    println!();
    println!(
        "  {}  {}",
        style("Database:").bold(),
        style(format!(
            "{}@{}:{}/{}",
            database.username, database.hostname, database.port, database.database
        ))
        .dim()
    );
    println!(
        "  {}    {}",
        style("Models:").bold(),
        style(format!("{} / {}", llm.query_model, llm.smart_model)).dim()
    );
}

fn print_thread_line(thread_id: &uuid::Uuid) {
    println!(
        "  {}    {}",
        style("Thread:").bold(),
        style(render::short_id(thread_id)).dim()
    );
    println!();
}

/// Print the terminal outcome: transcript plus a status line.
fn print_outcome(result: &ExecutionResult) {
    println!();
    render::print_transcript(&result.state);
    println!();

    match result.status {
        ThreadStatus::Completed => {
            println!("  {} Session complete.", style("*").green().bold());
        }
        ThreadStatus::Failed => {
            let reason = result.state.error.as_deref().unwrap_or("unknown error");
            println!("  {} Session failed: {reason}", style("x").red().bold());
        }
        ThreadStatus::Running | ThreadStatus::Suspended => {}
    }
    println!();
}
