//! Thread detail command.

use anyhow::{Context, Result};
use console::style;

use queryloom_types::checkpoint::ThreadStatus;

use crate::cli::render;
use crate::state::AppState;

/// Show one thread: status, details, transcript, and the pending review
/// prompt when the thread is suspended.
pub async fn run(state: &AppState, thread_id: &str, json: bool) -> Result<()> {
    let tid = super::parse_thread_id(thread_id)?;
    let checkpoint = state
        .session
        .status(tid)
        .await
        .with_context(|| format!("Thread '{thread_id}' not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        return Ok(());
    }

    println!();
    println!(
        "  {}  {}",
        style(format!("Thread {}", render::short_id(&tid))).cyan().bold(),
        format_status(checkpoint.status)
    );
    println!();

    println!("  {}", style("── Details ──").dim());
    println!(
        "  {}   {}",
        style("Question:").bold(),
        &checkpoint.state.user_request
    );
    println!(
        "  {}    {}",
        style("Created:").bold(),
        checkpoint.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!(
        "  {}    {}",
        style("Updated:").bold(),
        checkpoint.updated_at.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(node) = &checkpoint.suspended_node {
        println!("  {}  {}", style("Suspended:").bold(), node);
    }
    println!(
        "  {}         {}",
        style("ID:").bold(),
        style(tid.to_string()).dim()
    );
    println!();

    println!("  {}", style("── Transcript ──").dim());
    render::print_transcript(&checkpoint.state);

    if checkpoint.status.is_suspended() {
        if let Some(prompt) = &checkpoint.prompt {
            render::print_review_prompt(prompt);
        }
        println!(
            "  {} Resume with: {}",
            style("i").blue().bold(),
            style(format!("qloom ask --resume {tid}")).yellow()
        );
    }

    if checkpoint.status == ThreadStatus::Failed {
        if let Some(error) = &checkpoint.state.error {
            println!("  {} {error}", style("x").red().bold());
        }
    }
    println!();

    Ok(())
}

fn format_status(status: ThreadStatus) -> String {
    match status {
        ThreadStatus::Running => format!("{}", style("running").green()),
        ThreadStatus::Suspended => format!("{}", style("suspended").yellow()),
        ThreadStatus::Completed => format!("{}", style("completed").dim()),
        ThreadStatus::Failed => format!("{}", style("failed").red()),
    }
}
