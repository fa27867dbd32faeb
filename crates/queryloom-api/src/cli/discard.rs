//! Thread discard command.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;

use crate::cli::render;
use crate::state::AppState;

/// Delete a thread's checkpoint, with confirmation unless forced.
pub async fn run(state: &AppState, thread_id: &str, force: bool, json: bool) -> Result<()> {
    let tid = super::parse_thread_id(thread_id)?;
    let checkpoint = state
        .session
        .status(tid)
        .await
        .with_context(|| format!("Thread '{thread_id}' not found"))?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Discard thread {} (\"{}\")?",
                style(render::short_id(&tid)).red().bold(),
                render::truncate(&checkpoint.state.user_request, 48)
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.session.discard(tid).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"deleted": true, "thread_id": tid.to_string()})
        );
    } else {
        println!(
            "  {} Thread {} discarded.",
            style("*").green().bold(),
            render::short_id(&tid)
        );
    }

    Ok(())
}
