//! Thread listing command.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::cli::render;
use crate::state::AppState;

/// List the most recently updated threads in a table.
pub async fn run(state: &AppState, limit: u32, json: bool) -> Result<()> {
    let threads = state.session.list(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&threads)?);
        return Ok(());
    }

    if threads.is_empty() {
        println!();
        println!(
            "  {} No threads yet. Start one with: {}",
            style("i").blue().bold(),
            style("qloom ask \"your question\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Thread").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Question").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    let now = chrono::Utc::now();
    for checkpoint in &threads {
        table.add_row(vec![
            Cell::new(render::short_id(&checkpoint.thread_id)).fg(Color::Cyan),
            render::status_cell(checkpoint.status),
            Cell::new(render::truncate(&checkpoint.state.user_request, 48)),
            Cell::new(format!(
                "{} ago",
                render::format_duration(now - checkpoint.updated_at)
            ))
            .fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} thread{}  {}",
        style(threads.len()).bold(),
        if threads.len() == 1 { "" } else { "s" },
        style("(qloom show <ID> for details)").dim()
    );
    println!();

    Ok(())
}
