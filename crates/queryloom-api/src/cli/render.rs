//! Shared rendering helpers for thread-facing CLI commands.
//!
//! Candidate tables, transcript printing, and the small formatting
//! utilities `ask`, `threads`, and `show` have in common.

use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use uuid::Uuid;

use queryloom_types::checkpoint::{SuspendPrompt, ThreadStatus};
use queryloom_types::state::{Candidate, Role, WorkflowState};

/// Build the candidate review table shown at a suspend point.
///
/// Row numbering follows the prompt's candidate order, which is the
/// selection order: replying "1" always picks the first row.
pub fn candidate_table(candidates: &[Candidate]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Strategy").fg(Color::White),
        Cell::new("Proposed query").fg(Color::White),
        Cell::new("Notes").fg(Color::White),
    ]);

    for (index, candidate) in candidates.iter().enumerate() {
        let notes = match &candidate.error {
            Some(error) => Cell::new(format!("failed: {error}")).fg(Color::Red),
            None if !candidate.suggestions.is_empty() => Cell::new(format!(
                "{} schema suggestion{}",
                candidate.suggestions.len(),
                if candidate.suggestions.len() == 1 { "" } else { "s" }
            ))
            .fg(Color::DarkGrey),
            None => Cell::new(""),
        };

        table.add_row(vec![
            Cell::new((index + 1).to_string()).fg(Color::White),
            Cell::new(&candidate.producer).fg(Color::Cyan),
            Cell::new(&candidate.query).fg(Color::White),
            notes,
        ]);
    }

    table
}

/// Print a suspend prompt: the candidate table plus its instruction lines.
pub fn print_review_prompt(prompt: &SuspendPrompt) {
    println!();
    println!("{}", candidate_table(&prompt.candidates));
    println!();
    for line in &prompt.question {
        println!("  {}", style(line).dim());
    }
    println!();
}

/// Print the conversation transcript with styled role markers.
///
/// Multi-line entries (query results are usually tables) keep their
/// shape under an indent.
pub fn print_transcript(state: &WorkflowState) {
    for entry in &state.transcript {
        let label = match entry.role {
            Role::User => format!("{}", style("You >").green().bold()),
            Role::Assistant => format!("{}", style("Queryloom >").cyan().bold()),
        };

        let mut lines = entry.text.lines();
        println!("  {} {}", label, lines.next().unwrap_or(""));
        for line in lines {
            println!("    {line}");
        }
    }
}

/// Styled status cell for thread tables.
pub fn status_cell(status: ThreadStatus) -> Cell {
    match status {
        ThreadStatus::Running => Cell::new("running").fg(Color::Green),
        ThreadStatus::Suspended => Cell::new("suspended").fg(Color::Yellow),
        ThreadStatus::Completed => Cell::new("completed").fg(Color::DarkGrey),
        ThreadStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}

/// Lowercase status name for prose messages.
pub fn status_name(status: ThreadStatus) -> &'static str {
    match status {
        ThreadStatus::Running => "running",
        ThreadStatus::Suspended => "suspended",
        ThreadStatus::Completed => "completed",
        ThreadStatus::Failed => "failed",
    }
}

/// First eight characters of a thread id, for display.
pub fn short_id(thread_id: &Uuid) -> String {
    let full = thread_id.to_string();
    full[..8].to_string()
}

/// Shorten `text` to at most `max` characters, appending `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Human-readable duration: "2h 5m", "3m", "42s".
pub fn format_duration(duration: chrono::TimeDelta) -> String {
    let total_secs = duration.num_seconds().max(0);
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", total_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate("show all users", 40), "show all users");
    }

    #[test]
    fn test_truncate_long_text_cut_with_ellipsis() {
        let long = "a".repeat(50);
        let cut = truncate(&long, 40);
        assert_eq!(cut.chars().count(), 40);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        // Multi-byte characters must not be split mid-codepoint.
        let text = "göçmen kuşlar nereye gidiyor diye sorup duruyordu".repeat(2);
        let cut = truncate(&text, 20);
        assert_eq!(cut.chars().count(), 20);
    }

    #[test]
    fn test_format_duration_buckets() {
        assert_eq!(format_duration(chrono::TimeDelta::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::TimeDelta::seconds(180)), "3m");
        assert_eq!(format_duration(chrono::TimeDelta::seconds(7500)), "2h 5m");
        assert_eq!(format_duration(chrono::TimeDelta::seconds(-5)), "0s");
    }

    #[test]
    fn test_candidate_table_numbers_rows_in_order() {
        let candidates = vec![
            Candidate::new("basic", "SELECT 1"),
            Candidate::new("optimized", "SELECT 2"),
            Candidate::faulted("advanced", "backend timeout"),
        ];

        let rendered = candidate_table(&candidates).to_string();

        assert!(rendered.contains("basic"));
        assert!(rendered.contains("optimized"));
        assert!(rendered.contains("failed: backend timeout"));
        let basic_pos = rendered.find("basic").unwrap();
        let optimized_pos = rendered.find("optimized").unwrap();
        assert!(basic_pos < optimized_pos);
    }

    #[test]
    fn test_short_id_is_eight_chars() {
        let id = Uuid::now_v7();
        assert_eq!(short_id(&id).len(), 8);
    }
}
