//! Console rendering of completions, stored rows and aggregate stats.

use serde_json::Value;
use tally_llm::ChatResponse;
use tally_persist::{UsageRow, UsageStats};

pub const MISSING_FIELDS_MESSAGE: &str = "The API response does not contain the expected fields.";

const FALLBACK_WIDTH: usize = 80;
const MAX_CELL_WIDTH: usize = 32;

/// Current terminal width, 80 columns when it cannot be determined
pub fn terminal_width() -> usize {
    match crossterm::terminal::size() {
        Ok((cols, _)) if cols > 0 => cols as usize,
        _ => FALLBACK_WIDTH,
    }
}

/// A line of `ch` spanning `width` columns, or the terminal width when 0
pub fn separator_line(ch: char, width: usize) -> String {
    let width = if width > 0 { width } else { terminal_width() };
    std::iter::repeat(ch).take(width).collect()
}

/// Human-readable summary of a completion
///
/// Uses the loosely extracted view so that display never depends on the
/// response being well-formed enough to persist.
pub fn format_summary(response: &ChatResponse, prompt: &str, width: usize) -> String {
    let Some(completion) = response.content.as_deref() else {
        return MISSING_FIELDS_MESSAGE.to_string();
    };

    let model = response.model.as_deref().unwrap_or("unknown");
    let tokens = response
        .usage
        .as_ref()
        .map(|u| u.total_tokens.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let line = separator_line('-', width);

    [
        line.clone(),
        format!("Prompt: {}", prompt),
        line.clone(),
        completion.trim().to_string(),
        line.clone(),
        format!("Model: {} | Tokens: {}", model, tokens),
        line,
    ]
    .join("\n")
}

/// Pretty JSON of the full response with the prompt attached
pub fn raw_json(raw: &Value, prompt: &str) -> String {
    let mut dump = raw.clone();
    if let Some(obj) = dump.as_object_mut() {
        obj.insert("prompt".to_string(), Value::String(prompt.to_string()));
    }
    serde_json::to_string_pretty(&dump).unwrap_or_else(|_| dump.to_string())
}

pub fn render_stats(stats: &UsageStats) -> String {
    serde_json::to_string_pretty(stats).unwrap_or_default()
}

/// Aligned text table of stored rows
pub fn render_table(rows: &[UsageRow]) -> String {
    if rows.is_empty() {
        return "No usage records stored.".to_string();
    }

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.cells().into_iter().map(|c| truncate(&c)).collect())
        .collect();

    let mut widths: Vec<usize> = UsageRow::COLUMNS.iter().map(|h| h.len()).collect();
    for cells in &body {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(UsageRow::COLUMNS.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for cells in &body {
        lines.push(format_line(cells.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

fn truncate(cell: &str) -> String {
    let flat = cell.replace('\n', " ");
    if flat.chars().count() <= MAX_CELL_WIDTH {
        flat
    } else {
        let mut out: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
        out.push('…');
        out
    }
}
