//! Output format types and rendering for CLI commands.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use std::path::Path;

use crate::query::QueryResult;

/// Widest a table cell is printed before truncation.
const MAX_CELL_WIDTH: usize = 60;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output for programmatic consumption
    Json,
    /// Plain file paths, one per line
    Paths,
}

/// Wrapper for serializable command output.
#[derive(Debug, Serialize)]
pub struct Output<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> Output<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Prints `data` as pretty JSON wrapped in `{"data": ...}`.
pub fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&Output::new(data))?);
    Ok(())
}

/// Prints a query result in `format`.
///
/// `Paths` prints the `path` column (or the first column) joined onto
/// `root`.
pub fn print_result(result: &QueryResult, format: OutputFormat, root: &Path) -> Result<()> {
    match format {
        OutputFormat::Human => {
            print!("{}", render_table(result));
            println!();
            if result.truncated {
                println!("{} row(s), more rows were cut off", result.row_count);
            } else {
                println!("{} row(s)", result.row_count);
            }
        }
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Paths => {
            let column = result.column_index("path").unwrap_or(0);
            for row in &result.rows {
                if let Some(value) = row.get(column) {
                    println!("{}", root.join(value.to_string()).display());
                }
            }
        }
    }
    Ok(())
}

/// Renders columns and rows as an aligned text table.
pub fn render_table(result: &QueryResult) -> String {
    let header: Vec<String> = result
        .columns
        .iter()
        .map(|c| truncate_str(c, MAX_CELL_WIDTH))
        .collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| truncate_str(&v.to_string().replace('\n', " "), MAX_CELL_WIDTH))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = table_line(&header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&table_line(&rule, &widths));
    for row in &cells {
        out.push_str(&table_line(row, &widths));
    }
    out
}

fn table_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

/// Truncates a string to a maximum display width, adding ellipsis if needed.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}

/// Strip snippet markers for terminal display.
pub fn strip_markers(s: &str) -> String {
    s.replace("<b>", "").replace("</b>", "")
}
