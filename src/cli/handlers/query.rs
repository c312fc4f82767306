//! Query and search command handlers.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use super::{open_reader, parse_param};
use crate::cli::config::Config;
use crate::cli::output::{OutputFormat, print_json, print_result, strip_markers};
use crate::cli::{QueryArgs, SearchArgs};
use crate::index::Value;
use crate::query::{ExecuteOptions, QueryEngine, QueryResult, SearchOptions};

pub fn handle_query(args: &QueryArgs, root: &Path, config: &Config) -> Result<()> {
    let store = open_reader(root)?;
    let engine = QueryEngine::new(&store, config.query.clone());

    let params: Vec<Value> = args.params.iter().map(|p| parse_param(p)).collect();
    let options = ExecuteOptions {
        limit: args.limit,
        timeout: args.timeout_ms.map(Duration::from_millis),
        strict: args.strict,
    };

    let result = engine.execute(&args.sql, &params, &options)?;
    print_result(&result, args.format, root)
}

pub fn handle_search(args: &SearchArgs, root: &Path, config: &Config) -> Result<()> {
    let store = open_reader(root)?;
    let engine = QueryEngine::new(&store, config.query.clone());

    let options = SearchOptions {
        limit: args.limit,
        with_snippets: args.snippets,
    };
    let result = engine
        .search(&args.term, &options)
        .with_context(|| format!("search failed for: {}", args.term))?;

    match args.format {
        OutputFormat::Human => print_hits(&result),
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Paths => print_result(&result, args.format, root)?,
    }
    Ok(())
}

fn print_hits(result: &QueryResult) {
    if result.is_empty() {
        println!("No matching documents found.");
        return;
    }

    let path = result.column_index("path");
    let title = result.column_index("title");
    let rank = result.column_index("rank");
    let snippet = result.column_index("snippet");
    let cell = |row: &[Value], index: Option<usize>| index.and_then(|i| row.get(i)).cloned();

    for row in &result.rows {
        let rank = match cell(row, rank) {
            Some(Value::Real(r)) => r,
            _ => 0.0,
        };
        println!(
            "{}  {} (rank: {:.2})",
            cell(row, path).unwrap_or(Value::Null),
            cell(row, title).unwrap_or(Value::Null),
            rank
        );
        if let Some(Value::Text(text)) = cell(row, snippet) {
            println!("  {}", strip_markers(&text));
        }
    }
    println!();
    println!("{} result(s)", result.row_count);
}
