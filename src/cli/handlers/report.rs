//! Tags, orphans, broken-links and status command handlers.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::open_reader;
use crate::cli::config::Config;
use crate::cli::output::{OutputFormat, print_json, print_result};
use crate::cli::{ListArgs, TagsArgs};
use crate::index::{SCHEMA_VERSION, Value};
use crate::query::{QueryEngine, QueryResult};

pub fn handle_tags(args: &TagsArgs, root: &Path, config: &Config) -> Result<()> {
    let store = open_reader(root)?;
    let engine = QueryEngine::new(&store, config.query.clone());

    let result = match &args.tag {
        Some(tag) => engine
            .find_by_tag(tag, args.nested)
            .with_context(|| format!("failed to look up tag: {}", tag))?,
        None => engine.tag_frequency(args.limit)?,
    };

    if result.is_empty() && matches!(args.format, OutputFormat::Human) {
        match &args.tag {
            Some(tag) => println!("No documents tagged '{}'.", tag),
            None => println!("No tags found."),
        }
        return Ok(());
    }
    print_result(&result, args.format, root)
}

pub fn handle_orphans(args: &ListArgs, root: &Path, config: &Config) -> Result<()> {
    let store = open_reader(root)?;
    let engine = QueryEngine::new(&store, config.query.clone());
    let result = engine.orphans()?;

    if result.is_empty() && matches!(args.format, OutputFormat::Human) {
        println!("No orphaned documents.");
        return Ok(());
    }
    print_result(&result, args.format, root)
}

pub fn handle_broken_links(args: &ListArgs, root: &Path, config: &Config) -> Result<()> {
    let store = open_reader(root)?;
    let engine = QueryEngine::new(&store, config.query.clone());
    let result = engine.broken_links()?;

    if result.is_empty() && matches!(args.format, OutputFormat::Human) {
        println!("No broken links.");
        return Ok(());
    }
    print_result(&result, args.format, root)
}

/// Status report for `--format json`.
#[derive(Debug, Serialize)]
struct StatusReport {
    index: String,
    schema_version: i64,
    supported_schema_version: i64,
    documents: u64,
    consistent: bool,
    missing_search_entries: usize,
    orphaned_search_entries: usize,
    stats: BTreeMap<String, Value>,
}

pub fn handle_status(args: &ListArgs, root: &Path, config: &Config) -> Result<()> {
    let store = open_reader(root)?;
    let schema_version = store
        .schema_version()
        .context("failed to read schema version")?;
    let documents = store.document_count()?;
    let consistency = store
        .check_consistency()
        .context("failed to check search index consistency")?;
    let engine = QueryEngine::new(&store, config.query.clone());
    let stats = first_row(&engine.document_stats()?);

    let report = StatusReport {
        index: store
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        schema_version,
        supported_schema_version: SCHEMA_VERSION,
        documents,
        consistent: consistency.is_consistent(),
        missing_search_entries: consistency.missing_entries.len(),
        orphaned_search_entries: consistency.orphaned_entries.len(),
        stats,
    };

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Paths => {
            for path in &consistency.missing_entries {
                println!("{}", path.display());
            }
        }
        OutputFormat::Human => {
            println!("Index:          {}", report.index);
            println!(
                "Schema:         v{} (supported v{})",
                report.schema_version, report.supported_schema_version
            );
            println!("Documents:      {}", report.documents);
            for (key, value) in &report.stats {
                if key != "documents" {
                    println!("{:<15} {}", format!("{}:", label(key)), value);
                }
            }
            if report.consistent {
                println!("Search index:   consistent");
            } else {
                println!(
                    "Search index:   INCONSISTENT ({} missing, {} orphaned); run `mdindex index --force`",
                    report.missing_search_entries, report.orphaned_search_entries
                );
            }
        }
    }
    Ok(())
}

fn first_row(result: &QueryResult) -> BTreeMap<String, Value> {
    match result.rows.first() {
        Some(row) => result
            .columns
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect(),
        None => BTreeMap::new(),
    }
}

/// `with_frontmatter` -> `With frontmatter`
fn label(column: &str) -> String {
    let spaced = column.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
