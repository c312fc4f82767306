//! Index and outdated command handlers.

use anyhow::{Context, Result};
use std::path::Path;

use super::{ConsoleReporter, open_writer};
use crate::cli::config::Config;
use crate::cli::output::{OutputFormat, print_json};
use crate::cli::{IndexArgs, ListArgs};
use crate::domain::Dialect;
use crate::index::{IndexStats, Indexer};

pub fn handle_index(
    args: &IndexArgs,
    root: &Path,
    config: &Config,
    dialect: Option<Dialect>,
    verbose: bool,
) -> Result<()> {
    let mut store = open_writer(root)?;
    let mut indexer = Indexer::new(&mut store, root, config.indexer_config(dialect))
        .with_context(|| format!("cannot index {}", root.display()))?;

    let options = config.index_options(args.force, args.jobs);
    let mut reporter = ConsoleReporter::new(verbose && matches!(args.format, OutputFormat::Human));
    let stats = indexer
        .index_all(&options, &mut reporter)
        .with_context(|| format!("failed to index {}", root.display()))?;

    match args.format {
        OutputFormat::Human => println!("{}", summary(&stats)),
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Paths => {
            for failed in &stats.errors {
                println!("{}", failed.path.display());
            }
        }
    }
    Ok(())
}

pub fn handle_outdated(
    args: &ListArgs,
    root: &Path,
    config: &Config,
    dialect: Option<Dialect>,
) -> Result<()> {
    let mut store = open_writer(root)?;
    let indexer = Indexer::new(&mut store, root, config.indexer_config(dialect))
        .with_context(|| format!("cannot scan {}", root.display()))?;
    let outdated = indexer
        .list_outdated()
        .context("failed to compare documents with the index")?;

    match args.format {
        OutputFormat::Human => {
            if outdated.is_empty() {
                println!("Index is up to date.");
            } else {
                for path in &outdated {
                    let shown = path.strip_prefix(indexer.root()).unwrap_or(path);
                    println!("{}", shown.display());
                }
                println!();
                println!("{} outdated document(s)", outdated.len());
            }
        }
        OutputFormat::Json => {
            let paths: Vec<String> = outdated
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            print_json(paths)?;
        }
        OutputFormat::Paths => {
            for path in &outdated {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn summary(stats: &IndexStats) -> String {
    let mut line = format!(
        "Indexed {} of {} documents ({} unchanged, {} removed, {} failed) in {} ms",
        stats.processed, stats.total, stats.skipped, stats.removed, stats.failed, stats.duration_ms
    );
    if stats.cancelled {
        line.push_str(", cancelled");
    }
    line
}
