//! Command handlers for the CLI.

mod index;
mod query;
mod report;

use anyhow::{Context, Result, bail};
use clap::CommandFactory;
use std::path::Path;

use crate::cli::{Cli, CompletionsArgs};
use crate::index::{BuildError, ProgressReporter, Store, Value, store_path};

pub use index::{handle_index, handle_outdated};
pub use query::{handle_query, handle_search};
pub use report::{handle_broken_links, handle_orphans, handle_status, handle_tags};

// ===========================================
// Shared Utilities
// ===========================================

/// Progress reporter that prints failures to stderr as they happen.
pub(crate) struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub(crate) fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn on_progress(&mut self, processed: usize, total: usize, path: &Path) {
        if self.verbose {
            println!("  [{}/{}] {}", processed, total, path.display());
        }
    }

    fn on_error(&mut self, path: &Path, error: &BuildError) {
        eprintln!("  error: {}: {}", path.display(), error);
    }
}

/// Opens the store under `root` for reading.
pub(crate) fn open_reader(root: &Path) -> Result<Store> {
    let db_path = store_path(root);
    if !db_path.exists() {
        bail!(
            "no index at {}; run `mdindex index` first",
            db_path.display()
        );
    }
    Store::open_read_only(&db_path)
        .with_context(|| format!("failed to open index at {}", db_path.display()))
}

/// Opens or creates the store under `root` for writing.
///
/// The root must already exist; a mistyped path never gets created.
pub(crate) fn open_writer(root: &Path) -> Result<Store> {
    if !root.is_dir() {
        bail!("corpus root {} is not a directory", root.display());
    }
    let db_path = store_path(root);
    Store::open(&db_path).with_context(|| format!("failed to open index at {}", db_path.display()))
}

/// Binds integer-looking parameters as integers, everything else as text.
pub(crate) fn parse_param(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(i) => Value::Integer(i),
        Err(_) => Value::from(raw),
    }
}

pub fn handle_completions(args: &CompletionsArgs) -> Result<()> {
    let mut command = Cli::command();
    clap_complete::generate(args.shell, &mut command, "mdindex", &mut std::io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn parse_param_prefers_integers() {
        assert_eq!(parse_param("42"), Value::Integer(42));
        assert_eq!(parse_param("-7"), Value::Integer(-7));
        assert_eq!(parse_param("4.5"), Value::from("4.5"));
        assert_eq!(parse_param("rust"), Value::from("rust"));
    }

    #[test]
    fn open_reader_requires_existing_index() {
        let dir = TempDir::new().unwrap();
        let Err(err) = open_reader(dir.path()) else {
            panic!("reader opened without an index");
        };
        assert!(err.to_string().contains("run `mdindex index` first"));
    }

    #[test]
    fn open_writer_refuses_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("absent");

        let Err(err) = open_writer(&root) else {
            panic!("writer opened under a missing root");
        };

        assert!(err.to_string().contains("is not a directory"));
        assert!(!root.exists());
    }

    #[test]
    fn writer_creates_store_then_reader_opens_it() {
        let dir = TempDir::new().unwrap();
        drop(open_writer(dir.path()).unwrap());
        assert!(open_reader(dir.path()).unwrap().is_read_only());
    }
}
