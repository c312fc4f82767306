//! Configuration file support.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::Dialect;
use crate::index::{IndexOptions, IndexerConfig};
use crate::infra::ScanOptions;
use crate::query::QueryLimits;

/// Application configuration loaded from config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default corpus root
    pub root: Option<PathBuf>,

    /// Markdown dialect of the corpus
    pub dialect: Option<Dialect>,

    pub scan: ScanOptions,

    pub indexer: IndexerSection,

    pub query: QueryLimits,
}

/// The `[indexer]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IndexerSection {
    pub batch_size: usize,
    pub max_concurrent: Option<usize>,
}

impl Default for IndexerSection {
    fn default() -> Self {
        Self {
            batch_size: IndexerConfig::default().batch_size,
            max_concurrent: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file yields the default config; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = Self::config_path();
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config file: {}", config_path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse config file: {}", config_path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Returns the path to the config file.
    ///
    /// Default: `~/.config/mdindex/config.toml`
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mdindex")
            .join("config.toml")
    }

    /// Resolve the corpus root, with CLI argument taking precedence.
    ///
    /// Precedence order:
    /// 1. CLI `--dir` argument
    /// 2. Config file `root` setting
    /// 3. Current working directory
    pub fn root(&self, cli_dir: Option<&PathBuf>) -> PathBuf {
        cli_dir
            .cloned()
            .or_else(|| self.root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Indexer settings, with a CLI `--dialect` taking precedence.
    pub fn indexer_config(&self, cli_dialect: Option<Dialect>) -> IndexerConfig {
        IndexerConfig {
            dialect: cli_dialect.or(self.dialect).unwrap_or_default(),
            scan: self.scan.clone(),
            batch_size: self.indexer.batch_size.max(1),
        }
    }

    /// Per-run options, with a CLI `--jobs` taking precedence.
    pub fn index_options(&self, force_update: bool, cli_jobs: Option<usize>) -> IndexOptions {
        let defaults = IndexOptions::default();
        IndexOptions {
            force_update,
            max_concurrent: cli_jobs
                .or(self.indexer.max_concurrent)
                .unwrap_or(defaults.max_concurrent)
                .max(1),
            cancel: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn default_config_has_no_root() {
        let config = Config::default();
        assert!(config.root.is_none());
        assert_eq!(config.query, QueryLimits::default());
    }

    #[test]
    fn root_prefers_cli_arg() {
        let config = Config {
            root: Some(PathBuf::from("/config/notes")),
            ..Default::default()
        };
        let cli_dir = PathBuf::from("/cli/notes");
        assert_eq!(config.root(Some(&cli_dir)), PathBuf::from("/cli/notes"));
        assert_eq!(config.root(None), PathBuf::from("/config/notes"));
        assert_eq!(Config::default().root(None), PathBuf::from("."));
    }

    #[test]
    fn parses_every_section() {
        let config = Config::parse(
            r#"
            root = "/vault"
            dialect = "wikilink"

            [scan]
            extensions = ["md"]
            exclude_dirs = ["archive"]
            exclude_globs = ["drafts/**"]
            max_file_size = 1024

            [indexer]
            batch_size = 10
            max_concurrent = 2

            [query]
            default_limit = 20
            max_limit = 200
            timeout_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.root, Some(PathBuf::from("/vault")));
        assert_eq!(config.dialect, Some(Dialect::Wikilink));
        assert_eq!(config.scan.extensions, vec!["md"]);
        assert_eq!(config.scan.exclude_globs, vec!["drafts/**"]);
        assert_eq!(config.scan.max_file_size, 1024);
        assert_eq!(config.indexer.batch_size, 10);
        assert_eq!(config.query.max_limit, 200);
        assert_eq!(config.query.default_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("roots = \"/x\"").is_err());
    }

    #[test]
    fn cli_dialect_overrides_config() {
        let config = Config {
            dialect: Some(Dialect::HeaderOnly),
            ..Default::default()
        };
        assert_eq!(config.indexer_config(None).dialect, Dialect::HeaderOnly);
        assert_eq!(
            config.indexer_config(Some(Dialect::Wikilink)).dialect,
            Dialect::Wikilink
        );
    }

    #[test]
    fn cli_jobs_override_config() {
        let config = Config::parse("[indexer]\nmax_concurrent = 3").unwrap();
        assert_eq!(config.index_options(false, None).max_concurrent, 3);
        assert_eq!(config.index_options(true, Some(8)).max_concurrent, 8);
        assert!(config.index_options(true, None).force_update);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn config_path_is_in_config_dir() {
        let path = Config::config_path();
        assert!(path.ends_with("mdindex/config.toml"));
    }
}
