//! CLI command definitions and handlers

pub mod config;
pub mod handlers;
pub mod logging;
pub mod output;

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::domain::Dialect;
use output::OutputFormat;

/// mdindex - index markdown collections into a queryable SQLite store
#[derive(Parser, Debug)]
#[command(name = "mdindex", version, about, long_about = None)]
pub struct Cli {
    /// Corpus root directory (overrides config file)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    /// Markdown dialect: generic, wikilink or header-only (overrides config file)
    #[arg(long, global = true)]
    pub dialect: Option<Dialect>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build or update the index
    Index(IndexArgs),

    /// Run a read-only SQL query against the index
    Query(QueryArgs),

    /// Full-text search across documents
    Search(SearchArgs),

    /// List tags by frequency, or the documents carrying one tag
    Tags(TagsArgs),

    /// List documents no other document links to
    Orphans(ListArgs),

    /// List links whose target does not exist
    BrokenLinks(ListArgs),

    /// List documents that are new, changed or gone since the last index
    Outdated(ListArgs),

    /// Show index statistics and consistency
    Status(ListArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `index` command
#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Re-index every document, even unchanged ones
    #[arg(long)]
    pub force: bool,

    /// Worker threads for reading and parsing
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `query` command
#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// SELECT or WITH statement; use ? for parameters
    pub sql: String,

    /// Positional parameter value (can be specified multiple times)
    #[arg(short, long = "param", action = ArgAction::Append)]
    pub params: Vec<String>,

    /// Maximum rows to return
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Fail instead of truncating when rows exceed the limit
    #[arg(long)]
    pub strict: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `search` command
#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Words to search for; a trailing * matches a prefix
    pub term: String,

    /// Maximum results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Show matching snippets
    #[arg(short, long)]
    pub snippets: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `tags` command
#[derive(Parser, Debug)]
pub struct TagsArgs {
    /// List documents carrying this tag instead of tag counts
    pub tag: Option<String>,

    /// Include nested tags (tag/child) when listing documents
    #[arg(short, long)]
    pub nested: bool,

    /// Maximum tags to list
    #[arg(short, long, default_value_t = 50)]
    pub limit: usize,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for listing commands
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `completions` command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for (bash, zsh, fish)
    #[arg(value_enum)]
    pub shell: Shell,
}
