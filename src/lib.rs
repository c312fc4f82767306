//! mdindex - incremental markdown corpus indexer with a bounded SQL query surface

pub mod cli;
pub mod domain;
pub mod index;
pub mod infra;
pub mod parser;
pub mod query;

use anyhow::Result;
use clap::Parser;

use cli::{
    Cli, Command,
    config::Config,
    handlers::{
        handle_broken_links, handle_completions, handle_index, handle_orphans, handle_outdated,
        handle_query, handle_search, handle_status, handle_tags,
    },
    logging,
};

/// Main entry point for the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let root = config.root(cli.dir.as_ref());
    let verbose = cli.verbose > 0;

    match &cli.command {
        Command::Index(args) => handle_index(args, &root, &config, cli.dialect, verbose),
        Command::Query(args) => handle_query(args, &root, &config),
        Command::Search(args) => handle_search(args, &root, &config),
        Command::Tags(args) => handle_tags(args, &root, &config),
        Command::Orphans(args) => handle_orphans(args, &root, &config),
        Command::BrokenLinks(args) => handle_broken_links(args, &root, &config),
        Command::Outdated(args) => handle_outdated(args, &root, &config, cli.dialect),
        Command::Status(args) => handle_status(args, &root, &config),
        Command::Completions(args) => handle_completions(args),
    }
}
