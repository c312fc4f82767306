//! SQLite-backed document store.

mod connection;
mod maintenance;
mod repo_impl;
mod transaction;


use rusqlite::Connection;
use std::path::PathBuf;

pub use transaction::Transaction;

// ===========================================
// Store Struct
// ===========================================

/// One owned handle on a corpus store.
///
/// The indexer holds the single writable handle; readers open their own
/// handle with [`Store::open_read_only`].
#[derive(Debug)]
pub struct Store {
    pub(crate) conn: Connection,
    path: Option<PathBuf>,
    read_only: bool,
}
