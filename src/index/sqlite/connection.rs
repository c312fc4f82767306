//! Opening stores, raw execution and transactions.

use super::Store;
use super::transaction::Transaction;
use crate::index::schema::{self, SchemaError};
use crate::index::value::{Row, Value};
use crate::index::{IndexError, IndexResult};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl Store {
    // ===========================================
    // Opening
    // ===========================================

    /// Opens an in-memory store with the current schema.
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn,
            path: None,
            read_only: false,
        })
    }

    /// Opens or creates a store at `path`, migrating it to the current schema.
    ///
    /// Creates parent directories if they don't exist. File stores use WAL
    /// journaling so read-only handles are not blocked by the writer.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Schema` if the store was written by a newer binary
    /// or a migration fails.
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| IndexError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")?;

        let applied = schema::migrate(&conn)?;
        if applied > 0 {
            tracing::info!("migrated store {} ({} steps)", path.display(), applied);
        }

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            read_only: false,
        })
    }

    /// Opens an existing store for reading only.
    ///
    /// # Errors
    ///
    /// Fails if the file does not exist or its schema is not exactly the
    /// current version.
    pub fn open_read_only(path: &Path) -> IndexResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::check_readable(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            read_only: true,
        })
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// Returns the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Returns the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // ===========================================
    // Transactions
    // ===========================================

    /// Begins a transaction that rolls back on drop unless committed.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::NestedTransaction` if a transaction is already
    /// open on this connection.
    pub fn begin(&self) -> IndexResult<Transaction<'_>> {
        if !self.conn.is_autocommit() {
            return Err(IndexError::NestedTransaction);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Transaction::new(&self.conn))
    }

    // ===========================================
    // Raw Execution
    // ===========================================

    /// Executes one statement with positional parameters.
    pub fn execute(&self, sql: &str, params: &[Value]) -> IndexResult<usize> {
        Ok(self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))?)
    }

    /// Runs a query and collects every row.
    pub fn query(&self, sql: &str, params: &[Value]) -> IndexResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Returns true if a table (or virtual table) with this name exists.
    pub fn table_exists(&self, name: &str) -> IndexResult<bool> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?",
            [name],
            |row| row.get(0),
        )?)
    }

    // ===========================================
    // Schema
    // ===========================================

    /// Applies pending migrations. Returns the number applied.
    pub fn migrate(&self) -> Result<usize, SchemaError> {
        schema::migrate(&self.conn)
    }

    /// Returns the store's schema version.
    pub fn schema_version(&self) -> Result<i64, SchemaError> {
        schema::schema_version(&self.conn)
    }

    /// Returns the text under which a document path is stored.
    pub(crate) fn path_key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    pub(crate) fn path_from_key(key: String) -> PathBuf {
        PathBuf::from(key)
    }
}
