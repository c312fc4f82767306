//! RAII-based transaction scoping.

use crate::index::value::Value;
use crate::index::IndexResult;
use rusqlite::{Connection, Params};

/// An open transaction that rolls back when dropped uncommitted.
pub struct Transaction<'a> {
    conn: &'a Connection,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            finished: false,
        }
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.conn
    }

    /// Executes a statement with typed parameters.
    pub(crate) fn exec(&self, sql: &str, params: impl Params) -> IndexResult<usize> {
        Ok(self.conn.prepare_cached(sql)?.execute(params)?)
    }

    /// Executes a statement with positional parameters.
    pub fn execute(&self, sql: &str, params: &[Value]) -> IndexResult<usize> {
        Ok(self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))?)
    }

    /// Commits, consuming the transaction.
    pub fn commit(mut self) -> IndexResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    /// Rolls back explicitly, consuming the transaction.
    pub fn rollback(mut self) -> IndexResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.conn.is_autocommit() {
            // errors cannot propagate out of drop
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}
