//! Store maintenance: compaction, statistics, consistency checks.

use super::Store;
use crate::index::{ConsistencyReport, IndexResult};

impl Store {
    /// Rebuilds the database file, reclaiming free pages.
    pub fn vacuum(&self) -> IndexResult<()> {
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    /// Refreshes the query planner's statistics.
    pub fn analyze(&self) -> IndexResult<()> {
        self.conn.execute_batch("ANALYZE;")?;
        Ok(())
    }

    /// Returns the number of indexed documents.
    pub fn document_count(&self) -> IndexResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Compares `files` with `files_fts`.
    ///
    /// Every document must have exactly one full-text entry with the same
    /// rowid, and no entry may exist without a document.
    pub fn check_consistency(&self) -> IndexResult<ConsistencyReport> {
        let documents = self.document_count()?;
        let search_entries: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM files_fts", [], |row| row.get(0))?;

        let missing_entries = self
            .conn
            .prepare(
                "SELECT path FROM files
                 WHERE id NOT IN (SELECT rowid FROM files_fts)
                 ORDER BY path",
            )?
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(Store::path_from_key))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let orphaned_entries = self
            .conn
            .prepare(
                "SELECT rowid FROM files_fts
                 WHERE rowid NOT IN (SELECT id FROM files)
                 ORDER BY rowid",
            )?
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ConsistencyReport {
            documents,
            search_entries: search_entries as u64,
            missing_entries,
            orphaned_entries,
        })
    }

    /// Deletes every document and full-text entry. The schema is kept.
    pub fn clear(&mut self) -> IndexResult<()> {
        let tx = self.begin()?;
        tx.exec("DELETE FROM files_fts", [])?;
        tx.exec("DELETE FROM files", [])?;
        tx.commit()
    }
}
