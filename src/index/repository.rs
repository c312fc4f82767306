//! DocumentRepository trait, storage errors and stored row types.

use super::SchemaError;
use crate::domain::{DocumentRecord, LinkKind};
use crate::infra::ContentHash;
use crate::parser::ParsedDocument;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ===========================================
// Errors
// ===========================================

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store could not be opened at a compatible schema version.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The corpus root could not be scanned.
    #[error("cannot scan corpus: {0}")]
    Scan(#[from] crate::infra::FsError),

    /// `begin` was called while a transaction is already open.
    #[error("a transaction is already open on this store")]
    NestedTransaction,

    /// An I/O error occurred.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be read back.
    #[error("invalid data in store: {0}")]
    InvalidData(String),

    /// The parse worker pool could not be started.
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for storage operations.
pub type IndexResult<T> = Result<T, IndexError>;

// ===========================================
// Stored Rows
// ===========================================

/// An indexed document's paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedPath {
    pub path: PathBuf,
    pub relative_path: String,
}

/// A link row with its current resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLink {
    pub id: i64,
    /// Absolute path of the linking document.
    pub source: PathBuf,
    pub source_relative: String,
    pub target: String,
    pub kind: LinkKind,
    pub section: Option<String>,
    pub target_path: Option<PathBuf>,
    pub is_valid: bool,
}

/// A new resolution for one link row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResolution {
    pub id: i64,
    pub target_path: Option<PathBuf>,
    pub is_valid: bool,
}

/// Result of comparing `files` with `files_fts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub documents: u64,
    pub search_entries: u64,
    /// Documents without a full-text entry.
    pub missing_entries: Vec<PathBuf>,
    /// Full-text rowids without a document.
    pub orphaned_entries: Vec<i64>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_entries.is_empty() && self.orphaned_entries.is_empty()
    }
}

// ===========================================
// DocumentRepository Trait
// ===========================================

/// Write-side storage operations used by the indexer.
///
/// Every mutating operation is atomic: it either fully applies or leaves the
/// store as it was.
pub trait DocumentRepository {
    /// Inserts or replaces a document with all of its fan-out rows and its
    /// full-text entry. Returns the document id.
    fn upsert_document(
        &mut self,
        record: &DocumentRecord,
        parsed: &ParsedDocument,
    ) -> IndexResult<i64>;

    /// Removes a document and everything it owns. Links elsewhere that
    /// resolved to it are invalidated. Returns whether a document existed.
    fn remove_document(&mut self, path: &Path) -> IndexResult<bool>;

    /// Returns the stored fingerprint of every document.
    fn indexed_hashes(&self) -> IndexResult<HashMap<PathBuf, ContentHash>>;

    /// Returns the stored fingerprint of one document.
    fn content_hash(&self, path: &Path) -> IndexResult<Option<ContentHash>>;

    /// Returns the paths of every document.
    fn document_paths(&self) -> IndexResult<Vec<IndexedPath>>;

    /// Returns `(document, alias)` pairs from `aliases`/`alias` header fields.
    fn document_aliases(&self) -> IndexResult<Vec<(PathBuf, String)>>;

    /// Returns every link row.
    fn all_links(&self) -> IndexResult<Vec<StoredLink>>;

    /// Writes new link resolutions in one transaction. Returns rows changed.
    fn update_link_resolution(&mut self, updates: &[LinkResolution]) -> IndexResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_implements_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<IndexError>();
    }

    #[test]
    fn nested_transaction_message() {
        assert_eq!(
            IndexError::NestedTransaction.to_string(),
            "a transaction is already open on this store"
        );
    }

    #[test]
    fn schema_errors_display_transparently() {
        let err = IndexError::from(SchemaError::VersionTooNew {
            found: 9,
            supported: 3,
        });
        assert_eq!(
            err.to_string(),
            "schema version 9 is newer than supported 3"
        );
    }

    #[test]
    fn consistency_report_flags_mismatches() {
        let mut report = ConsistencyReport {
            documents: 1,
            search_entries: 1,
            ..Default::default()
        };
        assert!(report.is_consistent());
        report.orphaned_entries.push(7);
        assert!(!report.is_consistent());
    }
}
