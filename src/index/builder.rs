//! Incremental indexer keeping the store consistent with a file tree.

use super::{DocumentRepository, IndexError, IndexResult, LinkResolution, LinkResolver, Store};
use crate::domain::{Dialect, DocumentRecord};
use crate::infra::{ContentHash, FsError, ScanOptions, Scanner, decode, read_file};
use crate::parser::{DocumentParser, ParsedDocument, parser_for};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;

/// Directory under the corpus root holding the store.
pub const STORE_DIR: &str = ".mdindex";

/// Link resolutions written per transaction.
const RESOLUTION_BATCH: usize = 500;

/// Returns the default store location for a corpus root.
pub fn store_path(root: &Path) -> PathBuf {
    root.join(STORE_DIR).join("index.db")
}

// ===========================================
// BuildError Type
// ===========================================

/// Errors that can occur when indexing an individual document.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The file could not be read or decoded.
    #[error(transparent)]
    FileAccess(#[from] FsError),

    /// The document's transaction failed and was rolled back.
    #[error("storage error for {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: IndexError,
    },
}

// ===========================================
// Options & Results
// ===========================================

/// Cooperative cancellation flag shared with a running index pass.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Re-index documents whose fingerprint is unchanged.
    pub force_update: bool,
    /// Worker threads used to read and parse a batch.
    pub max_concurrent: usize,
    pub cancel: Option<CancellationToken>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            force_update: false,
            max_concurrent: std::thread::available_parallelism().map_or(1, |n| n.get()),
            cancel: None,
        }
    }
}

impl IndexOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Indexer construction settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub dialect: Dialect,
    pub scan: ScanOptions,
    /// Documents read and parsed together before their upserts.
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            scan: ScanOptions::default(),
            batch_size: 100,
        }
    }
}

/// A document that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of one [`Indexer::index_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Candidate documents found by the scan.
    pub total: usize,
    /// Documents written to the store.
    pub processed: usize,
    /// Documents whose fingerprint was unchanged.
    pub skipped: usize,
    pub failed: usize,
    /// Documents removed because they vanished or could not be read.
    pub removed: usize,
    pub errors: Vec<FailedDocument>,
    pub duration_ms: u64,
    pub cancelled: bool,
}

/// Outcome of [`Indexer::index_one`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexOneResult {
    /// The store changed for this path.
    pub updated: bool,
    pub error: Option<String>,
}

// ===========================================
// Progress Reporting
// ===========================================

/// Receives progress updates during [`Indexer::index_all`].
pub trait ProgressReporter {
    /// Called after each document, with the count handled so far.
    fn on_progress(&mut self, _processed: usize, _total: usize, _path: &Path) {}

    /// Called when a document fails.
    fn on_error(&mut self, _path: &Path, _error: &BuildError) {}

    /// Called once at the end of the run.
    fn on_complete(&mut self, _stats: &IndexStats) {}
}

/// A no-op progress reporter.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {}

// ===========================================
// Indexer
// ===========================================

struct PreparedDocument {
    record: DocumentRecord,
    parsed: ParsedDocument,
}

/// `Ok(None)` means the stored fingerprint matched.
type Prepared = Result<Option<PreparedDocument>, BuildError>;

/// Keeps a [`Store`] consistent with the documents under one root.
///
/// The indexer is the store's only writer. Reading, hashing and parsing run
/// on a rayon pool; every write is one transaction per document on the
/// calling thread.
pub struct Indexer<'a> {
    store: &'a mut Store,
    scanner: Scanner,
    config: IndexerConfig,
    parser: Box<dyn DocumentParser>,
}

impl<'a> Indexer<'a> {
    /// Creates an indexer for `root`.
    ///
    /// # Errors
    ///
    /// Fails if the root cannot be resolved or an exclusion glob is invalid.
    pub fn new(store: &'a mut Store, root: &Path, config: IndexerConfig) -> IndexResult<Self> {
        let root = root.canonicalize().map_err(|e| IndexError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;

        let mut scan = config.scan.clone();
        if !scan.exclude_dirs.iter().any(|d| d == STORE_DIR) {
            scan.exclude_dirs.push(STORE_DIR.to_string());
        }
        let scanner = Scanner::new(root, scan)?;
        let parser = parser_for(config.dialect);

        Ok(Self {
            store,
            scanner,
            config,
            parser,
        })
    }

    /// Returns the canonical corpus root.
    pub fn root(&self) -> &Path {
        self.scanner.root()
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    // ===========================================
    // Full Pass
    // ===========================================

    /// Brings the store in line with the file tree.
    ///
    /// Unchanged documents are skipped unless `force_update` is set. Failed
    /// documents are reported and never abort the run. Documents that
    /// vanished are removed unless the run was cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root cannot be scanned, the worker pool
    /// cannot start or the store cannot be read.
    pub fn index_all(
        &mut self,
        options: &IndexOptions,
        reporter: &mut dyn ProgressReporter,
    ) -> IndexResult<IndexStats> {
        let started = Instant::now();
        let candidates = self.scanner.scan()?;
        let stored = self.store.indexed_hashes()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_concurrent.max(1))
            .build()?;

        let mut stats = IndexStats {
            total: candidates.len(),
            ..Default::default()
        };

        'batches: for batch in candidates.chunks(self.config.batch_size.max(1)) {
            if options.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            let prepared = self.prepare_batch(&pool, batch, &stored, options.force_update);

            for (relative, outcome) in batch.iter().zip(prepared) {
                if options.is_cancelled() {
                    stats.cancelled = true;
                    break 'batches;
                }

                let path = self.root().join(relative);
                match outcome {
                    Ok(None) => stats.skipped += 1,
                    Ok(Some(doc)) => match self.store.upsert_document(&doc.record, &doc.parsed) {
                        Ok(_) => {
                            tracing::debug!("indexed {}", relative.display());
                            stats.processed += 1;
                        }
                        Err(source) => {
                            let error = BuildError::Storage {
                                path: path.clone(),
                                source,
                            };
                            record_failure(&mut stats, reporter, &path, &error);
                        }
                    },
                    Err(error) => {
                        record_failure(&mut stats, reporter, &path, &error);
                        if stored.contains_key(&path) {
                            self.remove_recorded(&path, &mut stats, reporter);
                        }
                    }
                }

                let handled = stats.processed + stats.skipped + stats.failed;
                reporter.on_progress(handled, stats.total, relative);
            }
        }

        if !stats.cancelled {
            let seen: HashSet<PathBuf> = candidates.iter().map(|r| self.root().join(r)).collect();
            let mut vanished: Vec<&PathBuf> =
                stored.keys().filter(|path| !seen.contains(*path)).collect();
            vanished.sort();
            for path in vanished {
                self.remove_recorded(path, &mut stats, reporter);
            }
        }

        // attachments can appear or vanish without any document changing
        self.resolve_links()?;

        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "indexed {} documents: {} updated, {} unchanged, {} failed, {} removed in {} ms{}",
            stats.total,
            stats.processed,
            stats.skipped,
            stats.failed,
            stats.removed,
            stats.duration_ms,
            if stats.cancelled { " (cancelled)" } else { "" }
        );
        reporter.on_complete(&stats);
        Ok(stats)
    }

    /// Reads, fingerprints and parses a batch, outside any transaction.
    ///
    /// Results keep the batch order.
    fn prepare_batch(
        &self,
        pool: &ThreadPool,
        batch: &[PathBuf],
        stored: &HashMap<PathBuf, ContentHash>,
        force: bool,
    ) -> Vec<Prepared> {
        let root = self.root();
        let parser = self.parser.as_ref();
        let max_size = self.scanner.options().max_file_size;
        let dialect = self.config.dialect;

        pool.install(|| {
            batch
                .par_iter()
                .map(|relative| {
                    let path = root.join(relative);
                    let known = if force { None } else { stored.get(&path) };
                    prepare_document(&path, relative, known, parser, dialect, max_size)
                })
                .collect()
        })
    }

    /// Removes a document, recording a failure instead of aborting.
    fn remove_recorded(
        &mut self,
        path: &Path,
        stats: &mut IndexStats,
        reporter: &mut dyn ProgressReporter,
    ) {
        match self.store.remove_document(path) {
            Ok(true) => {
                tracing::debug!("removed {}", path.display());
                stats.removed += 1;
            }
            Ok(false) => {}
            Err(source) => {
                let error = BuildError::Storage {
                    path: path.to_path_buf(),
                    source,
                };
                record_failure(stats, reporter, path, &error);
            }
        }
    }

    // ===========================================
    // Single Documents
    // ===========================================

    /// Indexes one path, absolute or relative to the root.
    ///
    /// A path that no longer exists is removed from the store. Links are
    /// re-resolved when the store changed.
    pub fn index_one(&mut self, path: &Path, options: &IndexOptions) -> IndexResult<IndexOneResult> {
        let absolute = self.absolute(path);

        if !absolute.exists() {
            let updated = self.store.remove_document(&absolute)?;
            if updated {
                self.resolve_links()?;
            }
            return Ok(IndexOneResult {
                updated,
                error: None,
            });
        }

        let absolute = absolute.canonicalize().map_err(|e| IndexError::Io {
            path: absolute.clone(),
            source: e,
        })?;
        let Some(relative) = absolute.strip_prefix(self.root()).ok().map(Path::to_path_buf) else {
            return Ok(IndexOneResult {
                updated: false,
                error: Some(format!("{} is outside {}", absolute.display(), self.root().display())),
            });
        };
        if !self.scanner.is_candidate(&relative) {
            return Ok(IndexOneResult {
                updated: false,
                error: Some(format!("{} is not an indexable document", relative.display())),
            });
        }

        let known = if options.force_update {
            None
        } else {
            self.store.content_hash(&absolute)?
        };
        let prepared = prepare_document(
            &absolute,
            &relative,
            known.as_ref(),
            self.parser.as_ref(),
            self.config.dialect,
            self.scanner.options().max_file_size,
        );

        match prepared {
            Ok(None) => Ok(IndexOneResult::default()),
            Ok(Some(doc)) => {
                self.store.upsert_document(&doc.record, &doc.parsed)?;
                self.resolve_links()?;
                Ok(IndexOneResult {
                    updated: true,
                    error: None,
                })
            }
            Err(error) => {
                tracing::warn!("failed to index {}: {}", absolute.display(), error);
                let updated = self.store.remove_document(&absolute)?;
                if updated {
                    self.resolve_links()?;
                }
                Ok(IndexOneResult {
                    updated,
                    error: Some(error.to_string()),
                })
            }
        }
    }

    /// Removes one path, absolute or relative to the root.
    pub fn remove_one(&mut self, path: &Path) -> IndexResult<()> {
        let absolute = self.absolute(path);
        if self.store.remove_document(&absolute)? {
            tracing::debug!("removed {}", absolute.display());
        }
        Ok(())
    }

    /// Lists paths an [`Indexer::index_all`] run would touch: new, changed
    /// and vanished documents, as absolute paths.
    pub fn list_outdated(&self) -> IndexResult<Vec<PathBuf>> {
        let candidates = self.scanner.scan()?;
        let stored = self.store.indexed_hashes()?;
        let max_size = self.scanner.options().max_file_size;

        let mut outdated = Vec::new();
        let mut seen = HashSet::with_capacity(candidates.len());
        for relative in &candidates {
            let path = self.root().join(relative);
            let current = read_file(&path, max_size).map(|bytes| ContentHash::compute(&bytes));
            match (stored.get(&path), current) {
                (Some(known), Ok(current)) if *known == current => {}
                _ => outdated.push(path.clone()),
            }
            seen.insert(path);
        }
        outdated.extend(stored.into_keys().filter(|path| !seen.contains(path)));
        outdated.sort();
        Ok(outdated)
    }

    // ===========================================
    // Link Resolution
    // ===========================================

    /// Re-resolves every link against the current documents.
    ///
    /// Only rows whose resolution changed are written. Returns that count.
    pub fn resolve_links(&mut self) -> IndexResult<usize> {
        let documents = self.store.document_paths()?;
        let aliases = self.store.document_aliases()?;
        let resolver = LinkResolver::new(self.root(), &documents, &aliases);

        let updates: Vec<LinkResolution> = self
            .store
            .all_links()?
            .iter()
            .filter_map(|link| {
                let resolution = resolver.resolve(link);
                (resolution.target_path != link.target_path
                    || resolution.is_valid != link.is_valid)
                    .then_some(resolution)
            })
            .collect();

        let mut changed = 0;
        for chunk in updates.chunks(RESOLUTION_BATCH) {
            changed += self.store.update_link_resolution(chunk)?;
        }
        tracing::debug!("link resolution updated {} rows", changed);
        Ok(changed)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }
}

fn prepare_document(
    path: &Path,
    relative: &Path,
    known: Option<&ContentHash>,
    parser: &dyn DocumentParser,
    dialect: Dialect,
    max_size: u64,
) -> Prepared {
    let bytes = read_file(path, max_size)?;
    if known.is_some_and(|hash| *hash == ContentHash::compute(&bytes)) {
        return Ok(None);
    }

    let metadata = fs::metadata(path).map_err(|e| FsError::from_io(path, e))?;
    let text = decode(&bytes, path)?;
    let parsed = parser.parse(&text);

    let mut record = DocumentRecord::derive(path, relative, &bytes, &metadata, dialect)
        .with_frontmatter(parsed.has_frontmatter);
    if let Some(title) = &parsed.title {
        record = record.with_title(title.as_str());
    }

    Ok(Some(PreparedDocument { record, parsed }))
}

fn record_failure(
    stats: &mut IndexStats,
    reporter: &mut dyn ProgressReporter,
    path: &Path,
    error: &BuildError,
) {
    tracing::warn!("failed to index {}: {}", path.display(), error);
    stats.failed += 1;
    stats.errors.push(FailedDocument {
        path: path.to_path_buf(),
        error: error.to_string(),
    });
    reporter.on_error(path, error);
}
