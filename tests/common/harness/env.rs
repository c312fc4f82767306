//! Isolated corpus with a temp directory.

// Allow dead code since not every test binary uses every helper
#![allow(dead_code)]

use super::{MdindexCommand, TestDoc};
use mdindex::domain::Dialect;
use mdindex::index::{
    IndexOptions, IndexResult, IndexStats, Indexer, IndexerConfig, NoopReporter, Store, store_path,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated test environment with a temporary corpus root.
///
/// The directory is removed when the `TestEnv` is dropped.
pub struct TestEnv {
    /// The temporary directory (kept for lifetime management)
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestEnv {
    /// Creates a new isolated test environment with an empty corpus.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to resolve temp directory");
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Returns the corpus root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path where the index database is stored.
    pub fn index_path(&self) -> PathBuf {
        store_path(&self.root)
    }

    /// Writes a file relative to the root, creating parent directories.
    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Writes a test document and returns its absolute path.
    pub fn add_doc(&self, doc: &TestDoc) -> PathBuf {
        self.write(doc.path(), doc.render())
    }

    /// Deletes a file relative to the root.
    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.root.join(relative)).expect("Failed to remove file");
    }

    /// Renames a file relative to the root.
    pub fn rename(&self, from: &str, to: &str) {
        fs::rename(self.root.join(from), self.root.join(to)).expect("Failed to rename file");
    }

    /// Opens (or creates) the on-disk store for writing.
    pub fn open_store(&self) -> Store {
        Store::open(&self.index_path()).expect("Failed to open store")
    }

    /// Runs one indexing pass with the wikilink dialect.
    pub fn index(&self, store: &mut Store) -> IndexResult<IndexStats> {
        self.index_with(store, &IndexOptions::default())
    }

    /// Runs one indexing pass with the wikilink dialect and `options`.
    pub fn index_with(&self, store: &mut Store, options: &IndexOptions) -> IndexResult<IndexStats> {
        let config = IndexerConfig {
            dialect: Dialect::Wikilink,
            ..Default::default()
        };
        Indexer::new(store, &self.root, config)?.index_all(options, &mut NoopReporter)
    }

    /// Builds the on-disk index and returns the run's stats.
    pub fn build_index(&self) -> IndexResult<IndexStats> {
        let mut store = self.open_store();
        self.index(&mut store)
    }

    /// Creates an `MdindexCommand` rooted at this corpus.
    pub fn cmd(&self) -> MdindexCommand {
        MdindexCommand::new().dir(&self.root)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_creates_empty_root() {
        let env = TestEnv::new();
        assert!(env.root().is_dir());
        assert!(!env.index_path().exists());
    }

    #[test]
    fn test_env_write_creates_parents() {
        let env = TestEnv::new();
        let path = env.write("nested/deep/a.md", "x");
        assert!(path.is_file());
    }

    #[test]
    fn test_env_build_index_creates_db() {
        let env = TestEnv::new();
        env.add_doc(&TestDoc::new("a.md").body("hello"));

        let stats = env.build_index().expect("Should build index");

        assert_eq!(stats.processed, 1);
        assert!(env.index_path().exists(), "index file should be created");
    }

    #[test]
    fn test_env_provides_command() {
        let env = TestEnv::new();
        let args = env.cmd().get_args().to_vec();
        assert_eq!(args[0], "--dir");
        assert_eq!(args[1], env.root().to_string_lossy());
    }
}
