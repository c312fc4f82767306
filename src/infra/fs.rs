//! Corpus scanning and file reading.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::domain::slash_path;

/// Default cap on the size of a single document (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Errors during file system operations on documents.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file too large: {path} is {size} bytes (limit {limit})")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("invalid encoding in {path}: {encoding}")]
    InvalidEncoding { path: PathBuf, encoding: String },

    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl FsError {
    /// Creates an appropriate FsError from an io::Error.
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path: path.into() },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied { path: path.into() },
            _ => FsError::Io {
                path: path.into(),
                source: error,
            },
        }
    }
}

/// Which files under the root are documents.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Allowed extensions, without the dot, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Directory names skipped wherever they appear.
    pub exclude_dirs: Vec<String>,
    /// Glob patterns matched against `/`-separated relative paths.
    pub exclude_globs: Vec<String>,
    /// Whether dot-files and dot-directories are scanned.
    pub include_hidden: bool,
    pub follow_links: bool,
    /// Files larger than this are reported, not read.
    pub max_file_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string(), "markdown".to_string()],
            exclude_dirs: vec![
                ".git".to_string(),
                ".obsidian".to_string(),
                ".trash".to_string(),
                "node_modules".to_string(),
            ],
            exclude_globs: Vec::new(),
            include_hidden: false,
            follow_links: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// A compiled set of scan rules for one root.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    options: ScanOptions,
    excludes: GlobSet,
}

impl Scanner {
    /// Compiles the scan rules.
    ///
    /// # Errors
    ///
    /// Returns `FsError::InvalidPattern` for a malformed exclusion glob.
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions) -> Result<Self, FsError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &options.exclude_globs {
            let glob = Glob::new(pattern).map_err(|source| FsError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let excludes = builder.build().map_err(|source| FsError::InvalidPattern {
            pattern: options.exclude_globs.join(", "),
            source,
        })?;

        Ok(Self {
            root: root.into(),
            options,
            excludes,
        })
    }

    /// Returns the corpus root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the scan options.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scans the root recursively for candidate documents.
    ///
    /// Returns paths relative to the root, sorted for deterministic ordering.
    /// Unreadable directory entries are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `FsError::NotFound` if the root doesn't exist,
    /// `FsError::NotADirectory` if it is not a directory.
    pub fn scan(&self) -> Result<Vec<PathBuf>, FsError> {
        if !self.root.exists() {
            return Err(FsError::NotFound {
                path: self.root.clone(),
            });
        }
        if !self.root.is_dir() {
            return Err(FsError::NotADirectory {
                path: self.root.clone(),
            });
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(self.options.follow_links)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded_entry(e))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.path().strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .filter(|relative| self.is_candidate(relative))
            .collect();

        paths.sort();
        Ok(paths)
    }

    /// Returns true if a relative path would be picked up by [`Scanner::scan`].
    pub fn is_candidate(&self, relative: &Path) -> bool {
        self.has_allowed_extension(relative)
            && !self.excludes.is_match(slash_path(relative))
            && !relative.components().any(|c| {
                let name = c.as_os_str().to_string_lossy();
                self.is_excluded_name(&name)
            })
    }

    fn is_excluded_entry(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() && self.is_excluded_name(&name) {
            return true;
        }
        if !self.options.include_hidden && name.starts_with('.') {
            return true;
        }
        entry
            .path()
            .strip_prefix(&self.root)
            .is_ok_and(|relative| self.excludes.is_match(slash_path(relative)))
    }

    fn is_excluded_name(&self, name: &str) -> bool {
        self.options.exclude_dirs.iter().any(|d| d == name)
            || (!self.options.include_hidden && name.starts_with('.'))
    }

    fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| {
                self.options
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
            })
    }
}

/// Reads a file, refusing anything over `max_size` bytes.
///
/// # Errors
///
/// Returns `FsError::TooLarge` before reading when the size exceeds the limit,
/// otherwise the mapped I/O error.
pub fn read_file(path: &Path, max_size: u64) -> Result<Vec<u8>, FsError> {
    let metadata = std::fs::metadata(path).map_err(|e| FsError::from_io(path, e))?;
    if metadata.len() > max_size {
        return Err(FsError::TooLarge {
            path: path.into(),
            size: metadata.len(),
            limit: max_size,
        });
    }
    std::fs::read(path).map_err(|e| FsError::from_io(path, e))
}

/// Decodes document bytes as UTF-8, stripping a UTF-8 byte order mark.
///
/// # Errors
///
/// Returns `FsError::InvalidEncoding` for UTF-16 byte order marks and for
/// invalid UTF-8.
pub fn decode(bytes: &[u8], path: &Path) -> Result<String, FsError> {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Err(FsError::InvalidEncoding {
            path: path.into(),
            encoding: "UTF-16 LE detected (byte order mark FF FE); convert to UTF-8".into(),
        });
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Err(FsError::InvalidEncoding {
            path: path.into(),
            encoding: "UTF-16 BE detected (byte order mark FE FF); convert to UTF-8".into(),
        });
    }

    let content = std::str::from_utf8(bytes).map_err(|e| FsError::InvalidEncoding {
        path: path.into(),
        encoding: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
    })?;

    Ok(content.strip_prefix('\u{FEFF}').unwrap_or(content).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    // ===========================================
    // Test Helpers
    // ===========================================

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "content").unwrap();
    }

    fn scan(dir: &Path, options: ScanOptions) -> Vec<String> {
        Scanner::new(dir, options)
            .unwrap()
            .scan()
            .unwrap()
            .iter()
            .map(|p| slash_path(p))
            .collect()
    }

    // ===========================================
    // Scanning
    // ===========================================

    #[test]
    fn scan_finds_markdown_recursively_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.md");
        touch(dir.path(), "a.md");
        touch(dir.path(), "sub/c.markdown");
        touch(dir.path(), "image.png");

        assert_eq!(
            scan(dir.path(), ScanOptions::default()),
            vec!["a.md", "b.md", "sub/c.markdown"]
        );
    }

    #[test]
    fn scan_matches_extensions_case_insensitively() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "LOUD.MD");

        assert_eq!(scan(dir.path(), ScanOptions::default()), vec!["LOUD.MD"]);
    }

    #[test]
    fn scan_skips_hidden_and_excluded_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "keep.md");
        touch(dir.path(), ".mdindex/stray.md");
        touch(dir.path(), ".hidden.md");
        touch(dir.path(), "node_modules/pkg/readme.md");
        touch(dir.path(), "deep/node_modules/readme.md");

        assert_eq!(scan(dir.path(), ScanOptions::default()), vec!["keep.md"]);
    }

    #[test]
    fn scan_applies_exclude_globs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes/keep.md");
        touch(dir.path(), "templates/daily.md");
        touch(dir.path(), "notes/draft.tmp.md");

        let options = ScanOptions {
            exclude_globs: vec!["templates/**".to_string(), "**/*.tmp.md".to_string()],
            ..ScanOptions::default()
        };
        assert_eq!(scan(dir.path(), options), vec!["notes/keep.md"]);
    }

    #[test]
    fn scan_includes_hidden_when_requested() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".drafts/idea.md");

        let options = ScanOptions {
            include_hidden: true,
            ..ScanOptions::default()
        };
        assert_eq!(scan(dir.path(), options), vec![".drafts/idea.md"]);
    }

    #[test]
    fn scan_missing_root_is_not_found() {
        let scanner = Scanner::new("/nonexistent/corpus", ScanOptions::default()).unwrap();
        assert!(matches!(scanner.scan(), Err(FsError::NotFound { .. })));
    }

    #[test]
    fn scan_file_root_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "file.md");
        let scanner = Scanner::new(dir.path().join("file.md"), ScanOptions::default()).unwrap();
        assert!(matches!(scanner.scan(), Err(FsError::NotADirectory { .. })));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let options = ScanOptions {
            exclude_globs: vec!["[unclosed".to_string()],
            ..ScanOptions::default()
        };
        assert!(matches!(
            Scanner::new(".", options),
            Err(FsError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn is_candidate_agrees_with_scan_rules() {
        let scanner = Scanner::new(".", ScanOptions::default()).unwrap();
        assert!(scanner.is_candidate(Path::new("a/b.md")));
        assert!(!scanner.is_candidate(Path::new("a/b.txt")));
        assert!(!scanner.is_candidate(Path::new(".git/b.md")));
    }

    // ===========================================
    // Reading & Decoding
    // ===========================================

    #[test]
    fn read_file_rejects_oversized_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.md");
        fs::write(&path, vec![b'x'; 64]).unwrap();

        let result = read_file(&path, 16);
        assert!(matches!(
            result,
            Err(FsError::TooLarge {
                size: 64,
                limit: 16,
                ..
            })
        ));
    }

    #[test]
    fn read_file_missing_is_not_found() {
        let result = read_file(Path::new("/nonexistent/file.md"), DEFAULT_MAX_FILE_SIZE);
        assert!(matches!(result, Err(FsError::NotFound { .. })));
    }

    #[test]
    fn decode_strips_utf8_bom() {
        let text = decode(b"\xEF\xBB\xBFhello", Path::new("a.md")).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn decode_rejects_utf16() {
        let result = decode(&[0xFF, 0xFE, b'h', 0], Path::new("a.md"));
        assert!(matches!(result, Err(FsError::InvalidEncoding { .. })));
    }

    #[test]
    fn decode_reports_invalid_utf8_offset() {
        let err = decode(b"ab\xFFcd", Path::new("a.md")).unwrap_err();
        assert!(err.to_string().contains("byte 2"));
    }

    #[test]
    fn from_io_maps_kinds() {
        let path = Path::new("/x.md");
        assert!(matches!(
            FsError::from_io(path, io::Error::new(io::ErrorKind::NotFound, "x")),
            FsError::NotFound { .. }
        ));
        assert!(matches!(
            FsError::from_io(path, io::Error::new(io::ErrorKind::PermissionDenied, "x")),
            FsError::PermissionDenied { .. }
        ));
        assert!(matches!(
            FsError::from_io(path, io::Error::other("x")),
            FsError::Io { .. }
        ));
    }
}
