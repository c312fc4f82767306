//! Document records: the per-file metadata stored in the index.

use crate::domain::Dialect;
use crate::infra::ContentHash;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A markdown heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// 1 through 6.
    pub level: u8,
    pub text: String,
    /// 1-based line within the source file.
    pub line: u32,
}

/// A callout block (`> [!warning] Title`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Callout {
    /// Lower-cased callout type (`note`, `warning`...).
    pub kind: String,
    pub title: Option<String>,
    pub line: u32,
}

/// Content counters computed from a document's decoded text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCounts {
    pub words: u64,
    pub characters: u64,
    pub lines: u64,
}

impl ContentCounts {
    /// Counts whitespace-separated words, Unicode scalar values and lines.
    pub fn of(text: &str) -> Self {
        Self {
            words: text.split_whitespace().count() as u64,
            characters: text.chars().count() as u64,
            lines: text.lines().count() as u64,
        }
    }
}

/// The metadata row for one indexed file.
///
/// Every field is recomputed on each re-index; nothing is carried over from
/// a previous version of the row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    /// Absolute path; the unique key.
    pub path: PathBuf,
    /// Path relative to the corpus root, `/`-separated.
    pub relative_path: String,
    /// File name without extension.
    pub name: String,
    pub title: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    pub counts: ContentCounts,
    pub content_hash: ContentHash,
    pub has_frontmatter: bool,
    pub dialect: Dialect,
}

impl DocumentRecord {
    /// Derives a record from raw bytes and filesystem metadata.
    ///
    /// The title defaults to the file name; callers holding a parsed document
    /// replace it with [`DocumentRecord::with_title`]. Timestamps the platform
    /// cannot report fall back to the modification time, and that in turn to
    /// the Unix epoch.
    pub fn derive(
        path: &Path,
        relative_path: &Path,
        bytes: &[u8],
        metadata: &Metadata,
        dialect: Dialect,
    ) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let modified = metadata.modified().ok();
        let fallback = modified.unwrap_or(SystemTime::UNIX_EPOCH);
        let name = relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            relative_path: slash_path(relative_path),
            title: name.clone(),
            name,
            size: bytes.len() as u64,
            created: metadata.created().unwrap_or(fallback).into(),
            modified: fallback.into(),
            accessed: metadata.accessed().unwrap_or(fallback).into(),
            counts: ContentCounts::of(&text),
            content_hash: ContentHash::compute(bytes),
            has_frontmatter: false,
            dialect,
        }
    }

    /// Sets the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Records whether a structured header was successfully parsed.
    pub fn with_frontmatter(mut self, has_frontmatter: bool) -> Self {
        self.has_frontmatter = has_frontmatter;
        self
    }
}

/// Renders a relative path with `/` separators regardless of platform.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
