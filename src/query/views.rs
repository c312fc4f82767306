//! Derived views over the store.
//!
//! Each view is a parameterized read query run through
//! [`QueryEngine::execute`], so it obeys the same limits as caller SQL.

use super::{ExecuteOptions, QueryEngine, QueryError, QueryResult};
use crate::domain::{FieldValue, Tag, TagSource};
use crate::index::Value;

/// FTS5 column weights: title, body, frontmatter, tags.
const SEARCH_WEIGHTS: &str = "10.0, 1.0, 3.0, 5.0";

/// Options for [`QueryEngine::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Maximum hits, clamped like any other row cap.
    pub limit: Option<usize>,
    /// Adds a `snippet` column with `<b>`/`</b>` around matches.
    pub with_snippets: bool,
}

impl QueryEngine<'_> {
    /// Tags ranked by the number of documents carrying them.
    pub fn tag_frequency(&self, limit: usize) -> Result<QueryResult, QueryError> {
        self.execute(
            "SELECT tag, COUNT(DISTINCT file_id) AS documents
             FROM tags
             GROUP BY tag
             ORDER BY documents DESC, tag",
            &[],
            &ExecuteOptions::with_limit(limit),
        )
    }

    /// Most recently modified documents first.
    pub fn recent_documents(&self, limit: usize) -> Result<QueryResult, QueryError> {
        self.execute(
            "SELECT relative_path AS path, title, modified
             FROM files
             ORDER BY modified DESC, relative_path",
            &[],
            &ExecuteOptions::with_limit(limit),
        )
    }

    /// Documents that no other document links to.
    pub fn orphans(&self) -> Result<QueryResult, QueryError> {
        self.execute(
            "SELECT f.relative_path AS path, f.title
             FROM files f
             WHERE NOT EXISTS (
                 SELECT 1 FROM links l
                 WHERE l.target_path = f.path AND l.is_valid = 1 AND l.file_id != f.id
             )
             ORDER BY f.relative_path",
            &[],
            &ExecuteOptions::default(),
        )
    }

    /// Links whose target could not be resolved.
    pub fn broken_links(&self) -> Result<QueryResult, QueryError> {
        self.execute(
            "SELECT f.relative_path AS source, l.target, l.kind, l.line, l.section
             FROM links l
             JOIN files f ON f.id = l.file_id
             WHERE l.is_valid = 0
             ORDER BY f.relative_path, l.line, l.target",
            &[],
            &ExecuteOptions::default(),
        )
    }

    /// Documents carrying `tag`. With `include_nested`, tags below it in the
    /// hierarchy (`tag/child`) match too.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Validation` if `tag` is not a valid tag name.
    pub fn find_by_tag(&self, tag: &str, include_nested: bool) -> Result<QueryResult, QueryError> {
        let tag = Tag::new(tag, TagSource::Inline)
            .map_err(|e| QueryError::validation(e.to_string(), tag))?;

        if include_nested {
            let prefix = format!("{}/%", escape_like(tag.name()));
            self.execute(
                "SELECT DISTINCT f.relative_path AS path, f.title
                 FROM files f
                 JOIN tags t ON t.file_id = f.id
                 WHERE t.tag = ? OR t.tag LIKE ? ESCAPE '\\'
                 ORDER BY f.relative_path",
                &[Value::from(tag.name()), Value::from(prefix)],
                &ExecuteOptions::default(),
            )
        } else {
            self.execute(
                "SELECT DISTINCT f.relative_path AS path, f.title
                 FROM files f
                 JOIN tags t ON t.file_id = f.id
                 WHERE t.tag = ?
                 ORDER BY f.relative_path",
                &[Value::from(tag.name())],
                &ExecuteOptions::default(),
            )
        }
    }

    /// Documents with a resolved link to `path`, given relative to the
    /// corpus root or absolute.
    pub fn find_backlinks(&self, path: &str) -> Result<QueryResult, QueryError> {
        self.execute(
            "SELECT DISTINCT s.relative_path AS path, s.title
             FROM links l
             JOIN files s ON s.id = l.file_id
             JOIN files t ON t.path = l.target_path
             WHERE l.is_valid = 1 AND s.id != t.id
               AND (t.relative_path = ? OR t.path = ?)
             ORDER BY s.relative_path",
            &[Value::from(path), Value::from(path)],
            &ExecuteOptions::default(),
        )
    }

    /// Documents whose header field `key` equals `value`, compared in
    /// normalized form. List fields match if any element equals `value`.
    pub fn find_by_field(&self, key: &str, value: &str) -> Result<QueryResult, QueryError> {
        let normalized = FieldValue::scalar(key, value).normalized().to_string();
        self.execute(
            "SELECT f.relative_path AS path, f.title, fm.value
             FROM frontmatter fm
             JOIN files f ON f.id = fm.file_id
             WHERE lower(fm.key) = lower(?)
               AND (fm.normalized = ?
                    OR EXISTS (
                        SELECT 1
                        FROM json_each(CASE WHEN fm.value_type = 'array' THEN fm.value ELSE '[]' END) j
                        WHERE j.value = ?
                    ))
             ORDER BY f.relative_path",
            &[
                Value::from(key),
                Value::from(normalized),
                Value::from(value.trim()),
            ],
            &ExecuteOptions::default(),
        )
    }

    /// One row of corpus-wide counts.
    pub fn document_stats(&self) -> Result<QueryResult, QueryError> {
        self.execute(
            "SELECT
                 (SELECT COUNT(*) FROM files) AS documents,
                 (SELECT COALESCE(SUM(word_count), 0) FROM files) AS words,
                 (SELECT COUNT(*) FROM files WHERE has_frontmatter = 1) AS with_frontmatter,
                 (SELECT COUNT(DISTINCT tag) FROM tags) AS tags,
                 (SELECT COUNT(*) FROM links) AS links,
                 (SELECT COUNT(*) FROM links WHERE is_valid = 0) AS broken_links,
                 (SELECT COUNT(*) FROM headings) AS headings,
                 (SELECT COUNT(*) FROM callouts) AS callouts,
                 (SELECT MAX(indexed_at) FROM files) AS last_indexed",
            &[],
            &ExecuteOptions::default(),
        )
    }

    /// Ranked full-text search.
    ///
    /// Every whitespace-separated word of `term` must match; a trailing `*`
    /// makes a word a prefix. FTS5 operators in `term` are matched literally.
    /// An empty term matches nothing.
    pub fn search(&self, term: &str, options: &SearchOptions) -> Result<QueryResult, QueryError> {
        let Some(expression) = match_expression(term) else {
            let mut columns = vec!["path".to_string(), "title".to_string(), "rank".to_string()];
            if options.with_snippets {
                columns.push("snippet".to_string());
            }
            return Ok(QueryResult {
                columns,
                rows: Vec::new(),
                row_count: 0,
                elapsed_ms: 0,
                tables_touched: vec!["files".to_string(), "files_fts".to_string()],
                used_full_text: true,
                truncated: false,
            });
        };

        let snippet = if options.with_snippets {
            ", snippet(files_fts, -1, '<b>', '</b>', '...', 16) AS snippet"
        } else {
            ""
        };
        let sql = format!(
            "SELECT f.relative_path AS path, f.title,
                    -bm25(files_fts, {}) AS rank{}
             FROM files_fts
             JOIN files f ON f.id = files_fts.rowid
             WHERE files_fts MATCH ?
             ORDER BY rank DESC, f.relative_path",
            SEARCH_WEIGHTS, snippet
        );

        self.execute(
            &sql,
            &[Value::from(expression)],
            &ExecuteOptions {
                limit: options.limit,
                ..Default::default()
            },
        )
    }
}

/// Quotes each word of `term` as an FTS5 string.
fn match_expression(term: &str) -> Option<String> {
    let words: Vec<String> = term
        .split_whitespace()
        .filter_map(|word| {
            let (word, prefix) = match word.strip_suffix('*') {
                Some(stem) if !stem.is_empty() => (stem, true),
                _ => (word, false),
            };
            let word = word.trim_matches('*');
            if word.is_empty() {
                return None;
            }
            let quoted = format!("\"{}\"", word.replace('"', "\"\""));
            Some(if prefix { quoted + "*" } else { quoted })
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
