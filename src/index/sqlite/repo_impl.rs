//! DocumentRepository implementation for Store.

use super::Store;
use super::transaction::Transaction;
use crate::domain::{DocumentRecord, LinkKind, list_items, FieldKind};
use crate::index::{
    DocumentRepository, IndexError, IndexResult, IndexedPath, LinkResolution, StoredLink,
};
use crate::infra::ContentHash;
use crate::parser::ParsedDocument;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

impl DocumentRepository for Store {
    fn upsert_document(
        &mut self,
        record: &DocumentRecord,
        parsed: &ParsedDocument,
    ) -> IndexResult<i64> {
        let tx = self.begin()?;
        let path = Store::path_key(&record.path);

        // 1. files row, keeping the id of an existing document
        tx.exec(
            "INSERT INTO files (path, relative_path, name, title, size, created, modified,
                                accessed, word_count, char_count, line_count, content_hash,
                                has_frontmatter, dialect, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(path) DO UPDATE SET
                 relative_path = excluded.relative_path,
                 name = excluded.name,
                 title = excluded.title,
                 size = excluded.size,
                 created = excluded.created,
                 modified = excluded.modified,
                 accessed = excluded.accessed,
                 word_count = excluded.word_count,
                 char_count = excluded.char_count,
                 line_count = excluded.line_count,
                 content_hash = excluded.content_hash,
                 has_frontmatter = excluded.has_frontmatter,
                 dialect = excluded.dialect,
                 indexed_at = excluded.indexed_at",
            params![
                path,
                record.relative_path,
                record.name,
                record.title,
                record.size as i64,
                record.created.to_rfc3339(),
                record.modified.to_rfc3339(),
                record.accessed.to_rfc3339(),
                record.counts.words as i64,
                record.counts.characters as i64,
                record.counts.lines as i64,
                record.content_hash.as_str(),
                record.has_frontmatter,
                record.dialect.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        let file_id: i64 = tx.conn().query_row(
            "SELECT id FROM files WHERE path = ?",
            [&path],
            |row| row.get(0),
        )?;

        // 2. fan-out rows are replaced wholesale
        for table in ["frontmatter", "tags", "links", "headings", "callouts"] {
            tx.exec(&format!("DELETE FROM {} WHERE file_id = ?", table), [file_id])?;
        }

        insert_fan_out(&tx, file_id, parsed)?;

        // 3. full-text entry shares the document's rowid
        tx.exec("DELETE FROM files_fts WHERE rowid = ?", [file_id])?;
        tx.exec(
            "INSERT INTO files_fts (rowid, title, body, frontmatter, tags)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                file_id,
                record.title,
                parsed.body,
                frontmatter_text(parsed),
                tags_text(parsed),
            ],
        )?;

        tx.commit()?;
        Ok(file_id)
    }

    fn remove_document(&mut self, path: &Path) -> IndexResult<bool> {
        let key = Store::path_key(path);
        let tx = self.begin()?;

        let file_id: Option<i64> = tx
            .conn()
            .query_row("SELECT id FROM files WHERE path = ?", [&key], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(file_id) = file_id else {
            return Ok(false);
        };

        tx.exec(
            "UPDATE links SET target_path = NULL, is_valid = 0 WHERE target_path = ?",
            [&key],
        )?;
        tx.exec("DELETE FROM files_fts WHERE rowid = ?", [file_id])?;
        tx.exec("DELETE FROM files WHERE id = ?", [file_id])?;
        tx.commit()?;
        Ok(true)
    }

    fn indexed_hashes(&self) -> IndexResult<HashMap<PathBuf, ContentHash>> {
        let mut stmt = self.conn.prepare("SELECT path, content_hash FROM files")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(path, hash)| Ok((Store::path_from_key(path), parse_hash(&hash)?)))
            .collect()
    }

    fn content_hash(&self, path: &Path) -> IndexResult<Option<ContentHash>> {
        let hash: Option<String> = self
            .conn
            .query_row(
                "SELECT content_hash FROM files WHERE path = ?",
                [Store::path_key(path)],
                |row| row.get(0),
            )
            .optional()?;
        hash.as_deref().map(parse_hash).transpose()
    }

    fn document_paths(&self) -> IndexResult<Vec<IndexedPath>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, relative_path FROM files ORDER BY relative_path")?;
        let paths = stmt
            .query_map([], |row| {
                Ok(IndexedPath {
                    path: Store::path_from_key(row.get(0)?),
                    relative_path: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    fn document_aliases(&self) -> IndexResult<Vec<(PathBuf, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.path, fm.value, fm.value_type
             FROM frontmatter fm JOIN files f ON f.id = fm.file_id
             WHERE lower(fm.key) IN ('aliases', 'alias')",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut aliases = Vec::new();
        for (path, value, value_type) in rows {
            let kind = FieldKind::parse(&value_type).ok_or_else(|| {
                IndexError::InvalidData(format!("unknown field type '{}'", value_type))
            })?;
            let path = Store::path_from_key(path);
            let items = match kind {
                // a scalar alias is one name, spaces included
                FieldKind::String => vec![value.trim().to_string()],
                _ => list_items(kind, &value),
            };
            aliases.extend(
                items
                    .into_iter()
                    .filter(|a| !a.is_empty())
                    .map(|a| (path.clone(), a)),
            );
        }
        Ok(aliases)
    }

    fn all_links(&self) -> IndexResult<Vec<StoredLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, f.path, f.relative_path, l.target, l.kind, l.section,
                    l.target_path, l.is_valid
             FROM links l JOIN files f ON f.id = l.file_id
             ORDER BY l.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, bool>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(id, source, source_relative, target, kind, section, target_path, is_valid)| {
                    let kind = LinkKind::parse(&kind).ok_or_else(|| {
                        IndexError::InvalidData(format!("unknown link kind '{}'", kind))
                    })?;
                    Ok(StoredLink {
                        id,
                        source: Store::path_from_key(source),
                        source_relative,
                        target,
                        kind,
                        section,
                        target_path: target_path.map(Store::path_from_key),
                        is_valid,
                    })
                },
            )
            .collect()
    }

    fn update_link_resolution(&mut self, updates: &[LinkResolution]) -> IndexResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let tx = self.begin()?;
        let mut changed = 0;
        for update in updates {
            changed += tx.exec(
                "UPDATE links SET target_path = ?1, is_valid = ?2
                 WHERE id = ?3 AND (target_path IS NOT ?1 OR is_valid IS NOT ?2)",
                params![
                    update.target_path.as_deref().map(Store::path_key),
                    update.is_valid,
                    update.id,
                ],
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }
}

fn insert_fan_out(tx: &Transaction<'_>, file_id: i64, parsed: &ParsedDocument) -> IndexResult<()> {
    for field in &parsed.fields {
        tx.exec(
            "INSERT OR REPLACE INTO frontmatter (file_id, key, value, value_type, normalized)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                file_id,
                field.key(),
                field.raw(),
                field.kind().as_str(),
                field.normalized()
            ],
        )?;
    }

    for tag in &parsed.tags {
        tx.exec(
            "INSERT OR IGNORE INTO tags (file_id, tag, source) VALUES (?1, ?2, ?3)",
            params![file_id, tag.name(), tag.source().as_str()],
        )?;
    }

    for link in &parsed.links {
        // external links need no resolution; others start unresolved
        let is_valid = link.is_external();
        tx.exec(
            "INSERT INTO links (file_id, target, display_text, kind, line, section,
                                is_embed, target_path, is_valid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
            params![
                file_id,
                link.target(),
                link.display_text(),
                link.kind().as_str(),
                link.line(),
                link.section(),
                link.is_embed(),
                is_valid,
            ],
        )?;
    }

    for heading in &parsed.headings {
        tx.exec(
            "INSERT INTO headings (file_id, level, text, line) VALUES (?1, ?2, ?3, ?4)",
            params![file_id, heading.level, heading.text, heading.line],
        )?;
    }

    for callout in &parsed.callouts {
        tx.exec(
            "INSERT INTO callouts (file_id, kind, title, line) VALUES (?1, ?2, ?3, ?4)",
            params![file_id, callout.kind, callout.title, callout.line],
        )?;
    }

    Ok(())
}

/// Header fields as `key: value` lines for full-text search.
fn frontmatter_text(parsed: &ParsedDocument) -> String {
    parsed
        .fields
        .iter()
        .map(|f| format!("{}: {}", f.key(), f.raw()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn tags_text(parsed: &ParsedDocument) -> String {
    let mut seen = HashSet::new();
    parsed
        .tags
        .iter()
        .map(|t| t.name())
        .filter(|name| seen.insert(*name))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_hash(hex: &str) -> IndexResult<ContentHash> {
    ContentHash::from_hex(hex)
        .map_err(|e| IndexError::InvalidData(format!("invalid content hash: {}", e)))
}
