//! SQLite schema definition and ordered migrations.
//!
//! Every migration runs in its own transaction together with the
//! `schema_version` row that records it, so a store is always at a
//! well-defined version.

use rusqlite::Connection;
use thiserror::Error;

/// Version this binary migrates stores to.
pub const SCHEMA_VERSION: i64 = 3;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("schema version {found} is newer than supported {supported}")]
    VersionTooNew { found: i64, supported: i64 },

    #[error("schema version {found} is older than required {required}; open the store writable to migrate")]
    Outdated { found: i64, required: i64 },

    #[error("migration to version {version} failed: {source}")]
    MigrationFailed {
        version: i64,
        #[source]
        source: rusqlite::Error,
    },
}

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    // Core tables
    Migration {
        version: 1,
        sql: r#"
        CREATE TABLE files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            relative_path TEXT NOT NULL,
            name TEXT NOT NULL,
            title TEXT NOT NULL,
            size INTEGER NOT NULL,
            created TEXT NOT NULL,
            modified TEXT NOT NULL,
            accessed TEXT NOT NULL,
            word_count INTEGER NOT NULL DEFAULT 0,
            char_count INTEGER NOT NULL DEFAULT 0,
            line_count INTEGER NOT NULL DEFAULT 0,
            content_hash TEXT NOT NULL,
            has_frontmatter INTEGER NOT NULL DEFAULT 0,
            dialect TEXT NOT NULL,
            indexed_at TEXT NOT NULL
        );

        CREATE TABLE frontmatter (
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            value_type TEXT NOT NULL
                CHECK (value_type IN ('string', 'number', 'boolean', 'date', 'array', 'object')),
            normalized TEXT NOT NULL,
            PRIMARY KEY (file_id, key)
        );

        CREATE TABLE tags (
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            source TEXT NOT NULL CHECK (source IN ('frontmatter', 'inline')),
            PRIMARY KEY (file_id, tag, source)
        );

        CREATE TABLE links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            target TEXT NOT NULL,
            display_text TEXT,
            kind TEXT NOT NULL
                CHECK (kind IN ('inline', 'reference', 'wikilink', 'external')),
            line INTEGER NOT NULL,
            section TEXT,
            is_embed INTEGER NOT NULL DEFAULT 0,
            target_path TEXT,
            is_valid INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX idx_files_modified ON files(modified);
        CREATE INDEX idx_files_relative_path ON files(relative_path);
        CREATE INDEX idx_frontmatter_key ON frontmatter(key, normalized);
        CREATE INDEX idx_tags_tag ON tags(tag);
        CREATE INDEX idx_links_file ON links(file_id);
        CREATE INDEX idx_links_target_path ON links(target_path);
        "#,
    },
    // Full-text index, rowid = files.id, maintained by the writer
    Migration {
        version: 2,
        sql: r#"
        CREATE VIRTUAL TABLE files_fts USING fts5(
            title,
            body,
            frontmatter,
            tags,
            tokenize = 'porter unicode61'
        );
        "#,
    },
    // Document structure
    Migration {
        version: 3,
        sql: r#"
        CREATE TABLE headings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            level INTEGER NOT NULL CHECK (level BETWEEN 1 AND 6),
            text TEXT NOT NULL,
            line INTEGER NOT NULL
        );

        CREATE TABLE callouts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            title TEXT,
            line INTEGER NOT NULL
        );

        CREATE INDEX idx_headings_file ON headings(file_id);
        CREATE INDEX idx_callouts_file ON callouts(file_id);
        CREATE INDEX idx_callouts_kind ON callouts(kind);
        "#,
    },
];

/// Returns the highest applied version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Applies every pending migration in order.
///
/// Idempotent: a store already at [`SCHEMA_VERSION`] is left untouched.
/// Returns the number of migrations applied.
///
/// # Errors
///
/// Returns `SchemaError::VersionTooNew` if the store was written by a newer
/// binary, `SchemaError::MigrationFailed` if a step fails (that step is
/// rolled back; earlier steps stay applied).
pub fn migrate(conn: &Connection) -> Result<usize, SchemaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(SchemaError::VersionTooNew {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration).map_err(|source| SchemaError::MigrationFailed {
            version: migration.version,
            source,
        })?;
        tracing::debug!("applied schema migration {}", migration.version);
        applied += 1;
    }
    Ok(applied)
}

fn apply(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![migration.version, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()
}

/// Verifies that a store can be read without migrating.
pub fn check_readable(conn: &Connection) -> Result<(), SchemaError> {
    let found = schema_version(conn)?;
    if found > SCHEMA_VERSION {
        Err(SchemaError::VersionTooNew {
            found,
            supported: SCHEMA_VERSION,
        })
    } else if found < SCHEMA_VERSION {
        Err(SchemaError::Outdated {
            found,
            required: SCHEMA_VERSION,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE name = ?",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn fresh_database_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn migrate_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(migrate(&conn).unwrap(), MIGRATIONS.len());

        for table in [
            "files",
            "frontmatter",
            "tags",
            "links",
            "files_fts",
            "headings",
            "callouts",
            "schema_version",
        ] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(migrate(&conn).unwrap(), 0);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, SCHEMA_VERSION);
    }

    #[test]
    fn migrate_resumes_from_partial_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);",
        )
        .unwrap();
        apply(&conn, &MIGRATIONS[0]).unwrap();

        assert_eq!(migrate(&conn).unwrap(), 2);
        assert!(table_exists(&conn, "files_fts"));
    }

    #[test]
    fn newer_store_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (99, 'later')",
            [],
        )
        .unwrap();

        assert!(matches!(
            migrate(&conn),
            Err(SchemaError::VersionTooNew {
                found: 99,
                supported: SCHEMA_VERSION
            })
        ));
        assert!(matches!(
            check_readable(&conn),
            Err(SchemaError::VersionTooNew { .. })
        ));
    }

    #[test]
    fn unmigrated_store_is_not_readable() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            check_readable(&conn),
            Err(SchemaError::Outdated { found: 0, .. })
        ));
    }

    #[test]
    fn files_table_has_metadata_columns() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let cols = columns(&conn, "files");
        for expected in [
            "path",
            "relative_path",
            "title",
            "created",
            "modified",
            "accessed",
            "word_count",
            "char_count",
            "line_count",
            "content_hash",
            "has_frontmatter",
            "dialect",
            "indexed_at",
        ] {
            assert!(cols.iter().any(|c| c == expected), "missing {}", expected);
        }
    }

    #[test]
    fn deleting_file_cascades() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        migrate(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO files (id, path, relative_path, name, title, size, created, modified,
                                accessed, content_hash, dialect, indexed_at)
             VALUES (1, '/a.md', 'a.md', 'a', 'a', 0, 't', 't', 't', 'h', 'generic', 't');
             INSERT INTO tags (file_id, tag, source) VALUES (1, 'x', 'inline');
             INSERT INTO links (file_id, target, kind, line) VALUES (1, 'b', 'wikilink', 1);
             INSERT INTO headings (file_id, level, text, line) VALUES (1, 1, 'A', 1);
             DELETE FROM files WHERE id = 1;",
        )
        .unwrap();

        for table in ["tags", "links", "headings"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "{} not cascaded", table);
        }
    }

    #[test]
    fn tag_source_is_checked() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO files (id, path, relative_path, name, title, size, created, modified,
                                accessed, content_hash, dialect, indexed_at)
             VALUES (1, '/a.md', 'a.md', 'a', 'a', 0, 't', 't', 't', 'h', 'generic', 't');",
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO tags (file_id, tag, source) VALUES (1, 'x', 'bogus')",
            [],
        );
        assert!(result.is_err());
    }
}
