//! Lexical (full-text) index over chunk content, one SQLite file per repo.
//!
//! Realizes the spec's `to_tsquery`-over-Postgres FTS candidate source on
//! top of SQLite's FTS5, the same substitution `meridian-control::queue`
//! makes for the job queue. Uses the standard external-content-table
//! pattern (FTS5 docs section 4.4.2) so `chunk_text` stays the single
//! source of truth and `chunk_fts` is rebuilt via triggers on write.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::{Result, SearchError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunk_text (
    id INTEGER PRIMARY KEY,
    entity_id TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    content TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS chunk_fts USING fts5(
    name,
    content,
    content = 'chunk_text',
    content_rowid = 'id',
    tokenize = 'porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunk_text_ai AFTER INSERT ON chunk_text BEGIN
    INSERT INTO chunk_fts(rowid, name, content) VALUES (new.id, new.name, new.content);
END;

CREATE TRIGGER IF NOT EXISTS chunk_text_ad AFTER DELETE ON chunk_text BEGIN
    INSERT INTO chunk_fts(chunk_fts, rowid, name, content) VALUES('delete', old.id, old.name, old.content);
END;

CREATE TRIGGER IF NOT EXISTS chunk_text_au AFTER UPDATE ON chunk_text BEGIN
    INSERT INTO chunk_fts(chunk_fts, rowid, name, content) VALUES('delete', old.id, old.name, old.content);
    INSERT INTO chunk_fts(rowid, name, content) VALUES (new.id, new.name, new.content);
END;
";

/// One ranked lexical hit.
#[derive(Debug, Clone)]
pub struct FtsHit {
    pub entity_id: String,
    pub name: String,
    pub file_path: String,
    /// SQLite's `bm25()`; more negative is a better match. Callers that
    /// need a "higher is better" score should negate this.
    pub bm25: f64,
}

/// Per-repo FTS5 index over chunk content. The connection is mutex-guarded
/// (same as `meridian-control::registry`/`queue`) since `HybridRetriever`
/// is shared across concurrent tool calls behind an `Arc`.
pub struct FtsIndex {
    conn: Mutex<Connection>,
}

impl FtsIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| SearchError::Connection(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| SearchError::Connection(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Insert or replace one chunk's lexical content. Idempotent on
    /// `entity_id`, matching the incremental reindex's "recompute and
    /// overwrite" semantics rather than append-only accumulation.
    pub fn upsert(&self, entity_id: &str, name: &str, file_path: &str, content: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO chunk_text (entity_id, name, file_path, content)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entity_id) DO UPDATE SET
                    name = excluded.name,
                    file_path = excluded.file_path,
                    content = excluded.content",
                rusqlite::params![entity_id, name, file_path, content],
            )
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(())
    }

    pub fn remove(&self, entity_id: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM chunk_text WHERE entity_id = ?1", rusqlite::params![entity_id])
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(())
    }

    /// OR-join the query's tokens (Open Question 1: `websearch_to_tsquery`
    /// style, not `to_tsquery`'s implicit AND) and rank with `bm25()`.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>> {
        let match_expr = or_join_tokens(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT t.entity_id, t.name, t.file_path, bm25(chunk_fts) AS rank
                 FROM chunk_fts
                 JOIN chunk_text t ON t.id = chunk_fts.rowid
                 WHERE chunk_fts MATCH ?1
                 ORDER BY rank ASC
                 LIMIT ?2",
            )
            .map_err(|e| SearchError::Connection(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params![match_expr, limit as i64], |row| {
                Ok(FtsHit {
                    entity_id: row.get(0)?,
                    name: row.get(1)?,
                    file_path: row.get(2)?,
                    bm25: row.get(3)?,
                })
            })
            .map_err(|e| SearchError::Connection(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| SearchError::Connection(e.to_string()))
    }
}

/// Tokenize on whitespace/punctuation, drop single-character noise tokens,
/// quote each token (FTS5 MATCH syntax) and OR-join.
fn or_join_tokens(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|tok| tok.len() > 1)
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}
