//! Tags and entity-tags (section 3's "Tag, Entity-Tag" entities).
//!
//! A `tag` is a shared name; `entity_tag` is the per-repo many-to-many
//! assignment of a tag to an entity, carrying a confidence and a source
//! (`SEMANTIC_MATCH`, `MANUAL`, `RULE`). Stored in the same per-repo
//! SQLite file as the FTS index (see `fts.rs`) rather than a dedicated
//! process-wide tag table: this workspace keeps one SQLite file per repo
//! throughout (`meridian-core::lazy`, `meridian-control`'s control.db),
//! so tag identity is deduplicated per repo instead of globally. Noted
//! as an open tradeoff in DESIGN.md, not a silent deviation.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, SearchError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tag (
    id INTEGER PRIMARY KEY,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS entity_tag (
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    tag_id INTEGER NOT NULL REFERENCES tag(id),
    confidence REAL NOT NULL DEFAULT 1.0,
    source TEXT NOT NULL,
    PRIMARY KEY (entity_type, entity_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_entity_tag_entity ON entity_tag(entity_type, entity_id);
";

/// `entity_tag.source` (section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSource {
    SemanticMatch,
    Manual,
    Rule,
}

impl TagSource {
    fn as_str(&self) -> &'static str {
        match self {
            TagSource::SemanticMatch => "SEMANTIC_MATCH",
            TagSource::Manual => "MANUAL",
            TagSource::Rule => "RULE",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "SEMANTIC_MATCH" => TagSource::SemanticMatch,
            "RULE" => TagSource::Rule,
            _ => TagSource::Manual,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityTag {
    pub entity_type: String,
    pub entity_id: String,
    pub tag: String,
    pub confidence: f64,
    pub source: TagSource,
}

/// Connection is mutex-guarded for the same reason as `FtsIndex`: shared
/// behind `Arc<HybridRetriever>` across concurrent MCP/HTTP calls.
pub struct TagStore {
    conn: Mutex<Connection>,
}

impl TagStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| SearchError::Connection(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| SearchError::Connection(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Idempotent under re-tagging with the same (entity, tag) pair
    /// (testable property covered in the control plane's job-dedup
    /// tests; the same "second call is a no-op update" shape applies
    /// here).
    pub fn tag_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        tag_name: &str,
        confidence: f64,
        source: TagSource,
    ) -> Result<()> {
        let tag_id = self.ensure_tag(tag_name)?;
        self.conn
            .lock()
            .execute(
                "INSERT INTO entity_tag (entity_type, entity_id, tag_id, confidence, source)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(entity_type, entity_id, tag_id) DO UPDATE SET
                    confidence = excluded.confidence,
                    source = excluded.source",
                params![entity_type, entity_id, tag_id, confidence, source.as_str()],
            )
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(())
    }

    fn ensure_tag(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute("INSERT OR IGNORE INTO tag (name) VALUES (?1)", params![name])
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        conn.query_row("SELECT id FROM tag WHERE name = ?1", params![name], |row| row.get(0))
            .map_err(|e| SearchError::Connection(e.to_string()))
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name FROM tag ORDER BY name ASC")
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| SearchError::Connection(e.to_string()))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(names)
    }

    /// Tags currently assigned to one entity.
    pub fn tags_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<EntityTag>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT et.entity_type, et.entity_id, t.name, et.confidence, et.source
                 FROM entity_tag et JOIN tag t ON t.id = et.tag_id
                 WHERE et.entity_type = ?1 AND et.entity_id = ?2",
            )
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        let rows = stmt
            .query_map(params![entity_type, entity_id], Self::row_to_entity_tag)
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| SearchError::Connection(e.to_string()))
    }

    /// Tag sets for a batch of entity ids, for the retriever's filter
    /// pass. Missing entities simply have no entry (empty tag set).
    pub fn tags_for_entities(&self, entity_ids: &[String]) -> Result<std::collections::HashMap<String, Vec<String>>> {
        let mut out: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
        if entity_ids.is_empty() {
            return Ok(out);
        }
        let placeholders = entity_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT et.entity_id, t.name FROM entity_tag et
             JOIN tag t ON t.id = et.tag_id
             WHERE et.entity_id IN ({placeholders})"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(|e| SearchError::Connection(e.to_string()))?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            entity_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        for row in rows {
            let (entity_id, tag) = row.map_err(|e| SearchError::Connection(e.to_string()))?;
            out.entry(entity_id).or_default().push(tag);
        }
        Ok(out)
    }

    fn row_to_entity_tag(row: &rusqlite::Row) -> rusqlite::Result<EntityTag> {
        Ok(EntityTag {
            entity_type: row.get(0)?,
            entity_id: row.get(1)?,
            tag: row.get(2)?,
            confidence: row.get(3)?,
            source: TagSource::from_str(&row.get::<_, String>(4)?),
        })
    }

    #[allow(dead_code)]
    fn untag(&self, entity_type: &str, entity_id: &str, tag_name: &str) -> Result<()> {
        let conn = self.conn.lock();
        let tag_id: Option<i64> = conn
            .query_row("SELECT id FROM tag WHERE name = ?1", params![tag_name], |row| row.get(0))
            .optional()
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        if let Some(tag_id) = tag_id {
            conn.execute(
                "DELETE FROM entity_tag WHERE entity_type = ?1 AND entity_id = ?2 AND tag_id = ?3",
                params![entity_type, entity_id, tag_id],
            )
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagging_same_pair_twice_is_idempotent() {
        let store = TagStore::open_in_memory().unwrap();
        store.tag_entity("Callable", "src/a.rs:foo", "auth", 0.9, TagSource::SemanticMatch).unwrap();
        store.tag_entity("Callable", "src/a.rs:foo", "auth", 0.95, TagSource::Manual).unwrap();

        let tags = store.tags_for_entity("Callable", "src/a.rs:foo").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].confidence, 0.95);
        assert!(matches!(tags[0].source, TagSource::Manual));
    }

    #[test]
    fn tags_for_entities_batches_lookup() {
        let store = TagStore::open_in_memory().unwrap();
        store.tag_entity("Callable", "a", "x", 1.0, TagSource::Rule).unwrap();
        store.tag_entity("Callable", "b", "y", 1.0, TagSource::Rule).unwrap();

        let map = store.tags_for_entities(&["a".to_string(), "b".to_string(), "c".to_string()]).unwrap();
        assert_eq!(map.get("a").unwrap(), &vec!["x".to_string()]);
        assert_eq!(map.get("b").unwrap(), &vec!["y".to_string()]);
        assert!(!map.contains_key("c"));
    }
}
