use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{Result, StoreError};
use crate::fts;
use crate::snapshot::{self, SnapshotPaths};
use crate::types::{Document, Layer, NewDocument};
use crate::vector;

/// Owns the documents relational table plus its FTS and vector shadow
/// indexes, and keeps all three in sync on every write (§3/§4.1).
pub struct Store {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = db::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };
        store.reconcile_indexes()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn create(&self, new_doc: NewDocument) -> Result<Document> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now();
        let id = Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO documents (
                id, layer, doc_type, source_path, content, content_indexed,
                origin, project, created_at, updated_at, access_count,
                last_accessed_at, confidence, decay, expires_at, is_private,
                created_by, superseded_by, concepts
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, 1,
                ?6, ?7, ?8, ?8, 0,
                NULL, ?9, 100, ?10, ?11,
                ?12, NULL, ?13
            )",
            params![
                id,
                new_doc.layer.map(|l| l.as_str()),
                new_doc.doc_type,
                new_doc.source_path,
                new_doc.content,
                new_doc.origin,
                new_doc.project,
                now.to_rfc3339(),
                new_doc.confidence,
                new_doc.expires_at.map(|t| t.to_rfc3339()),
                new_doc.is_private,
                new_doc.created_by,
                new_doc.concepts.to_string(),
            ],
        )?;

        fts::insert(&conn, &id, &new_doc.content)?;
        if let Some(embedding) = &new_doc.embedding {
            if let Err(e) = vector::upsert(&conn, &id, embedding) {
                warn!(doc_id = %id, error = %e, "vector upsert failed, continuing lexical-only");
            }
        }

        self.get_locked(&conn, &id)
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        let conn = self.conn.lock().unwrap();
        self.get_locked(&conn, id)
    }

    fn get_locked(&self, conn: &Connection, id: &str) -> Result<Document> {
        conn.query_row(
            "SELECT id, layer, doc_type, source_path, content, content_indexed,
                    origin, project, created_at, updated_at, access_count,
                    last_accessed_at, confidence, decay, expires_at, is_private,
                    created_by, superseded_by, concepts
             FROM documents WHERE id = ?1",
            params![id],
            row_to_document,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Bump `access_count`/`last_accessed_at` on a read hit (retrieval path).
    pub fn touch_access(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE documents SET access_count = access_count + 1, last_accessed_at = ?1
             WHERE id = ?2",
            params![chrono::Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Replace content/concepts and re-sync the shadow indexes.
    pub fn update_content(
        &self,
        id: &str,
        content: &str,
        concepts: &serde_json::Value,
        embedding: Option<&[f32]>,
    ) -> Result<Document> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now();
        let changed = conn.execute(
            "UPDATE documents SET content = ?1, concepts = ?2, updated_at = ?3 WHERE id = ?4",
            params![content, concepts.to_string(), now.to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        fts::insert(&conn, id, content)?;
        if let Some(embedding) = embedding {
            if let Err(e) = vector::upsert(&conn, id, embedding) {
                warn!(doc_id = %id, error = %e, "vector upsert failed, continuing lexical-only");
            }
        }
        self.get_locked(&conn, id)
    }

    /// Set `decay`/`confidence` (both already clamped to 0..100 by the caller).
    pub fn update_decay(&self, id: &str, decay: u8, confidence: u8) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE documents SET decay = ?1, confidence = ?2 WHERE id = ?3",
            params![decay, confidence, id],
        )?;
        Ok(())
    }

    /// Demote a document out of its layer and clear its TTL, used when
    /// archiving an expired episodic document (§4.3 "demote layer to null,
    /// clear TTL").
    pub fn archive_layer(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE documents SET layer = NULL, expires_at = NULL WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Mark `id` as superseded by `by_id`, logging the supersede event.
    pub fn supersede(&self, id: &str, by_id: &str, reason: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE documents SET superseded_by = ?1 WHERE id = ?2",
            params![by_id, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        conn.execute(
            "INSERT INTO supersede_log (superseded_id, superseding_id, reason, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, by_id, reason, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        fts::delete(&conn, id)?;
        vector::delete(&conn, id)?;
        Ok(())
    }

    /// List documents, optionally filtered by layer and/or project, newest first.
    pub fn list(
        &self,
        layer: Option<Layer>,
        project: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, layer, doc_type, source_path, content, content_indexed,
                    origin, project, created_at, updated_at, access_count,
                    last_accessed_at, confidence, decay, expires_at, is_private,
                    created_by, superseded_by, concepts
             FROM documents WHERE 1=1",
        );
        if layer.is_some() {
            sql.push_str(" AND layer = :layer");
        }
        if project.is_some() {
            sql.push_str(" AND project = :project");
        }
        sql.push_str(" ORDER BY updated_at DESC LIMIT :limit");

        let mut stmt = conn.prepare(&sql)?;
        let layer_str = layer.map(|l| l.as_str().to_string());
        let rows = stmt.query_map(
            rusqlite::named_params! {
                ":layer": layer_str,
                ":project": project,
                ":limit": limit as i64,
            },
            row_to_document,
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// All non-expired documents (used by retrieval/consolidation passes).
    pub fn list_all(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, layer, doc_type, source_path, content, content_indexed,
                    origin, project, created_at, updated_at, access_count,
                    last_accessed_at, confidence, decay, expires_at, is_private,
                    created_by, superseded_by, concepts
             FROM documents",
        )?;
        let rows = stmt.query_map([], row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn fts_search(&self, query: &str, limit: usize) -> Result<Vec<fts::FtsHit>> {
        let conn = self.conn.lock().unwrap();
        fts::search(&conn, query, limit)
    }

    pub fn vector_search(&self, embedding: &[f32], limit: usize) -> Result<Vec<vector::VectorHit>> {
        let conn = self.conn.lock().unwrap();
        vector::search(&conn, embedding, limit)
    }

    /// Full snapshot (relational copy + JSON + CSV) ahead of a destructive
    /// batch operation. Callers must abort on `Err` (§4.1 Backups).
    pub fn snapshot(&self) -> Result<SnapshotPaths> {
        let conn = self.conn.lock().unwrap();
        snapshot::snapshot_before_destructive(
            &conn,
            &self.db_path,
            |c| {
                let mut stmt = c.prepare(
                    "SELECT id, layer, doc_type, source_path, content, content_indexed,
                            origin, project, created_at, updated_at, access_count,
                            last_accessed_at, confidence, decay, expires_at, is_private,
                            created_by, superseded_by, concepts
                     FROM documents",
                )?;
                let rows = stmt.query_map([], row_to_document)?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            },
            chrono::Utc::now(),
        )
    }

    /// Startup reconciliation: any relational row missing from the vector
    /// collection is re-synced into FTS (vector sync needs an embedding the
    /// store cannot produce on its own, so it only logs the gap) (§4.1).
    fn reconcile_indexes(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, content FROM documents")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        let mut missing_vec = 0usize;
        for (id, content) in &rows {
            fts::insert(&conn, id, content)?;
            if !vector::contains(&conn, id)? {
                missing_vec += 1;
            }
        }
        if missing_vec > 0 {
            info!(
                missing_vec,
                "startup reconciliation: documents without a vector embedding"
            );
        }
        Ok(())
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let layer_str: Option<String> = row.get(1)?;
    let layer = layer_str.and_then(|s| s.parse::<Layer>().ok());
    let concepts_str: String = row.get(18)?;
    let concepts = serde_json::from_str(&concepts_str).unwrap_or(serde_json::json!({}));

    Ok(Document {
        id: row.get(0)?,
        layer,
        doc_type: row.get(2)?,
        source_path: row.get(3)?,
        content: row.get(4)?,
        content_indexed: row.get::<_, i64>(5)? != 0,
        origin: row.get(6)?,
        project: row.get(7)?,
        created_at: parse_dt(row.get::<_, String>(8)?),
        updated_at: parse_dt(row.get::<_, String>(9)?),
        access_count: row.get(10)?,
        last_accessed_at: row.get::<_, Option<String>>(11)?.map(parse_dt),
        confidence: row.get(12)?,
        decay: row.get(13)?,
        expires_at: row.get::<_, Option<String>>(14)?.map(parse_dt),
        is_private: row.get::<_, i64>(15)? != 0,
        created_by: row.get(16)?,
        superseded_by: row.get(17)?,
        concepts,
    })
}

fn parse_dt(value: String) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new(content: &str) -> NewDocument {
        NewDocument {
            layer: Some(Layer::Semantic),
            doc_type: "note".into(),
            source_path: None,
            content: content.into(),
            origin: "test".into(),
            project: Some("relay".into()),
            confidence: 60,
            expires_at: None,
            is_private: false,
            created_by: None,
            concepts: serde_json::json!({}),
            embedding: None,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let doc = store.create(sample_new("hello world")).unwrap();
        let fetched = store.get(&doc.id).unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.decay, 100);
    }

    #[test]
    fn create_is_searchable_via_fts() {
        let store = Store::open_in_memory().unwrap();
        let doc = store.create(sample_new("the quick brown fox")).unwrap();
        let hits = store.fts_search("fox", 10).unwrap();
        assert_eq!(hits[0].doc_id, doc.id);
    }

    #[test]
    fn delete_removes_document_and_index_entries() {
        let store = Store::open_in_memory().unwrap();
        let doc = store.create(sample_new("the quick brown fox")).unwrap();
        store.delete(&doc.id).unwrap();
        assert!(store.get(&doc.id).is_err());
        assert!(store.fts_search("fox", 10).unwrap().is_empty());
    }

    #[test]
    fn supersede_logs_replacement() {
        let store = Store::open_in_memory().unwrap();
        let old = store.create(sample_new("old fact")).unwrap();
        let new = store.create(sample_new("new fact")).unwrap();
        store.supersede(&old.id, &new.id, "duplicate").unwrap();
        let fetched = store.get(&old.id).unwrap();
        assert_eq!(fetched.superseded_by.as_deref(), Some(new.id.as_str()));
    }

    #[test]
    fn list_filters_by_layer() {
        let store = Store::open_in_memory().unwrap();
        store.create(sample_new("semantic doc")).unwrap();
        let mut procedural = sample_new("procedural doc");
        procedural.layer = Some(Layer::Procedural);
        store.create(procedural).unwrap();

        let results = store.list(Some(Layer::Procedural), None, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "procedural doc");
    }
}
