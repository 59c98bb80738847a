use rusqlite::{params, Connection};

use crate::db::EMBEDDING_DIM;
use crate::error::Result;

/// Pack an embedding vector into the little-endian byte layout `sqlite-vec`
/// expects for a `float[N]` column.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Cosine distance → similarity score in `0.0..=1.0`.
pub fn distance_to_score(distance: f32) -> f32 {
    (1.0 - distance.clamp(0.0, 2.0) / 2.0).clamp(0.0, 1.0)
}

/// Insert or replace the embedding for a document. A no-op when the vector
/// collection is unavailable (caller degrades to lexical-only, §4.2).
pub fn upsert(conn: &Connection, doc_id: &str, embedding: &[f32]) -> Result<()> {
    debug_assert_eq!(embedding.len(), EMBEDDING_DIM, "embedding dimension mismatch");
    delete(conn, doc_id)?;
    conn.execute(
        "INSERT INTO documents_vec(embedding, doc_id) VALUES (?1, ?2)",
        params![embedding_to_bytes(embedding), doc_id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, doc_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM documents_vec WHERE doc_id = ?1",
        params![doc_id],
    )?;
    Ok(())
}

/// A single candidate from the vector collection, closest first.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub doc_id: String,
    pub score: f32,
}

/// Cosine-similarity candidates for `query_embedding`, bounded by `limit`.
pub fn search(conn: &Connection, query_embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, vec_distance_cosine(embedding, ?1) as distance
         FROM documents_vec
         ORDER BY distance
         LIMIT ?2",
    )?;
    let bytes = embedding_to_bytes(query_embedding);
    let rows = stmt.query_map(params![bytes, limit as i64], |row| {
        let doc_id: String = row.get(0)?;
        let distance: f32 = row.get(1)?;
        Ok(VectorHit {
            doc_id,
            score: distance_to_score(distance),
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Whether any row has an embedding for this document — used by the
/// startup reconciliation pass to find relational rows missing a vector.
pub fn contains(conn: &Connection, doc_id: &str) -> Result<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM documents_vec WHERE doc_id = ?1 LIMIT 1",
            params![doc_id],
            |row| row.get(0),
        )
        .ok();
    Ok(exists.is_some())
}

/// All document ids currently present in the vector collection.
pub fn all_doc_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT doc_id FROM documents_vec")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}
