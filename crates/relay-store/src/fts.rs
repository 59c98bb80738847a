use rusqlite::{params, Connection};

use crate::error::Result;

/// Strip FTS5 special syntax characters so raw user queries never blow up
/// `MATCH` parsing; every term is then OR'd together.
pub fn sanitize_query(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if "\"*^:().".contains(c) { ' ' } else { c })
        .collect();
    cleaned
        .split_whitespace()
        .map(|term| format!("\"{term}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

pub fn insert(conn: &Connection, doc_id: &str, content: &str) -> Result<()> {
    delete(conn, doc_id)?;
    conn.execute(
        "INSERT INTO documents_fts(id, content) VALUES (?1, ?2)",
        params![doc_id, content],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, doc_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM documents_fts WHERE id = ?1",
        params![doc_id],
    )?;
    Ok(())
}

/// A single lexical candidate, best match first (lowest `bm25` rank).
#[derive(Debug, Clone)]
pub struct FtsHit {
    pub doc_id: String,
    pub score: f32,
}

/// Lexical candidates for `query`, bounded by `limit`. Returns an empty list
/// for a blank query rather than matching everything.
pub fn search(conn: &Connection, query: &str, limit: usize) -> Result<Vec<FtsHit>> {
    let match_expr = sanitize_query(query);
    if match_expr.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT id, bm25(documents_fts) as rank
         FROM documents_fts
         WHERE documents_fts MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
        let doc_id: String = row.get(0)?;
        let rank: f64 = row.get(1)?;
        // bm25() is negative and more negative is better; fold into a
        // positive 0..1-ish score so callers treat fts/vector hits alike.
        Ok(FtsHit {
            doc_id,
            score: (-rank as f32).max(0.0),
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn sanitize_strips_special_chars_and_ors_terms() {
        let sanitized = sanitize_query("foo(bar) \"baz\"");
        assert_eq!(sanitized, "\"foo\" OR \"bar\" OR \"baz\"");
    }

    #[test]
    fn sanitize_of_blank_query_is_blank() {
        assert_eq!(sanitize_query("   "), "");
    }

    #[test]
    fn insert_then_search_finds_match() {
        let conn = open_in_memory().unwrap();
        insert(&conn, "a", "the quick brown fox").unwrap();
        insert(&conn, "b", "a slow green turtle").unwrap();

        let hits = search(&conn, "fox", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "a");
    }

    #[test]
    fn blank_query_returns_no_hits() {
        let conn = open_in_memory().unwrap();
        insert(&conn, "a", "the quick brown fox").unwrap();
        assert!(search(&conn, "   ", 10).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_from_index() {
        let conn = open_in_memory().unwrap();
        insert(&conn, "a", "the quick brown fox").unwrap();
        delete(&conn, "a").unwrap();
        assert!(search(&conn, "fox", 10).unwrap().is_empty());
    }
}
