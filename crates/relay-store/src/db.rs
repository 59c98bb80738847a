use std::path::Path;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{Result, StoreError};

/// Dimensionality of stored embedding vectors. Fixed so the `vec0` virtual
/// table schema is stable across restarts.
pub const EMBEDDING_DIM: usize = 384;

/// Open (creating if needed) the documents database with the `sqlite-vec`
/// extension registered, WAL mode enabled, and the schema migrated.
pub fn open(path: &Path) -> Result<Connection> {
    register_vec_extension();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    init_db(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (tests).
pub fn open_in_memory() -> Result<Connection> {
    register_vec_extension();
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}

fn register_vec_extension() {
    // Safe to call repeatedly; sqlite3_auto_extension deduplicates registrations.
    unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute::<
            *const (),
            unsafe extern "C" fn(
                *mut rusqlite::ffi::sqlite3,
                *mut *mut std::os::raw::c_char,
                *const rusqlite::ffi::sqlite3_api_routines,
            ) -> std::os::raw::c_int,
        >(sqlite_vec::sqlite3_vec_init as *const ())));
    }
}

/// Initialise/migrate the schema. Idempotent — safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_documents_table(conn)?;
    migrate_documents_columns(conn)?;
    create_fts_index(conn)?;
    create_vector_collection(conn)?;
    create_supersede_log(conn)?;
    verify_schema(conn)?;
    Ok(())
}

fn create_documents_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            id               TEXT PRIMARY KEY,
            layer            TEXT,
            doc_type         TEXT NOT NULL,
            source_path      TEXT,
            content          TEXT NOT NULL,
            content_indexed  INTEGER NOT NULL DEFAULT 0,
            origin           TEXT NOT NULL,
            project          TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            access_count     INTEGER NOT NULL DEFAULT 0,
            last_accessed_at TEXT,
            confidence       INTEGER NOT NULL DEFAULT 60,
            decay            INTEGER NOT NULL DEFAULT 100,
            expires_at       TEXT,
            is_private       INTEGER NOT NULL DEFAULT 0,
            created_by       TEXT,
            superseded_by    TEXT,
            concepts         TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_documents_layer ON documents(layer);
        CREATE INDEX IF NOT EXISTS idx_documents_project ON documents(project);
        CREATE INDEX IF NOT EXISTS idx_documents_expires ON documents(expires_at);",
    )
}

/// Idempotent column-add migrations. New columns introduced after the first
/// release are added here behind an `ALTER TABLE ... ADD COLUMN` guarded by
/// a `PRAGMA table_info` check, so re-running never errors on an existing
/// column (§4.1 Migrations).
fn migrate_documents_columns(conn: &Connection) -> rusqlite::Result<()> {
    let existing = existing_columns(conn, "documents")?;
    let wanted: &[(&str, &str)] = &[
        ("superseded_by", "TEXT"),
        ("is_private", "INTEGER NOT NULL DEFAULT 0"),
    ];
    for (name, ddl_type) in wanted {
        if !existing.contains(*name) {
            let sql = format!("ALTER TABLE documents ADD COLUMN {name} {ddl_type}");
            conn.execute(&sql, [])?;
            info!(column = %name, "migrated documents table: added column");
        }
    }
    Ok(())
}

fn existing_columns(conn: &Connection, table: &str) -> rusqlite::Result<std::collections::HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(cols)
}

/// Standalone FTS5 index. Documents carry UUID ids rather than integer
/// rowids, so the index is not wired as an external-content table; `id` is
/// stored as an UNINDEXED column and synced manually on every write.
fn create_fts_index(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            id UNINDEXED,
            content
        );",
    )
}

fn create_vector_collection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS documents_vec USING vec0(
            embedding float[{EMBEDDING_DIM}],
            +doc_id TEXT
        );"
    ))
}

fn create_supersede_log(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS supersede_log (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            superseded_id   TEXT NOT NULL,
            superseding_id  TEXT NOT NULL,
            reason          TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_supersede_superseded ON supersede_log(superseded_id);",
    )
}

/// Refuse to start if a required column/index is absent after migration
/// (§4.1: "the Store refuses to start if a required column/index is absent
/// after the migration pass").
fn verify_schema(conn: &Connection) -> Result<()> {
    let cols = existing_columns(conn, "documents")?;
    let required = [
        "id",
        "layer",
        "doc_type",
        "content",
        "confidence",
        "decay",
        "expires_at",
        "is_private",
        "superseded_by",
        "concepts",
    ];
    for col in required {
        if !cols.contains(col) {
            return Err(StoreError::MigrationIncomplete(format!(
                "documents.{col}"
            )));
        }
    }

    let fts_exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='documents_fts'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !fts_exists {
        return Err(StoreError::MigrationIncomplete("documents_fts".into()));
    }

    let vec_exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='documents_vec'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !vec_exists {
        warn!("documents_vec table missing — vector search will degrade to lexical-only");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_creates_required_tables() {
        let conn = open_in_memory().unwrap();
        let cols = existing_columns(&conn, "documents").unwrap();
        assert!(cols.contains("confidence"));
        assert!(cols.contains("decay"));
    }

    #[test]
    fn migration_is_idempotent() {
        let conn = open_in_memory().unwrap();
        // Re-running init_db must not error even though columns already exist.
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }
}
