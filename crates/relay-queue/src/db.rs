use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

/// Open (creating if needed) the queue database, WAL mode, schema migrated.
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS queue_entries (
            id          TEXT PRIMARY KEY,
            conversation TEXT NOT NULL,
            messages    TEXT NOT NULL,
            state       TEXT NOT NULL,
            attempt     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_queue_entries_conversation
            ON queue_entries(conversation);
        CREATE INDEX IF NOT EXISTS idx_queue_entries_state
            ON queue_entries(state);",
    )?;
    Ok(())
}
