use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
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
        "CREATE TABLE IF NOT EXISTS jobs (
            id                TEXT PRIMARY KEY,
            owner_conversation TEXT NOT NULL,
            name              TEXT NOT NULL,
            schedule          TEXT NOT NULL,
            status            TEXT NOT NULL DEFAULT 'active',
            last_run          TEXT,
            next_run          TEXT,
            run_count         INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs(next_run);
        CREATE INDEX IF NOT EXISTS idx_jobs_owner ON jobs(owner_conversation);",
    )?;
    Ok(())
}
