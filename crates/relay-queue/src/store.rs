use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::types::{EntryState, QueueEntry};

/// Durable log of queue entry transitions (§4.6: "every transition is
/// persisted before acknowledgment, so crash recovery replays only
/// unfinished entries").
pub struct QueueStore {
    conn: Mutex<Connection>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl QueueStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = db::open(&db_path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
            db_path: PathBuf::new(),
        })
    }

    /// Persist a brand new pending entry.
    pub fn insert_pending(&self, conversation: &str, messages_json: &str) -> Result<QueueEntry> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now();

        conn.execute(
            "INSERT INTO queue_entries (id, conversation, messages, state, attempt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
            params![id, conversation, messages_json, EntryState::Pending.as_str(), now.to_rfc3339()],
        )?;

        drop(conn);
        self.get(&id)
    }

    pub fn get(&self, id: &str) -> Result<QueueEntry> {
        let conn = self.conn.lock().unwrap();
        let entry = conn
            .query_row(
                "SELECT id, conversation, messages, state, attempt, created_at, updated_at
                 FROM queue_entries WHERE id = ?1",
                params![id],
                row_to_entry,
            )
            .map_err(|_| crate::error::QueueError::NotFound(id.to_string()))?;
        Ok(entry)
    }

    pub fn set_state(&self, id: &str, state: EntryState, attempt: u32) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE queue_entries SET state = ?1, attempt = ?2, updated_at = ?3 WHERE id = ?4",
            params![state.as_str(), attempt, chrono::Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM queue_entries WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Entries still in play after an unclean shutdown: pending, in-flight,
    /// or awaiting retry. Done and dead-letter entries are terminal.
    pub fn list_unfinished(&self) -> Result<Vec<QueueEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation, messages, state, attempt, created_at, updated_at
             FROM queue_entries
             WHERE state IN ('pending', 'in_flight', 'retry')
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn in_flight_for(&self, conversation: &str) -> Result<Option<QueueEntry>> {
        let conn = self.conn.lock().unwrap();
        let entry = conn
            .query_row(
                "SELECT id, conversation, messages, state, attempt, created_at, updated_at
                 FROM queue_entries WHERE conversation = ?1 AND state = 'in_flight'",
                params![conversation],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<QueueEntry> {
    let messages_json: String = row.get(2)?;
    let state_str: String = row.get(3)?;
    let created_str: String = row.get(5)?;
    let updated_str: String = row.get(6)?;

    Ok(QueueEntry {
        id: row.get(0)?,
        conversation: row.get(1)?,
        messages: serde_json::from_str(&messages_json).unwrap_or_default(),
        state: state_str.parse().unwrap_or(EntryState::Pending),
        attempt: row.get(4)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let store = QueueStore::open_in_memory().unwrap();
        let entry = store.insert_pending("c1", "[]").unwrap();
        let fetched = store.get(&entry.id).unwrap();
        assert_eq!(fetched.conversation, "c1");
        assert_eq!(fetched.state, EntryState::Pending);
    }

    #[test]
    fn set_state_updates_attempt_and_state() {
        let store = QueueStore::open_in_memory().unwrap();
        let entry = store.insert_pending("c1", "[]").unwrap();
        store.set_state(&entry.id, EntryState::Retry, 1).unwrap();
        let fetched = store.get(&entry.id).unwrap();
        assert_eq!(fetched.state, EntryState::Retry);
        assert_eq!(fetched.attempt, 1);
    }

    #[test]
    fn list_unfinished_excludes_terminal_states() {
        let store = QueueStore::open_in_memory().unwrap();
        let a = store.insert_pending("c1", "[]").unwrap();
        let b = store.insert_pending("c2", "[]").unwrap();
        store.set_state(&b.id, EntryState::Done, 0).unwrap();

        let unfinished = store.list_unfinished().unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].id, a.id);
    }

    #[test]
    fn in_flight_for_finds_the_active_entry() {
        let store = QueueStore::open_in_memory().unwrap();
        let entry = store.insert_pending("c1", "[]").unwrap();
        assert!(store.in_flight_for("c1").unwrap().is_none());

        store.set_state(&entry.id, EntryState::InFlight, 0).unwrap();
        let found = store.in_flight_for("c1").unwrap().unwrap();
        assert_eq!(found.id, entry.id);
    }
}
