use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db;
use crate::error::{Result, SchedulerError};
use crate::schedule::compute_next_run;
use crate::types::{Job, JobStatus, Schedule};

pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open(path.as_ref())?),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
        })
    }

    /// Submit a new job. Validates and computes the first `next_run` before
    /// any state change (§4.9).
    pub fn submit(&self, owner_conversation: &str, name: &str, schedule: Schedule) -> Result<Job> {
        let now = chrono::Utc::now();
        let next_run = compute_next_run(&schedule, now)?;
        let schedule_json = serde_json::to_string(&schedule)?;
        let id = Uuid::new_v4().to_string();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (id, owner_conversation, name, schedule, status, last_run, next_run, run_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'active', NULL, ?5, 0, ?6, ?6)",
            params![
                id,
                owner_conversation,
                name,
                schedule_json,
                next_run.map(|dt| dt.to_rfc3339()),
                now.to_rfc3339(),
            ],
        )?;
        drop(conn);
        self.get(&id)
    }

    pub fn get(&self, id: &str) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, owner_conversation, name, schedule, status, last_run, next_run, run_count, created_at, updated_at
             FROM jobs WHERE id = ?1",
            params![id],
            row_to_job,
        )
        .map_err(|_| SchedulerError::JobNotFound { id: id.to_string() })
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_conversation, name, schedule, status, last_run, next_run, run_count, created_at, updated_at
             FROM jobs ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Active jobs due to fire (`next_run <= now`), for the poll tick.
    pub fn due_jobs(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_conversation, name, schedule, status, last_run, next_run, run_count, created_at, updated_at
             FROM jobs WHERE status = 'active' AND next_run IS NOT NULL AND next_run <= ?1",
        )?;
        let rows = stmt.query_map(params![now.to_rfc3339()], row_to_job)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Record a fire: bump run_count, last_run, and recompute next_run from
    /// the fire time (not from whenever the tick happened to observe it).
    pub fn record_fire(&self, id: &str, fired_at: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let job = self.get(id)?;
        let next_run = compute_next_run(&job.schedule, fired_at)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET last_run = ?1, next_run = ?2, run_count = run_count + 1, updated_at = ?3
             WHERE id = ?4",
            params![
                fired_at.to_rfc3339(),
                next_run.map(|dt| dt.to_rfc3339()),
                chrono::Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        if next_run.is_none() {
            conn.execute(
                "UPDATE jobs SET status = 'paused' WHERE id = ?1",
                params![id],
            )?;
        }
        Ok(())
    }

    pub fn set_status(&self, id: &str, status: JobStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), chrono::Utc::now().to_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let schedule_json: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let last_run: Option<String> = row.get(5)?;
    let next_run: Option<String> = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Job {
        id: row.get(0)?,
        owner_conversation: row.get(1)?,
        name: row.get(2)?,
        schedule: serde_json::from_str(&schedule_json).unwrap_or(Schedule::Interval { every_ms: 60_000 }),
        status: status_str.parse().unwrap_or(JobStatus::Active),
        last_run: last_run.and_then(|s| parse_dt(&s)),
        next_run: next_run.and_then(|s| parse_dt(&s)),
        run_count: row.get(7)?,
        created_at: parse_dt(&created_at).unwrap_or_else(chrono::Utc::now),
        updated_at: parse_dt(&updated_at).unwrap_or_else(chrono::Utc::now),
    })
}

fn parse_dt(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_invalid_interval_is_rejected_without_state_change() {
        let store = JobStore::open_in_memory().unwrap();
        let err = store
            .submit("c1", "bad", Schedule::Interval { every_ms: 0 })
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn submit_then_get_round_trips() {
        let store = JobStore::open_in_memory().unwrap();
        let job = store
            .submit("c1", "ping", Schedule::Interval { every_ms: 60_000 })
            .unwrap();
        let fetched = store.get(&job.id).unwrap();
        assert_eq!(fetched.owner_conversation, "c1");
        assert!(fetched.next_run.is_some());
    }

    #[test]
    fn due_jobs_only_returns_jobs_whose_next_run_has_passed() {
        let store = JobStore::open_in_memory().unwrap();
        let job = store
            .submit("c1", "ping", Schedule::Interval { every_ms: 60_000 })
            .unwrap();

        let not_yet = store.due_jobs(chrono::Utc::now()).unwrap();
        assert!(not_yet.is_empty());

        let later = store.due_jobs(chrono::Utc::now() + chrono::Duration::seconds(61)).unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].id, job.id);
    }

    #[test]
    fn record_fire_advances_next_run_from_fire_time() {
        let store = JobStore::open_in_memory().unwrap();
        let job = store
            .submit("c1", "ping", Schedule::Interval { every_ms: 60_000 })
            .unwrap();

        let fired_at = chrono::Utc::now() + chrono::Duration::seconds(400);
        store.record_fire(&job.id, fired_at).unwrap();

        let updated = store.get(&job.id).unwrap();
        assert_eq!(updated.run_count, 1);
        assert_eq!(
            updated.next_run.unwrap(),
            fired_at + chrono::Duration::milliseconds(60_000)
        );
    }

    #[test]
    fn record_fire_on_exhausted_once_job_pauses_it() {
        let store = JobStore::open_in_memory().unwrap();
        let at = chrono::Utc::now() + chrono::Duration::seconds(5);
        let job = store.submit("c1", "once", Schedule::Once { at }).unwrap();

        store.record_fire(&job.id, at).unwrap();
        let updated = store.get(&job.id).unwrap();
        assert_eq!(updated.status, JobStatus::Paused);
    }
}
