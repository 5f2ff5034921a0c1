//! Import session repository.
//!
//! An import session is one bounded ingestion run against a job/UUT.
//! It owns all media captured during it.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::DatabaseError;

/// An import session row.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub import_session_id: i64,
    pub job_id: String,
    pub operator_id: String,
    pub uut_serial: String,
    pub purpose: String,
    pub status: String,
    pub started_at: String,
    pub ended_at: Option<String>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            import_session_id: row.get("import_session_id")?,
            job_id: row.get("job_id")?,
            operator_id: row.get("operator_id")?,
            uut_serial: row.get("uut_serial")?,
            purpose: row.get("purpose")?,
            status: row.get("status")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
        })
    }
}

/// Opens a new session with status `running`. Returns its id.
pub fn open(
    conn: &Connection,
    job_id: &str,
    operator_id: &str,
    uut_serial: &str,
    purpose: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO import_sessions (job_id, operator_id, uut_serial, purpose, status, started_at)
         VALUES (?1, ?2, ?3, ?4, 'running', ?5)",
        params![job_id, operator_id, uut_serial, purpose, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, session_id: i64) -> Result<Option<SessionRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT import_session_id, job_id, operator_id, uut_serial, purpose, status,
                    started_at, ended_at
             FROM import_sessions WHERE import_session_id = ?1",
            params![session_id],
            SessionRow::from_row,
        )
        .optional()?)
}

/// Finishes a running session with `completed` or `failed`, setting
/// `ended_at` to now. Returns false when the session was not running
/// (already finished, or unknown) — the transition happens exactly once.
pub fn finish(conn: &Connection, session_id: i64, outcome: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE import_sessions SET status = ?2, ended_at = ?3
         WHERE import_session_id = ?1 AND status = 'running'",
        params![session_id, outcome, Utc::now().to_rfc3339()],
    )?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{job_repo, operator_repo, Database};

    fn seed(conn: &Connection) -> i64 {
        job_repo::insert(conn, "JOB-1").unwrap();
        operator_repo::insert(conn, "op1", "Alex", None).unwrap();
        open(conn, "JOB-1", "op1", "SN-0042", "initial").unwrap()
    }

    #[test]
    fn test_open_and_find() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = seed(conn);
            let session = find(conn, id)?.unwrap();
            assert_eq!(session.status, "running");
            assert_eq!(session.uut_serial, "SN-0042");
            assert!(session.ended_at.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_open_requires_existing_job_and_operator() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            assert!(open(conn, "JOB-404", "op-404", "SN", "initial").is_err());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_finish_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = seed(conn);
            assert!(finish(conn, id, "completed")?);

            let session = find(conn, id)?.unwrap();
            assert_eq!(session.status, "completed");
            let ended = session.ended_at.unwrap();
            assert!(ended >= session.started_at);

            // Second transition is rejected.
            assert!(!finish(conn, id, "failed")?);
            assert_eq!(find(conn, id)?.unwrap().status, "completed");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_invalid_purpose_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            job_repo::insert(conn, "JOB-2")?;
            operator_repo::insert(conn, "op2", "Sam", None)?;
            assert!(open(conn, "JOB-2", "op2", "SN", "whenever").is_err());
            Ok(())
        })
        .unwrap();
    }
}
