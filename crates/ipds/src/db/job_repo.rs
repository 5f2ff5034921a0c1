//! Job repository — jobs own import sessions.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::DatabaseError;

/// A job row.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub job_id: String,
    pub status: String,
    pub created_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a new job with status `open`.
pub fn insert(conn: &Connection, job_id: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (job_id, status, created_at) VALUES (?1, 'open', ?2)",
        params![job_id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn find(conn: &Connection, job_id: &str) -> Result<Option<JobRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT job_id, status, created_at FROM jobs WHERE job_id = ?1",
            params![job_id],
            JobRow::from_row,
        )
        .optional()?)
}

/// Sets the job status. Returns false when the job does not exist.
pub fn set_status(conn: &Connection, job_id: &str, status: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?2 WHERE job_id = ?1",
        params![job_id, status],
    )?;
    Ok(changed == 1)
}
