//! Operator repository.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::DatabaseError;

/// An operator row.
#[derive(Debug, Clone)]
pub struct OperatorRow {
    pub operator_id: String,
    pub name: String,
    pub role: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl OperatorRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            operator_id: row.get("operator_id")?,
            name: row.get("name")?,
            role: row.get("role")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(
    conn: &Connection,
    operator_id: &str,
    name: &str,
    role: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO operators (operator_id, name, role, is_active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![operator_id, name, role, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn find(conn: &Connection, operator_id: &str) -> Result<Option<OperatorRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT operator_id, name, role, is_active, created_at
             FROM operators WHERE operator_id = ?1",
            params![operator_id],
            OperatorRow::from_row,
        )
        .optional()?)
}
