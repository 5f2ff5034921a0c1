//! Export, local archive, and delivery repositories.
//!
//! Export and LocalArchive rows are written by the export pipeline and
//! never updated afterward except for their single status transition:
//! created -> archived|failed and pending -> verified|failed.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::DatabaseError;

/// An export row.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub export_id: i64,
    pub import_session_id: i64,
    pub export_path: String,
    pub manifest_path: String,
    pub manifest_hash: String,
    pub status: String,
    pub created_at: String,
}

impl ExportRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            export_id: row.get("export_id")?,
            import_session_id: row.get("import_session_id")?,
            export_path: row.get("export_path")?,
            manifest_path: row.get("manifest_path")?,
            manifest_hash: row.get("manifest_hash")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A local archive row — the secondary, independently verified copy.
#[derive(Debug, Clone)]
pub struct LocalArchiveRow {
    pub archive_id: i64,
    pub export_id: i64,
    pub archive_path: String,
    pub verify_status: String,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl LocalArchiveRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            archive_id: row.get("archive_id")?,
            export_id: row.get("export_id")?,
            archive_path: row.get("archive_path")?,
            verify_status: row.get("verify_status")?,
            last_error: row.get("last_error")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts an export with status `created`. Returns its id.
pub fn insert_export(
    conn: &Connection,
    session_id: i64,
    export_path: &str,
    manifest_path: &str,
    manifest_hash: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO exports (import_session_id, export_path, manifest_path, manifest_hash,
                              status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'created', ?5)",
        params![
            session_id,
            export_path,
            manifest_path,
            manifest_hash,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts the archive-copy record with verify status `pending`.
pub fn insert_local_archive(
    conn: &Connection,
    export_id: i64,
    archive_path: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO local_archives (export_id, archive_path, verify_status, created_at)
         VALUES (?1, ?2, 'pending', ?3)",
        params![export_id, archive_path, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Records a successful verification: archive copy `verified`, export
/// `archived`. Both updates are guarded so each transition fires once.
pub fn record_verified(conn: &Connection, export_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE local_archives SET verify_status = 'verified'
         WHERE export_id = ?1 AND verify_status = 'pending'",
        params![export_id],
    )?;
    conn.execute(
        "UPDATE exports SET status = 'archived'
         WHERE export_id = ?1 AND status = 'created'",
        params![export_id],
    )?;
    Ok(())
}

/// Records a failed verification (or failed copy) with its error text.
/// The rows persist so the failure stays auditable.
pub fn record_verify_failed(
    conn: &Connection,
    export_id: i64,
    error: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE local_archives SET verify_status = 'failed', last_error = ?2
         WHERE export_id = ?1 AND verify_status = 'pending'",
        params![export_id, error],
    )?;
    conn.execute(
        "UPDATE exports SET status = 'failed'
         WHERE export_id = ?1 AND status = 'created'",
        params![export_id],
    )?;
    Ok(())
}

pub fn find_export(conn: &Connection, export_id: i64) -> Result<Option<ExportRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT export_id, import_session_id, export_path, manifest_path, manifest_hash,
                    status, created_at
             FROM exports WHERE export_id = ?1",
            params![export_id],
            ExportRow::from_row,
        )
        .optional()?)
}

pub fn find_local_archive(
    conn: &Connection,
    export_id: i64,
) -> Result<Option<LocalArchiveRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT archive_id, export_id, archive_path, verify_status, last_error, created_at
             FROM local_archives WHERE export_id = ?1",
            params![export_id],
            LocalArchiveRow::from_row,
        )
        .optional()?)
}

/// Appends a delivery record for an export. Returns its id.
pub fn record_delivery(
    conn: &Connection,
    export_id: i64,
    operator_id: &str,
    destination_path: &str,
    result: &str,
    error_message: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO export_deliveries (export_id, delivered_by, destination_path, result,
                                        error_message, delivered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            export_id,
            operator_id,
            destination_path,
            result,
            error_message,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
