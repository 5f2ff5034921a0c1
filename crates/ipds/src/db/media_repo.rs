//! Media repository — idempotent insert keyed by (adapter, vendor_id).
//!
//! Re-ingesting a vendor item the store already knows is a no-op that
//! returns the pre-existing row, so ingestion runs are safe to repeat.

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::error::DatabaseError;

/// A media row.
#[derive(Debug, Clone)]
pub struct MediaRow {
    pub media_id: i64,
    pub import_session_id: i64,
    pub adapter: String,
    pub vendor_id: String,
    pub filename: Option<String>,
    pub size_bytes: i64,
    pub captured_at: Option<String>,
    pub imported_at: String,
    pub local_path: String,
}

impl MediaRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            media_id: row.get("media_id")?,
            import_session_id: row.get("import_session_id")?,
            adapter: row.get("adapter")?,
            vendor_id: row.get("vendor_id")?,
            filename: row.get("filename")?,
            size_bytes: row.get("size_bytes")?,
            captured_at: row.get("captured_at")?,
            imported_at: row.get("imported_at")?,
            local_path: row.get("local_path")?,
        })
    }
}

const SELECT_COLUMNS: &str = "media_id, import_session_id, adapter, vendor_id, filename,
                              size_bytes, captured_at, imported_at, local_path";

/// Fields for a media insert. `imported_at` is stamped by the repo.
#[derive(Debug, Clone)]
pub struct NewMedia<'a> {
    pub import_session_id: i64,
    pub adapter: &'a str,
    pub vendor_id: &'a str,
    pub filename: Option<&'a str>,
    pub size_bytes: i64,
    pub captured_at: Option<String>,
    pub local_path: &'a str,
}

/// Inserts a media row unless its (adapter, vendor_id) key already
/// exists, in which case the pre-existing row is returned untouched.
///
/// The bool is true when a new row was inserted. Uses a native
/// `ON CONFLICT DO NOTHING` upsert rather than error-driven control
/// flow; any other persistence error propagates.
pub fn insert_idempotent(
    conn: &Connection,
    new: &NewMedia<'_>,
) -> Result<(MediaRow, bool), DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO media (import_session_id, adapter, vendor_id, filename, size_bytes,
                            captured_at, imported_at, local_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (adapter, vendor_id) DO NOTHING",
        params![
            new.import_session_id,
            new.adapter,
            new.vendor_id,
            new.filename,
            new.size_bytes,
            new.captured_at,
            Utc::now().to_rfc3339(),
            new.local_path,
        ],
    )?;

    if inserted == 1 {
        let row = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM media WHERE media_id = ?1"),
            params![conn.last_insert_rowid()],
            MediaRow::from_row,
        )?;
        return Ok((row, true));
    }

    // Conflict path: the key exists, hand back the stored row.
    let existing = find_by_vendor_key(conn, new.adapter, new.vendor_id)?
        .ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
    Ok((existing, false))
}

/// Looks up a media row by its global dedup key.
pub fn find_by_vendor_key(
    conn: &Connection,
    adapter: &str,
    vendor_id: &str,
) -> Result<Option<MediaRow>, DatabaseError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM media WHERE adapter = ?1 AND vendor_id = ?2"),
            params![adapter, vendor_id],
            MediaRow::from_row,
        )
        .optional()?)
}

pub fn find(conn: &Connection, media_id: i64) -> Result<Option<MediaRow>, DatabaseError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM media WHERE media_id = ?1"),
            params![media_id],
            MediaRow::from_row,
        )
        .optional()?)
}

/// All media of a session, ascending media id.
pub fn list_for_session(
    conn: &Connection,
    session_id: i64,
) -> Result<Vec<MediaRow>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM media
         WHERE import_session_id = ?1 ORDER BY media_id ASC"
    ))?;
    let rows = stmt
        .query_map(params![session_id], MediaRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Of `media_ids`, returns those that belong to `session_id`, reading
/// current stored state.
pub fn owned_ids(
    conn: &Connection,
    session_id: i64,
    media_ids: &[i64],
) -> Result<Vec<i64>, DatabaseError> {
    if media_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = media_ids
        .iter()
        .enumerate()
        .map(|(i, _)| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT media_id FROM media
         WHERE import_session_id = ?1 AND media_id IN ({placeholders})"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_iter = std::iter::once(session_id).chain(media_ids.iter().copied());
    let rows = stmt
        .query_map(params_from_iter(params_iter), |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
