//! Decision repository — at most one decision per media item.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::DatabaseError;
use super::media_repo::MediaRow;

/// A decision row.
#[derive(Debug, Clone)]
pub struct DecisionRow {
    pub decision_id: i64,
    pub media_id: i64,
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub decided_at: String,
}

impl DecisionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            decision_id: row.get("decision_id")?,
            media_id: row.get("media_id")?,
            status: row.get("status")?,
            reason: row.get("reason")?,
            notes: row.get("notes")?,
            decided_at: row.get("decided_at")?,
        })
    }
}

/// Creates or overwrites the decision for a media item. A native
/// `ON CONFLICT DO UPDATE` upsert: the `UNIQUE (media_id)` constraint
/// keeps one row per item, the latest write wins.
pub fn upsert(
    conn: &Connection,
    media_id: i64,
    status: &str,
    reason: Option<&str>,
    notes: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO decisions (media_id, status, reason, notes, decided_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (media_id) DO UPDATE SET
             status = excluded.status,
             reason = excluded.reason,
             notes = excluded.notes,
             decided_at = excluded.decided_at",
        params![media_id, status, reason, notes, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn find_for_media(
    conn: &Connection,
    media_id: i64,
) -> Result<Option<DecisionRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT decision_id, media_id, status, reason, notes, decided_at
             FROM decisions WHERE media_id = ?1",
            params![media_id],
            DecisionRow::from_row,
        )
        .optional()?)
}

/// A session's media joined with its decision, if any. Ascending media
/// id — the listing the presentation layer renders.
pub fn media_with_decisions(
    conn: &Connection,
    session_id: i64,
) -> Result<Vec<(MediaRow, Option<DecisionRow>)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT m.media_id, m.import_session_id, m.adapter, m.vendor_id, m.filename,
                m.size_bytes, m.captured_at, m.imported_at, m.local_path,
                d.decision_id, d.status, d.reason, d.notes, d.decided_at
         FROM media m
         LEFT JOIN decisions d ON d.media_id = m.media_id
         WHERE m.import_session_id = ?1
         ORDER BY m.media_id ASC",
    )?;

    let rows = stmt
        .query_map(params![session_id], |row| {
            let media = MediaRow {
                media_id: row.get("media_id")?,
                import_session_id: row.get("import_session_id")?,
                adapter: row.get("adapter")?,
                vendor_id: row.get("vendor_id")?,
                filename: row.get("filename")?,
                size_bytes: row.get("size_bytes")?,
                captured_at: row.get("captured_at")?,
                imported_at: row.get("imported_at")?,
                local_path: row.get("local_path")?,
            };
            let decision = match row.get::<_, Option<i64>>("decision_id")? {
                Some(decision_id) => Some(DecisionRow {
                    decision_id,
                    media_id: media.media_id,
                    status: row.get("status")?,
                    reason: row.get("reason")?,
                    notes: row.get("notes")?,
                    decided_at: row.get("decided_at")?,
                }),
                None => None,
            };
            Ok((media, decision))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The accepted media of a session with their decisions, ascending
/// media id — the export pipeline's selection query.
pub fn accepted_for_session(
    conn: &Connection,
    session_id: i64,
) -> Result<Vec<(MediaRow, DecisionRow)>, DatabaseError> {
    let rows = media_with_decisions(conn, session_id)?
        .into_iter()
        .filter_map(|(media, decision)| match decision {
            Some(d) if d.status == "accepted" => Some((media, d)),
            _ => None,
        })
        .collect();
    Ok(rows)
}
