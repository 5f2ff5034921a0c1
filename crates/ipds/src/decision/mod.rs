//! Decision service: accept/reject enforcement at the session boundary.
//!
//! The presentation layer sees exactly two calls: list a session's
//! media with decision state, and apply a bulk decision to a set of
//! media ids. Only media belonging to the claimed session can be
//! decided through it; violations are rejected before any write.

use std::collections::HashSet;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info_span};

use crate::db::{decision_repo, media_repo, session_repo, Database, DatabaseError};

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("Invalid decision status '{0}'. Must be 'accepted' or 'rejected'.")]
    InvalidStatus(String),

    #[error("Import session not found: {0}")]
    SessionNotFound(i64),

    #[error("Media ids not in session {session_id}: {media_ids:?}")]
    ForeignMedia {
        session_id: i64,
        media_ids: Vec<i64>,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A decision verdict for a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStatus {
    Accepted,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Accepted => "accepted",
            DecisionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for DecisionStatus {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(DecisionStatus::Accepted),
            "rejected" => Ok(DecisionStatus::Rejected),
            other => Err(DecisionError::InvalidStatus(other.to_string())),
        }
    }
}

/// One media item with its decision state, as rendered to the operator.
#[derive(Debug, Clone)]
pub struct MediaDecisionView {
    pub media_id: i64,
    pub filename: Option<String>,
    pub local_path: String,
    pub size_bytes: i64,
    pub captured_at: Option<String>,
    pub decision_status: Option<String>,
    pub decision_reason: Option<String>,
    pub decision_notes: Option<String>,
}

pub struct DecisionService {
    db: Database,
}

impl DecisionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Lists a session's media with decision state, ascending media id.
    pub fn list_media_for_session(
        &self,
        import_session_id: i64,
    ) -> Result<Vec<MediaDecisionView>, DecisionError> {
        session_exists(&self.db, import_session_id)?;

        let rows = self
            .db
            .with_conn(|conn| decision_repo::media_with_decisions(conn, import_session_id))?;

        Ok(rows
            .into_iter()
            .map(|(media, decision)| MediaDecisionView {
                media_id: media.media_id,
                filename: media.filename,
                local_path: media.local_path,
                size_bytes: media.size_bytes,
                captured_at: media.captured_at,
                decision_status: decision.as_ref().map(|d| d.status.clone()),
                decision_reason: decision.as_ref().and_then(|d| d.reason.clone()),
                decision_notes: decision.and_then(|d| d.notes),
            })
            .collect())
    }

    /// Applies one decision to a set of media ids within a session.
    ///
    /// `raw_ids` are the values the presentation boundary collected:
    /// they are trimmed, parsed, de-duplicated (first-seen order kept)
    /// and checked for ownership before anything is written. The
    /// ownership check fails closed and reports every offending id.
    /// All upserts run in one transaction: a failure writes nothing.
    /// Returns the number of media items updated; zero ids is a no-op.
    pub fn bulk_set_decisions(
        &self,
        import_session_id: i64,
        raw_ids: &[String],
        status: &str,
        reason: Option<&str>,
        notes: Option<&str>,
    ) -> Result<usize, DecisionError> {
        let _span = info_span!("bulk_decide", session = import_session_id).entered();

        let status = DecisionStatus::from_str(status)?;

        let media_ids = normalize_ids(raw_ids);
        if media_ids.is_empty() {
            return Ok(0);
        }

        self.db.with_tx(|tx| {
            session_repo::find(tx, import_session_id)
                .map_err(DecisionError::from)?
                .ok_or(DecisionError::SessionNotFound(import_session_id))?;

            let owned: HashSet<i64> = media_repo::owned_ids(tx, import_session_id, &media_ids)
                .map_err(DecisionError::from)?
                .into_iter()
                .collect();

            let foreign: Vec<i64> = media_ids
                .iter()
                .copied()
                .filter(|id| !owned.contains(id))
                .collect();
            if !foreign.is_empty() {
                return Err(DecisionError::ForeignMedia {
                    session_id: import_session_id,
                    media_ids: foreign,
                });
            }

            for media_id in &media_ids {
                decision_repo::upsert(tx, *media_id, status.as_str(), reason, notes)
                    .map_err(DecisionError::from)?;
            }

            debug!("Decided {} items -> {}", media_ids.len(), status.as_str());
            Ok(media_ids.len())
        })
    }
}

fn session_exists(db: &Database, import_session_id: i64) -> Result<(), DecisionError> {
    db.with_conn(|conn| session_repo::find(conn, import_session_id))?
        .ok_or(DecisionError::SessionNotFound(import_session_id))?;
    Ok(())
}

/// Trims, parses, and de-duplicates raw id strings, keeping first-seen
/// order. Empty and non-numeric entries are dropped.
fn normalize_ids(raw_ids: &[String]) -> Vec<i64> {
    let mut seen = HashSet::new();
    raw_ids
        .iter()
        .filter_map(|raw| raw.trim().parse::<i64>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{job_repo, operator_repo};
    use rusqlite::Connection;

    fn seed_two_sessions(db: &Database) -> (i64, Vec<i64>, i64, Vec<i64>) {
        db.with_conn(|conn| {
            job_repo::insert(conn, "JOB-1")?;
            operator_repo::insert(conn, "op1", "Alex", None)?;
            let session_a = session_repo::open(conn, "JOB-1", "op1", "SN-A", "initial")?;
            let session_b = session_repo::open(conn, "JOB-1", "op1", "SN-B", "initial")?;

            let ids_a = insert_media(conn, session_a, &["a1.jpg", "a2.jpg"]);
            let ids_b = insert_media(conn, session_b, &["b1.jpg"]);
            Ok((session_a, ids_a, session_b, ids_b))
        })
        .unwrap()
    }

    fn insert_media(conn: &Connection, session: i64, vendors: &[&str]) -> Vec<i64> {
        vendors
            .iter()
            .map(|vendor| {
                let (row, _) = media_repo::insert_idempotent(
                    conn,
                    &media_repo::NewMedia {
                        import_session_id: session,
                        adapter: "directory",
                        vendor_id: vendor,
                        filename: Some(vendor),
                        size_bytes: 1,
                        captured_at: None,
                        local_path: "/data/x",
                    },
                )
                .unwrap();
                row.media_id
            })
            .collect()
    }

    fn as_raw(ids: &[i64]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_normalize_ids() {
        let raw = vec![
            "3".to_string(),
            " 1 ".to_string(),
            "".to_string(),
            "x".to_string(),
            "3".to_string(),
            "2".to_string(),
        ];
        assert_eq!(normalize_ids(&raw), vec![3, 1, 2]);
    }

    #[test]
    fn test_bulk_accept() {
        let db = Database::open_in_memory().unwrap();
        let (session_a, ids_a, _, _) = seed_two_sessions(&db);
        let service = DecisionService::new(db.clone());

        let count = service
            .bulk_set_decisions(session_a, &as_raw(&ids_a), "accepted", None, Some("ok"))
            .unwrap();
        assert_eq!(count, 2);

        let views = service.list_media_for_session(session_a).unwrap();
        assert!(views
            .iter()
            .all(|v| v.decision_status.as_deref() == Some("accepted")));
    }

    #[test]
    fn test_invalid_status_rejected() {
        let db = Database::open_in_memory().unwrap();
        let (session_a, ids_a, _, _) = seed_two_sessions(&db);
        let service = DecisionService::new(db);

        let err = service
            .bulk_set_decisions(session_a, &as_raw(&ids_a), "maybe", None, None)
            .unwrap_err();
        assert!(matches!(err, DecisionError::InvalidStatus(_)));
    }

    #[test]
    fn test_unknown_session_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed_two_sessions(&db);
        let service = DecisionService::new(db);

        let err = service
            .bulk_set_decisions(999, &["1".to_string()], "accepted", None, None)
            .unwrap_err();
        assert!(matches!(err, DecisionError::SessionNotFound(999)));
    }

    #[test]
    fn test_foreign_media_rejected_all_or_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (session_a, ids_a, _, ids_b) = seed_two_sessions(&db);
        let service = DecisionService::new(db.clone());

        // One id from session A, one from session B.
        let raw = as_raw(&[ids_a[0], ids_b[0]]);
        let err = service
            .bulk_set_decisions(session_a, &raw, "rejected", Some("wrong uut"), None)
            .unwrap_err();

        match err {
            DecisionError::ForeignMedia {
                session_id,
                media_ids,
            } => {
                assert_eq!(session_id, session_a);
                assert_eq!(media_ids, vec![ids_b[0]]);
            }
            other => panic!("Expected ForeignMedia, got {:?}", other),
        }

        // Nothing was written, not even for the valid id.
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM decisions", [], |r| r.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_foreign_media_reports_all_offenders() {
        let db = Database::open_in_memory().unwrap();
        let (session_a, _, _, ids_b) = seed_two_sessions(&db);
        let service = DecisionService::new(db);

        let raw = as_raw(&[ids_b[0], 424242]);
        let err = service
            .bulk_set_decisions(session_a, &raw, "accepted", None, None)
            .unwrap_err();

        match err {
            DecisionError::ForeignMedia { media_ids, .. } => {
                assert_eq!(media_ids, vec![ids_b[0], 424242]);
            }
            other => panic!("Expected ForeignMedia, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_ids_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let (session_a, _, _, _) = seed_two_sessions(&db);
        let service = DecisionService::new(db);

        let count = service
            .bulk_set_decisions(
                session_a,
                &["".to_string(), "junk".to_string()],
                "accepted",
                None,
                None,
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_redecide_overwrites() {
        let db = Database::open_in_memory().unwrap();
        let (session_a, ids_a, _, _) = seed_two_sessions(&db);
        let service = DecisionService::new(db);

        service
            .bulk_set_decisions(session_a, &as_raw(&ids_a), "rejected", Some("blur"), None)
            .unwrap();
        service
            .bulk_set_decisions(session_a, &as_raw(&[ids_a[0]]), "accepted", None, None)
            .unwrap();

        let views = service.list_media_for_session(session_a).unwrap();
        assert_eq!(views[0].decision_status.as_deref(), Some("accepted"));
        assert_eq!(views[0].decision_reason, None);
        assert_eq!(views[1].decision_status.as_deref(), Some("rejected"));
    }

    #[test]
    fn test_list_unknown_session() {
        let db = Database::open_in_memory().unwrap();
        let service = DecisionService::new(db);
        assert!(matches!(
            service.list_media_for_session(7),
            Err(DecisionError::SessionNotFound(7))
        ));
    }
}
