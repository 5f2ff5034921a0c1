//! Ingestion pipeline: device → local storage → media records.
//!
//! Best-effort over the listed set: a failing item is recorded in the
//! summary and the run continues. Connect failure aborts before any
//! listing; after a successful connect the device is released on every
//! exit path.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::db::media_repo::{self, NewMedia};
use crate::db::{session_repo, Database, DatabaseError};
use crate::device::{CaptureDevice, DeviceError, MediaItem};
use crate::error::StorageError;
use crate::storage;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Device connect failed: {0}")]
    Connect(#[source] DeviceError),

    #[error("Failed to list media: {0}")]
    List(#[source] DeviceError),

    #[error("Import session not found: {0}")]
    SessionNotFound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Counts for one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub listed: usize,
    pub skipped_known: usize,
    pub downloaded: usize,
    pub inserted: usize,
    pub failed: usize,
}

/// What happened to one listed item.
#[derive(Debug)]
enum ItemOutcome {
    /// Downloaded, written, and recorded as a new media row.
    Inserted { media_id: i64 },
    /// Dedup key already known before download; nothing transferred.
    SkippedKnown,
    /// Downloaded and written, but another run recorded the row first.
    AlreadyRecorded,
    /// The item failed; the run continues.
    Failed { vendor_id: String, reason: String },
}

/// Runs one ingestion pass for `import_session_id`, pulling every
/// listed item into `<incoming_root>/session_<id>/`.
pub async fn run_ingestion(
    db: &Database,
    device: &mut dyn CaptureDevice,
    import_session_id: i64,
    incoming_root: &Path,
) -> Result<IngestSummary, IngestError> {
    let span = info_span!(
        "ingest",
        session = import_session_id,
        adapter = device.name()
    );

    async move {
        db.with_conn(|conn| session_repo::find(conn, import_session_id))?
            .ok_or(IngestError::SessionNotFound(import_session_id))?;

        device.connect().await.map_err(IngestError::Connect)?;
        debug!("Device health: {:?}", device.health());

        let result = ingest_connected(db, &*device, import_session_id, incoming_root).await;

        // Always release the device, including when listing failed.
        if let Err(e) = device.disconnect().await {
            warn!("Device disconnect failed: {}", e);
        }

        result
    }
    .instrument(span)
    .await
}

async fn ingest_connected(
    db: &Database,
    device: &dyn CaptureDevice,
    import_session_id: i64,
    incoming_root: &Path,
) -> Result<IngestSummary, IngestError> {
    let session_dir = incoming_root.join(format!("session_{}", import_session_id));
    std::fs::create_dir_all(&session_dir).map_err(|e| StorageError::CreateDirectory {
        path: session_dir.clone(),
        source: e,
    })?;

    let items = device.list_media().await.map_err(IngestError::List)?;

    let mut summary = IngestSummary {
        listed: items.len(),
        ..IngestSummary::default()
    };

    for item in &items {
        match ingest_item(db, device, import_session_id, &session_dir, item).await {
            ItemOutcome::Inserted { media_id } => {
                debug!("Ingested '{}' as media {}", item.vendor_id, media_id);
                summary.downloaded += 1;
                summary.inserted += 1;
            }
            ItemOutcome::AlreadyRecorded => {
                debug!("'{}' was recorded by a concurrent run", item.vendor_id);
                summary.downloaded += 1;
            }
            ItemOutcome::SkippedKnown => {
                summary.skipped_known += 1;
            }
            ItemOutcome::Failed { vendor_id, reason } => {
                warn!("Item '{}' failed: {}", vendor_id, reason);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Ingestion finished: {} listed, {} skipped, {} downloaded, {} inserted, {} failed",
        summary.listed, summary.skipped_known, summary.downloaded, summary.inserted, summary.failed
    );

    Ok(summary)
}

/// Processes one listed item. Failures become `ItemOutcome::Failed`
/// with their reason; they never abort the surrounding run.
async fn ingest_item(
    db: &Database,
    device: &dyn CaptureDevice,
    import_session_id: i64,
    session_dir: &Path,
    item: &MediaItem,
) -> ItemOutcome {
    let failed = |reason: String| ItemOutcome::Failed {
        vendor_id: item.vendor_id.clone(),
        reason,
    };

    // Dedup against current stored state, not a cached listing.
    match db.with_conn(|conn| media_repo::find_by_vendor_key(conn, device.name(), &item.vendor_id))
    {
        Ok(Some(_)) => return ItemOutcome::SkippedKnown,
        Ok(None) => {}
        Err(e) => return failed(e.to_string()),
    }

    let data = match device.download_media(item).await {
        Ok(data) => data,
        Err(e) => return failed(e.to_string()),
    };

    let dest = session_dir.join(&item.filename);
    let written = match storage::write_atomic(&dest, &data, item.size_bytes) {
        Ok(written) => written,
        Err(e) => return failed(e.to_string()),
    };

    let local_path = written.path.to_string_lossy();
    let new = NewMedia {
        import_session_id,
        adapter: device.name(),
        vendor_id: &item.vendor_id,
        filename: Some(&item.filename),
        size_bytes: item.size_bytes as i64,
        captured_at: item.captured_at.map(|t| t.to_rfc3339()),
        local_path: &local_path,
    };

    match db.with_conn(|conn| media_repo::insert_idempotent(conn, &new)) {
        Ok((row, true)) => ItemOutcome::Inserted {
            media_id: row.media_id,
        },
        Ok((_, false)) => ItemOutcome::AlreadyRecorded,
        Err(e) => failed(e.to_string()),
    }
}

/// Returns the storage directory for a session's incoming media.
pub fn session_dir(incoming_root: &Path, import_session_id: i64) -> PathBuf {
    incoming_root.join(format!("session_{}", import_session_id))
}
