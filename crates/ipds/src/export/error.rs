//! Export pipeline error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;

/// Errors from export packaging and archival. Every failure aborts the
/// whole export; staging is cleaned up on all paths.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Import session not found: {0}")]
    SessionNotFound(i64),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Nothing to export: session {0} has no accepted media")]
    NothingToExport(i64),

    /// A finished package is never overwritten.
    #[error("Export package already exists: {}", .0.display())]
    PackageExists(PathBuf),

    #[error("Source file missing for media {media_id}: {}", .path.display())]
    MissingSource { media_id: i64, path: PathBuf },

    #[error("IO error for '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Failed to build package: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The archive copy does not match the package it was copied from,
    /// or could not be produced. Recorded on the export before this
    /// error is returned.
    #[error("Archive verification failed for export {export_id}: {detail}")]
    VerifyFailed { export_id: i64, detail: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ExportError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
