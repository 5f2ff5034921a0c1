//! The export manifest document.
//!
//! Describes every file inside an export package. Serialization is
//! deterministic: struct field order is fixed and `serde_json` emits it
//! verbatim, so equal inputs produce byte-identical manifests.

use serde::Serialize;

/// Manifest schema tag, bumped on breaking layout changes.
pub const MANIFEST_SCHEMA: &str = "ipds_manifest_v1";

/// Name of the manifest entry at the package root.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Prefix under which staged photos live inside the package.
pub const PHOTOS_PREFIX: &str = "photos";

/// The decision that admitted a file into the export.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestDecision {
    pub status: String,
    pub reason: Option<String>,
    pub decided_at: String,
    pub notes: Option<String>,
}

/// One packaged file.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestFile {
    pub seq: u32,
    pub export_name: String,
    pub source_vendor_id: String,
    pub source_local_path: String,
    pub size_bytes: u64,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    pub decision: ManifestDecision,
}

/// The manifest document (JSON, UTF-8).
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema: &'static str,
    /// ISO-8601 UTC, second precision.
    pub exported_at: String,
    pub job_id: String,
    pub import_session_id: i64,
    pub uut_serial: String,
    pub operator_id: String,
    pub file_count: usize,
    pub files: Vec<ManifestFile>,
}

impl Manifest {
    /// Serializes the manifest to its canonical byte form. The hash of
    /// these bytes is the manifest hash recorded on the export.
    pub fn to_canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
