//! Export pipeline: accepted media → verified, auditable package.
//!
//! Selects a session's accepted media, stages it under deterministic
//! names, packages it with a hashed manifest, copies the package to a
//! separate archive root, and verifies the copy bit-for-bit before the
//! export is marked trustworthy. Finished packages are never
//! overwritten; staging is cleaned up on every path.

pub mod error;
pub mod manifest;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, info_span, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::db::export_repo;
use crate::db::{decision_repo, job_repo, session_repo, Database};
use crate::hashing;
use crate::sanitize::sanitize_component;

pub use error::ExportError;
pub use manifest::{Manifest, ManifestDecision, ManifestFile};

/// Structured result of a completed (verified) export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub export_id: i64,
    pub package_path: PathBuf,
    pub archive_path: PathBuf,
    pub manifest_hash: String,
    pub file_count: usize,
}

pub struct ExportPipeline {
    db: Database,
    export_root: PathBuf,
    archive_root: PathBuf,
}

impl ExportPipeline {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        db: Database,
        export_root: P,
        archive_root: Q,
    ) -> Self {
        Self {
            db,
            export_root: export_root.as_ref().to_path_buf(),
            archive_root: archive_root.as_ref().to_path_buf(),
        }
    }

    /// Exports a session's accepted media, stamping the batch with the
    /// current time.
    pub fn export_session(&self, import_session_id: i64) -> Result<ExportOutcome, ExportError> {
        self.export_session_at(import_session_id, Utc::now())
    }

    /// Exports with an explicit batch timestamp. The timestamp is
    /// shared by every export filename and the manifest's
    /// `exported_at`, which makes packaging reproducible.
    pub fn export_session_at(
        &self,
        import_session_id: i64,
        exported_at: DateTime<Utc>,
    ) -> Result<ExportOutcome, ExportError> {
        let _span = info_span!("export", session = import_session_id).entered();

        // Resolve the session and its job.
        let (session, job) = self.db.with_tx(|tx| {
            let session = session_repo::find(tx, import_session_id)
                .map_err(ExportError::from)?
                .ok_or(ExportError::SessionNotFound(import_session_id))?;
            let job = job_repo::find(tx, &session.job_id)
                .map_err(ExportError::from)?
                .ok_or_else(|| ExportError::JobNotFound(session.job_id.clone()))?;
            Ok::<_, ExportError>((session, job))
        })?;

        // Select accepted media, ascending media id.
        let accepted = self
            .db
            .with_conn(|conn| decision_repo::accepted_for_session(conn, import_session_id))?;
        if accepted.is_empty() {
            return Err(ExportError::NothingToExport(import_session_id));
        }

        // The target path check here is advisory; it is re-run right
        // before the promote below.
        let package_name = format!(
            "{}_{}.zip",
            sanitize_component(&session.uut_serial),
            import_session_id
        );
        let package_path = self.export_root.join(&package_name);
        if package_path.exists() {
            return Err(ExportError::PackageExists(package_path));
        }

        std::fs::create_dir_all(&self.export_root)
            .map_err(|e| ExportError::io(&self.export_root, e))?;

        // Staging lives under the export root so the final rename stays
        // on one filesystem. The TempDir guard removes it on success,
        // error, and panic alike.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.export_root)
            .map_err(|e| ExportError::io(&self.export_root, e))?;

        let batch_stamp = exported_at.format("%Y%m%dT%H%M%S").to_string();
        let files = {
            let _step = info_span!("stage_media").entered();
            stage_accepted(
                staging.path(),
                &accepted,
                &session.uut_serial,
                &session.operator_id,
                &batch_stamp,
            )?
        };

        // Assemble and serialize the manifest; hash the exact bytes.
        let file_count = files.len();
        let manifest = Manifest {
            schema: manifest::MANIFEST_SCHEMA,
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            job_id: job.job_id,
            import_session_id,
            uut_serial: session.uut_serial.clone(),
            operator_id: session.operator_id.clone(),
            file_count,
            files,
        };
        let manifest_bytes = manifest.to_canonical_bytes()?;
        let manifest_hash = hashing::sha256_bytes(&manifest_bytes);

        // The sidecar is staged first and moved next to the package
        // after the promote, so a failed export leaves nothing behind.
        let sidecar_name = format!("{}.manifest.json", package_name.trim_end_matches(".zip"));
        let staged_sidecar = staging.path().join(&sidecar_name);
        std::fs::write(&staged_sidecar, &manifest_bytes)
            .map_err(|e| ExportError::io(&staged_sidecar, e))?;

        // Build the package inside staging, then promote by rename.
        let scratch_package = staging.path().join("package.zip");
        {
            let _step = info_span!("build_package").entered();
            build_package(&scratch_package, &manifest_bytes, staging.path(), &manifest.files)?;
        }

        if package_path.exists() {
            // Lost the race window between the advisory check and now.
            return Err(ExportError::PackageExists(package_path));
        }
        std::fs::rename(&scratch_package, &package_path)
            .map_err(|e| ExportError::io(&package_path, e))?;

        let manifest_path = package_path.with_extension("manifest.json");
        std::fs::rename(&staged_sidecar, &manifest_path)
            .map_err(|e| ExportError::io(&manifest_path, e))?;

        // Record the export, then archive and verify.
        let export_id = self.db.with_conn(|conn| {
            export_repo::insert_export(
                conn,
                import_session_id,
                &package_path.to_string_lossy(),
                &manifest_path.to_string_lossy(),
                &manifest_hash,
            )
        })?;

        let archive_path = {
            let _step = info_span!("archive").entered();
            let archive_path = self.copy_to_archive(export_id, &package_path, &package_name)?;
            self.verify_and_record(export_id, &package_path, &archive_path)?;
            archive_path
        };

        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directory: {}", e);
        }

        info!(
            "Exported session {} as {} ({} files, manifest {})",
            import_session_id,
            package_path.display(),
            file_count,
            manifest_hash
        );

        Ok(ExportOutcome {
            export_id,
            package_path,
            archive_path,
            manifest_hash,
            file_count,
        })
    }

    /// Copies the finished package into the archive root. The archive
    /// row is created first (verify status `pending`) so a failed copy
    /// is recorded, not dropped.
    fn copy_to_archive(
        &self,
        export_id: i64,
        package_path: &Path,
        package_name: &str,
    ) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.archive_root)
            .map_err(|e| ExportError::io(&self.archive_root, e))?;
        let archive_path = self.archive_root.join(package_name);

        self.db.with_conn(|conn| {
            export_repo::insert_local_archive(conn, export_id, &archive_path.to_string_lossy())
        })?;

        if let Err(e) = std::fs::copy(package_path, &archive_path) {
            let detail = format!("archive copy failed: {}", e);
            self.db
                .with_conn(|conn| export_repo::record_verify_failed(conn, export_id, &detail))?;
            return Err(ExportError::VerifyFailed { export_id, detail });
        }

        Ok(archive_path)
    }

    /// Independently re-hashes the package and its archive copy and
    /// records the outcome. A mismatch marks the archive `failed` and
    /// the export `failed`; the rows persist so the failure is
    /// auditable, and the error is still returned to the caller.
    fn verify_and_record(
        &self,
        export_id: i64,
        package_path: &Path,
        archive_path: &Path,
    ) -> Result<(), ExportError> {
        let hashes = hashing::sha256_file(package_path)
            .and_then(|package| hashing::sha256_file(archive_path).map(|copy| (package, copy)));

        let detail = match hashes {
            Ok((package_hash, copy_hash)) if package_hash == copy_hash => {
                self.db
                    .with_conn(|conn| export_repo::record_verified(conn, export_id))?;
                debug!("Archive copy verified ({})", package_hash);
                return Ok(());
            }
            Ok((package_hash, copy_hash)) => format!(
                "hash mismatch: package {}, archive copy {}",
                package_hash, copy_hash
            ),
            Err(e) => format!("hashing failed: {}", e),
        };

        self.db
            .with_conn(|conn| export_repo::record_verify_failed(conn, export_id, &detail))?;
        Err(ExportError::VerifyFailed { export_id, detail })
    }
}

/// Copies each accepted media file into staging under its export name,
/// hashing and measuring as it goes. A missing source aborts the whole
/// export (the staging guard cleans up).
fn stage_accepted(
    staging: &Path,
    accepted: &[(
        crate::db::media_repo::MediaRow,
        crate::db::decision_repo::DecisionRow,
    )],
    uut_serial: &str,
    operator_id: &str,
    batch_stamp: &str,
) -> Result<Vec<ManifestFile>, ExportError> {
    let mut files = Vec::with_capacity(accepted.len());

    for (index, (media, decision)) in accepted.iter().enumerate() {
        let seq = (index + 1) as u32;
        let source = PathBuf::from(&media.local_path);
        if !source.exists() {
            return Err(ExportError::MissingSource {
                media_id: media.media_id,
                path: source,
            });
        }

        let export_name = export_file_name(uut_serial, operator_id, batch_stamp, seq, &source);
        let staged = staging.join(&export_name);

        std::fs::copy(&source, &staged).map_err(|e| ExportError::io(&staged, e))?;
        let size_bytes = std::fs::metadata(&staged)
            .map_err(|e| ExportError::io(&staged, e))?
            .len();
        let sha256 = hashing::sha256_file(&staged).map_err(|e| ExportError::io(&staged, e))?;

        files.push(ManifestFile {
            seq,
            export_name,
            source_vendor_id: media.vendor_id.clone(),
            source_local_path: media.local_path.clone(),
            size_bytes,
            sha256,
            captured_at: media.captured_at.clone(),
            decision: ManifestDecision {
                status: decision.status.clone(),
                reason: decision.reason.clone(),
                decided_at: decision.decided_at.clone(),
                notes: decision.notes.clone(),
            },
        });
    }

    Ok(files)
}

/// Deterministic export filename:
/// `UUT_<serial>_OP<operator>_<YYYYMMDDTHHMMSS>_<seq:3>.<ext>`, with
/// serial and operator sanitized and the source extension preserved
/// (a source without an extension gets none).
fn export_file_name(
    uut_serial: &str,
    operator_id: &str,
    batch_stamp: &str,
    seq: u32,
    source: &Path,
) -> String {
    let base = format!(
        "UUT_{}_OP{}_{}_{:03}",
        sanitize_component(uut_serial),
        sanitize_component(operator_id),
        batch_stamp,
        seq
    );
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", base, ext),
        None => base,
    }
}

/// Writes the package: the manifest at the root, then every staged
/// file under `photos/`, in lexicographic order of staged filename.
fn build_package(
    package_path: &Path,
    manifest_bytes: &[u8],
    staging: &Path,
    files: &[ManifestFile],
) -> Result<(), ExportError> {
    let file = File::create(package_path).map_err(|e| ExportError::io(package_path, e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(manifest::MANIFEST_ENTRY, options)?;
    writer
        .write_all(manifest_bytes)
        .map_err(|e| ExportError::io(package_path, e))?;

    let mut names: Vec<&str> = files.iter().map(|f| f.export_name.as_str()).collect();
    names.sort_unstable();

    for name in names {
        let staged = staging.join(name);
        writer.start_file(format!("{}/{}", manifest::PHOTOS_PREFIX, name), options)?;
        let mut source = File::open(&staged).map_err(|e| ExportError::io(&staged, e))?;
        std::io::copy(&mut source, &mut writer).map_err(|e| ExportError::io(&staged, e))?;
    }

    writer.finish()?;
    Ok(())
}
