//! Atomic, size-validated file writes.
//!
//! A downloaded payload is written to a `.part` sidecar next to the
//! destination, its size is checked against the size the device
//! reported, and only a fully validated sidecar is renamed into place.
//! An observer of the destination path sees either nothing or a
//! complete file, never a partial one.

use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::hashing;

/// A completed atomic write: the final path and the content digest of
/// what landed there.
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub sha256: String,
}

/// Writes `data` to `dest` via a `.part` sidecar.
///
/// The sidecar is deleted and `StorageError::SizeMismatch` returned when
/// the written size differs from `expected_size`; the destination (and
/// any prior file at it) is untouched in that case. Parent directories
/// are created as needed.
pub fn write_atomic(dest: &Path, data: &[u8], expected_size: u64) -> Result<WrittenFile, StorageError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let tmp = part_path(dest);

    std::fs::write(&tmp, data).map_err(|e| StorageError::WriteFile {
        path: tmp.clone(),
        source: e,
    })?;

    // Re-stat the sidecar rather than trusting the buffer length, so a
    // short write surfaces here and not downstream.
    let actual = std::fs::metadata(&tmp)
        .map_err(|e| StorageError::WriteFile {
            path: tmp.clone(),
            source: e,
        })?
        .len();

    if actual != expected_size {
        let _ = std::fs::remove_file(&tmp);
        return Err(StorageError::SizeMismatch {
            path: dest.to_path_buf(),
            expected: expected_size,
            actual,
        });
    }

    let sha256 = hashing::sha256_file(&tmp).map_err(|e| StorageError::HashFile {
        path: tmp.clone(),
        source: e,
    })?;

    std::fs::rename(&tmp, dest).map_err(|e| StorageError::Rename {
        from: tmp.clone(),
        to: dest.to_path_buf(),
        source: e,
    })?;

    Ok(WrittenFile {
        path: dest.to_path_buf(),
        sha256,
    })
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
