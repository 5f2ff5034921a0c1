//! Capture device backed by a mounted directory.
//!
//! Covers cards and bodies that present as a filesystem (SD card in a
//! reader, USB mass-storage mode). The mount root plays the role of the
//! device; relative paths under it are the vendor ids.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use walkdir::WalkDir;

use super::error::{DeviceError, Result};
use super::{CaptureDevice, DeviceHealth, MediaItem};

const ADAPTER_NAME: &str = "directory";

/// Extensions treated as captured photos. Capture volumes carry sidecar
/// files (indexes, thumbnails) that must not enter the pipeline.
const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

pub struct DirectoryDevice {
    root: PathBuf,
    connected: bool,
    detail: String,
}

impl DirectoryDevice {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            connected: false,
            detail: "Not connected".to_string(),
        }
    }

    fn require_connected(&self) -> Result<()> {
        if !self.connected {
            return Err(DeviceError::NotConnected(ADAPTER_NAME.to_string()));
        }
        Ok(())
    }

    fn is_photo(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let lower = e.to_ascii_lowercase();
                PHOTO_EXTENSIONS.iter().any(|p| *p == lower)
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl CaptureDevice for DirectoryDevice {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn connect(&mut self) -> Result<()> {
        // Probe with a real read so an unreadable mount fails here, not
        // mid-listing.
        match std::fs::read_dir(&self.root) {
            Ok(_) => {
                self.connected = true;
                self.detail = format!("Connected to {}", self.root.display());
                Ok(())
            }
            Err(e) => {
                self.connected = false;
                self.detail = format!("Connect failed: {}", e);
                Err(DeviceError::ConnectionFailed(format!(
                    "cannot read capture volume '{}': {}. Is the card mounted?",
                    self.root.display(),
                    e
                )))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.detail = "Disconnected".to_string();
        Ok(())
    }

    fn health(&self) -> DeviceHealth {
        DeviceHealth {
            adapter: ADAPTER_NAME.to_string(),
            connected: self.connected,
            detail: self.detail.clone(),
        }
    }

    async fn list_media(&self) -> Result<Vec<MediaItem>> {
        self.require_connected()?;

        let mut items = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| DeviceError::ListFailed(e.to_string()))?;
            if !entry.file_type().is_file() || !Self::is_photo(entry.path()) {
                continue;
            }

            let meta = entry
                .metadata()
                .map_err(|e| DeviceError::ListFailed(e.to_string()))?;
            let captured_at = meta.modified().ok().map(DateTime::<Utc>::from);

            let vendor_id = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            let filename = entry.file_name().to_string_lossy().into_owned();

            items.push(MediaItem {
                vendor_id,
                filename,
                size_bytes: meta.len(),
                captured_at,
            });
        }

        debug!("Listed {} photos under {}", items.len(), self.root.display());
        Ok(items)
    }

    async fn download_media(&self, item: &MediaItem) -> Result<Vec<u8>> {
        self.require_connected()?;

        tokio::fs::read(self.root.join(&item.vendor_id))
            .await
            .map_err(|e| DeviceError::DownloadFailed {
                vendor_id: item.vendor_id.clone(),
                detail: e.to_string(),
            })
    }
}
