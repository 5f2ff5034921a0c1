//! Capability contract for media capture devices.
//!
//! A device is anything that can enumerate and hand over captured
//! media: a camera over Wi-Fi, an SD card mounted as a filesystem, a
//! tethered USB body. The core consumes only this contract; new device
//! types are new implementations selected by configuration, not an
//! inheritance hierarchy.

mod directory;
pub mod error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::DeviceConfig;
use crate::error::ConfigError;

pub use directory::DirectoryDevice;
pub use error::DeviceError;

/// One media item as enumerated by a device.
///
/// `vendor_id` is the device's own identifier for the item and forms
/// half of the global dedup key together with the adapter name.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub vendor_id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Connection status snapshot for logging and operator display.
#[derive(Debug, Clone)]
pub struct DeviceHealth {
    pub adapter: String,
    pub connected: bool,
    pub detail: String,
}

/// The source device capability contract.
///
/// `connect` fails fast with a diagnostic error when the device is
/// unreachable. `disconnect` is idempotent: safe to call repeatedly and
/// after a failed connect. `list_media` returns an ordered collection;
/// `download_media` transfers the raw bytes of one listed item.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Adapter name, used as half of the media dedup key.
    fn name(&self) -> &str;

    async fn connect(&mut self) -> error::Result<()>;

    async fn disconnect(&mut self) -> error::Result<()>;

    fn health(&self) -> DeviceHealth;

    async fn list_media(&self) -> error::Result<Vec<MediaItem>>;

    async fn download_media(&self, item: &MediaItem) -> error::Result<Vec<u8>>;
}

/// Builds the device selected by configuration.
pub fn from_config(config: &DeviceConfig) -> Result<Box<dyn CaptureDevice>, ConfigError> {
    match config.kind.as_str() {
        "directory" => {
            let root = config.root.clone().ok_or_else(|| ConfigError::Validation {
                message: "device kind 'directory' requires a 'root' path".to_string(),
            })?;
            Ok(Box::new(DirectoryDevice::new(root)))
        }
        other => Err(ConfigError::UnknownDevice(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_config_directory() {
        let config = DeviceConfig {
            kind: "directory".to_string(),
            root: Some(PathBuf::from("/mnt/dcim")),
        };
        let device = from_config(&config).unwrap();
        assert_eq!(device.name(), "directory");
    }

    #[test]
    fn test_from_config_directory_requires_root() {
        let config = DeviceConfig {
            kind: "directory".to_string(),
            root: None,
        };
        assert!(matches!(
            from_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_from_config_unknown_kind() {
        let config = DeviceConfig {
            kind: "carrier-pigeon".to_string(),
            root: None,
        };
        match from_config(&config) {
            Err(ConfigError::UnknownDevice(kind)) => assert_eq!(kind, "carrier-pigeon"),
            other => panic!("Expected UnknownDevice, got {:?}", other.err()),
        }
    }
}
