//! Capture device error types.

use thiserror::Error;

/// Errors raised by capture device implementations.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device could not be reached. Fatal to an ingestion run.
    #[error("Device connection failed: {0}")]
    ConnectionFailed(String),

    /// An operation was attempted before `connect` succeeded.
    #[error("Device '{0}' is not connected")]
    NotConnected(String),

    /// Enumerating media on the device failed.
    #[error("Failed to list media: {0}")]
    ListFailed(String),

    /// Transferring a single item failed.
    #[error("Download failed for '{vendor_id}': {detail}")]
    DownloadFailed { vendor_id: String, detail: String },
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
