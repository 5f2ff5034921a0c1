//! ipds — photo ingestion, review, and verified export.
//!
//! Three pipelines over one persistent entity graph: ingestion pulls
//! media from a capture device into tracked local storage, the decision
//! service constrains accept/reject to the session that owns the media,
//! and the export pipeline packages accepted media into a manifest-
//! hashed archive verified bit-for-bit against its secondary copy.

pub mod config;
pub mod db;
pub mod decision;
pub mod device;
pub mod error;
pub mod export;
pub mod hashing;
pub mod ingest;
pub mod sanitize;
pub mod storage;

pub use config::{load_config, CoreConfig, DeviceConfig};
pub use db::Database;
pub use decision::{DecisionService, DecisionStatus, MediaDecisionView};
pub use device::{CaptureDevice, DeviceHealth, MediaItem};
pub use error::{ConfigError, IpdsError, Result, StorageError};
pub use export::{ExportOutcome, ExportPipeline};
pub use ingest::{run_ingestion, IngestSummary};
