//! Shared test utilities for ipds integration tests.
//!
//! `TestHarness` provides an isolated environment per test: a fake
//! capture volume, incoming/export/archive roots under one temp
//! directory, and an in-memory database seeded with a job and an
//! operator.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use tempfile::TempDir;

use ipds::db::{job_repo, operator_repo, session_repo};
use ipds::device::DirectoryDevice;
use ipds::{Database, DecisionService, ExportPipeline, IngestSummary};

pub const JOB_ID: &str = "JOB-1";
pub const OPERATOR_ID: &str = "op1";

static INIT: Once = Once::new();

/// Installs a test subscriber once so `RUST_LOG` filtering works for
/// both `tracing` spans and `log` records.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct TestHarness {
    temp: TempDir,
    pub db: Database,
    /// The fake capture volume the DirectoryDevice reads from.
    pub volume_dir: PathBuf,
    pub incoming_dir: PathBuf,
    pub export_dir: PathBuf,
    pub archive_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        init_tracing();

        let temp = TempDir::new().expect("Failed to create temp directory");
        let base = temp.path();

        let volume_dir = base.join("volume");
        let incoming_dir = base.join("incoming");
        let export_dir = base.join("exports");
        let archive_dir = base.join("archive");
        for dir in [&volume_dir, &incoming_dir, &export_dir, &archive_dir] {
            std::fs::create_dir_all(dir).expect("Failed to create dir");
        }

        let db = Database::open_in_memory().expect("Failed to open database");
        db.with_conn(|conn| {
            job_repo::insert(conn, JOB_ID)?;
            operator_repo::insert(conn, OPERATOR_ID, "Alex", Some("inspector"))?;
            Ok(())
        })
        .expect("Failed to seed job/operator");

        Self {
            temp,
            db,
            volume_dir,
            incoming_dir,
            export_dir,
            archive_dir,
        }
    }

    /// Drops a photo onto the fake capture volume.
    pub fn add_photo(&self, relative: &str, bytes: &[u8]) {
        let path = self.volume_dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    pub fn open_session(&self, uut_serial: &str) -> i64 {
        self.db
            .with_conn(|conn| session_repo::open(conn, JOB_ID, OPERATOR_ID, uut_serial, "initial"))
            .expect("Failed to open session")
    }

    pub fn device(&self) -> DirectoryDevice {
        DirectoryDevice::new(&self.volume_dir)
    }

    pub async fn ingest(&self, session_id: i64) -> IngestSummary {
        let mut device = self.device();
        ipds::run_ingestion(&self.db, &mut device, session_id, &self.incoming_dir)
            .await
            .expect("Ingestion failed")
    }

    pub fn decision_service(&self) -> DecisionService {
        DecisionService::new(self.db.clone())
    }

    pub fn export_pipeline(&self) -> ExportPipeline {
        ExportPipeline::new(self.db.clone(), &self.export_dir, &self.archive_dir)
    }

    /// Media ids of a session, ascending.
    pub fn media_ids(&self, session_id: i64) -> Vec<i64> {
        self.decision_service()
            .list_media_for_session(session_id)
            .expect("Failed to list media")
            .into_iter()
            .map(|v| v.media_id)
            .collect()
    }

    /// Applies one decision to the given ids via the service boundary.
    pub fn decide(&self, session_id: i64, ids: &[i64], status: &str) -> usize {
        let raw: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.decision_service()
            .bulk_set_decisions(session_id, &raw, status, None, None)
            .expect("Decision failed")
    }

    /// Asserts no staging leftovers linger under the export root.
    pub fn assert_no_staging_leftovers(&self) {
        let leftovers: Vec<_> = std::fs::read_dir(&self.export_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
            .collect();
        assert!(leftovers.is_empty(), "staging leftovers: {:?}", leftovers);
    }
}
