//! Pipeline configuration.
//!
//! Describes where the pipelines read and write and which capture
//! device to use. Loading happens from a JSON file supplied by the
//! process bootstrap; the core only parses and validates.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Selected capture device. `kind` names a registered implementation;
/// the remaining fields are interpreted per kind.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub kind: String,
    /// Mount root for the `directory` device kind.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Root configuration for the ingestion/decision/export core.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Root for ingested media (`session_<id>/` subdirectories).
    pub incoming_dir: PathBuf,
    /// Where export packages and manifest sidecars are written.
    pub export_dir: PathBuf,
    /// Secondary root receiving the verified archive copies.
    pub archive_dir: PathBuf,
    pub device: DeviceConfig,
}

impl CoreConfig {
    /// Validates invariants the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("database_path", &self.database_path),
            ("incoming_dir", &self.incoming_dir),
            ("export_dir", &self.export_dir),
            ("archive_dir", &self.archive_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("'{}' must not be empty", name),
                });
            }
        }

        // The export and archive roots must differ, or verification
        // would compare the package against itself.
        if self.export_dir == self.archive_dir {
            return Err(ConfigError::Validation {
                message: "'export_dir' and 'archive_dir' must be different directories"
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Reads and validates a config file.
pub fn load_config(path: &Path) -> Result<CoreConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: CoreConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "database_path": "data/ipds.db",
                "incoming_dir": "data/incoming",
                "export_dir": "data/exports",
                "archive_dir": "data/archive",
                "device": { "kind": "directory", "root": "/mnt/dcim" }
            }"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.device.kind, "directory");
        assert_eq!(config.incoming_dir, PathBuf::from("data/incoming"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_config(&dir.path().join("absent.json")),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{ not json");
        assert!(matches!(load_config(&path), Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_same_export_and_archive_dir_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "database_path": "ipds.db",
                "incoming_dir": "in",
                "export_dir": "out",
                "archive_dir": "out",
                "device": { "kind": "directory" }
            }"#,
        );

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_empty_path_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "database_path": "",
                "incoming_dir": "in",
                "export_dir": "out",
                "archive_dir": "arch",
                "device": { "kind": "directory" }
            }"#,
        );

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation { .. })
        ));
    }
}
