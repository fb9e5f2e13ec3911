//! Persisted record of the installed version.
//!
//! The record lives in `version_local.json` next to the executable. It is
//! read by the live application at startup and written by the updater after a
//! successful swap. Both sides go through [`VersionStore`].

use crate::constants::{DEFAULT_VERSION, TIMESTAMP_FORMAT, VERSION_FILE_NAME};
use crate::core::LauncherError;
use crate::utils::write_json_file;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Contents of `version_local.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVersionRecord {
    pub version: String,
    /// Local time formatted as `%Y-%m-%d %H:%M:%S`.
    pub updated_at: String,
}

impl LocalVersionRecord {
    pub fn new(version: impl Into<String>, updated_at: DateTime<Local>) -> Self {
        Self {
            version: version.into(),
            updated_at: updated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Reads and writes the local version record of one install directory.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
    default_version: String,
}

impl VersionStore {
    /// Store for the record inside `install_dir`.
    pub fn new(install_dir: &Path) -> Self {
        Self::at(install_dir.join(VERSION_FILE_NAME))
    }

    /// Store backed by an explicit file.
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            default_version: DEFAULT_VERSION.to_string(),
        }
    }

    /// Override the version recorded when no usable record exists.
    #[must_use]
    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The installed version.
    ///
    /// A missing or unparsable record is replaced by a fresh one carrying the
    /// default version, and that default is returned. Never fails.
    pub fn load(&self) -> String {
        match self.read() {
            Ok(record) => record.version,
            Err(reason) => {
                debug!(
                    "No usable version record at {} ({reason}), writing default {}",
                    self.path.display(),
                    self.default_version
                );
                if let Err(e) = self.try_write(&self.default_version, Local::now()) {
                    warn!("{e}");
                }
                self.default_version.clone()
            }
        }
    }

    /// Overwrite the record. Failures are logged and swallowed.
    pub fn write(&self, version: &str, timestamp: DateTime<Local>) {
        if let Err(e) = self.try_write(version, timestamp) {
            warn!("{e}");
        }
    }

    /// Overwrite the record, reporting failure as [`LauncherError::VersionWriteFailure`].
    pub fn try_write(
        &self,
        version: &str,
        timestamp: DateTime<Local>,
    ) -> Result<(), LauncherError> {
        let record = LocalVersionRecord::new(version, timestamp);
        write_json_file(&self.path, &record).map_err(|e| LauncherError::VersionWriteFailure {
            path: self.path.display().to_string(),
            reason: format!("{e:#}"),
        })?;
        debug!("Recorded version {version} in {}", self.path.display());
        Ok(())
    }

    /// Read the full record without any repair.
    pub fn read(&self) -> Result<LocalVersionRecord, String> {
        let content = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        serde_json::from_str(&content).map_err(|e| e.to_string())
    }
}
