//! Test utilities for launchkit
//!
//! Helpers shared by unit tests and, through the `test-utils` feature, by the
//! integration suite:
//!
//! - [`init_test_logging`] installs a test-friendly tracing subscriber once
//! - [`InstallFixture`] lays out an install directory with an old executable,
//!   a staged download and a stale instance lock
//!
//! # Example
//!
//! ```rust,no_run
//! use launchkit::test_utils::InstallFixture;
//! use launchkit::upgrade::Updater;
//!
//! let install = InstallFixture::new().unwrap();
//! let report = Updater::new(install.args(None, Some("2.0.0"))).run();
//! assert!(report.is_done());
//! ```

use crate::constants::LOCK_FILE_NAME;
use crate::upgrade::UpdaterArgs;
use crate::upgrade::backup::backup_path_for;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set, that level is used;
/// otherwise `RUST_LOG` is honoured, and without it logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Old executable `app/launchkit` (`A`), staged `downloads/launchkit` (`B`)
/// and a lock file naming pid 99999.
pub struct InstallFixture {
    _temp: TempDir,
    pub app_dir: PathBuf,
    pub target: PathBuf,
    pub staged: PathBuf,
}

impl InstallFixture {
    pub fn new() -> io::Result<Self> {
        let temp = TempDir::new()?;
        let app_dir = temp.path().join("app");
        let download_dir = temp.path().join("downloads");
        std::fs::create_dir_all(&app_dir)?;
        std::fs::create_dir_all(&download_dir)?;

        let target = app_dir.join("launchkit");
        let staged = download_dir.join("launchkit");
        std::fs::write(&target, b"A")?;
        std::fs::write(&staged, b"B")?;
        std::fs::write(app_dir.join(LOCK_FILE_NAME), "99999")?;

        Ok(Self {
            _temp: temp,
            app_dir,
            target,
            staged,
        })
    }

    /// Updater arguments for this install.
    ///
    /// # Panics
    ///
    /// If the paths cannot be made absolute.
    pub fn args(&self, pid: Option<&str>, version: Option<&str>) -> UpdaterArgs {
        UpdaterArgs::new(&self.staged, &self.target, pid, version)
            .unwrap_or_else(|e| panic!("fixture paths are invalid: {e}"))
    }

    pub fn backup(&self) -> PathBuf {
        backup_path_for(&self.target)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.app_dir.join(LOCK_FILE_NAME)
    }

    /// # Panics
    ///
    /// If `path` cannot be read.
    pub fn read(&self, path: &Path) -> Vec<u8> {
        std::fs::read(path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    }
}
