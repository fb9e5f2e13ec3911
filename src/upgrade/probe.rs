//! Detecting whether the target executable can be replaced.
//!
//! There is no portable "is anyone executing this file" query, so the check
//! is a per-platform heuristic behind [`AccessProbe`]:
//!
//! - **Windows** refuses to rename an image that is mapped for execution, so a
//!   rename to `<path>.locktest` and back succeeds only when the file is free.
//! - **Unix** happily renames and replaces running executables. There the live
//!   application holds a shared advisory lock on its own executable for its
//!   whole lifetime (see [`ExecutableLease`](super::instance_lock::ExecutableLease)),
//!   and the probe asks for an exclusive lock with [`fs4`].
//!
//! A target that does not exist is free, unless an earlier rename probe left
//! it under its probe name. That file is moved back first, and the target
//! stays busy until it is.

use crate::constants::LOCK_PROBE_SUFFIX;
use std::path::{Path, PathBuf};
use tracing::{info, trace, warn};

/// Capability to test whether a file is exclusively accessible.
pub trait AccessProbe {
    fn is_exclusively_accessible(&self, path: &Path) -> bool;
}

/// The probe appropriate for the current platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformProbe;

impl AccessProbe for PlatformProbe {
    fn is_exclusively_accessible(&self, path: &Path) -> bool {
        #[cfg(windows)]
        {
            rename_round_trip(path)
        }
        #[cfg(not(windows))]
        {
            !path.exists() || advisory_lock_free(path)
        }
    }
}

/// Name `path` carries while a rename probe holds it aside.
pub fn probe_path(path: &Path) -> PathBuf {
    path.with_extension(match path.extension() {
        Some(ext) => format!("{}.{LOCK_PROBE_SUFFIX}", ext.to_string_lossy()),
        None => LOCK_PROBE_SUFFIX.to_string(),
    })
}

/// Rename `path` aside and back. Success proves nobody holds it open.
pub fn rename_round_trip(path: &Path) -> bool {
    let aside = probe_path(path);

    if !path.exists() {
        if !aside.exists() {
            return true;
        }
        // Left behind by a probe that could not move it back
        if let Err(e) = std::fs::rename(&aside, path) {
            warn!("{} is still parked at {}: {e}", path.display(), aside.display());
            return false;
        }
        info!("Moved {} back from {}", path.display(), aside.display());
    }

    if let Err(e) = std::fs::rename(path, &aside) {
        trace!("Probe rename of {} failed: {e}", path.display());
        return false;
    }

    match std::fs::rename(&aside, path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not move {} back after probing: {e}", aside.display());
            let _ = std::fs::rename(&aside, path);
            false
        }
    }
}

/// Try to take an exclusive advisory lock and release it immediately.
pub fn advisory_lock_free(path: &Path) -> bool {
    use fs4::fs_std::FileExt;

    let file = match std::fs::OpenOptions::new().read(true).open(path) {
        Ok(file) => file,
        Err(e) => {
            trace!("Probe open of {} failed: {e}", path.display());
            return false;
        }
    };

    match file.try_lock_exclusive() {
        Ok(true) => {
            let _ = FileExt::unlock(&file);
            true
        }
        Ok(false) => false,
        Err(e) => {
            trace!("Probe lock of {} failed: {e}", path.display());
            false
        }
    }
}
