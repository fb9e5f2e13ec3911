//! Single-instance lock and executable lease.
//!
//! `launcher.lock` in the install directory holds the decimal pid of the
//! running instance. It is created with `create_new`, so two instances
//! starting at the same moment cannot both succeed. A lock naming a process
//! that no longer exists (or no pid at all) is stale: it is removed and
//! creation is retried once.
//!
//! The updater deletes the lock unconditionally while swapping, so the
//! relaunched instance always starts from a clean slate.

use crate::constants::LOCK_FILE_NAME;
use crate::core::LauncherError;
use crate::upgrade::process::ProcessHandle;
use crate::utils::remove_if_exists;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pid recorded in a lock file, if it holds one.
pub fn read_lock_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Remove the lock file of `install_dir` regardless of its owner.
///
/// Returns whether a file was removed.
pub fn clear_lock(install_dir: &Path) -> io::Result<bool> {
    remove_if_exists(&install_dir.join(LOCK_FILE_NAME))
}

/// Ownership of `launcher.lock` for the lifetime of this value.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
    held: bool,
}

impl InstanceLock {
    /// Take the lock for the current process.
    ///
    /// # Errors
    ///
    /// [`LauncherError::AlreadyRunning`] when another live process owns it,
    /// or an I/O error when the lock file cannot be created.
    pub fn acquire(install_dir: &Path) -> Result<Self, LauncherError> {
        Self::acquire_for(install_dir, std::process::id())
    }

    pub fn acquire_for(install_dir: &Path, pid: u32) -> Result<Self, LauncherError> {
        let path = install_dir.join(LOCK_FILE_NAME);

        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    write!(file, "{pid}")?;
                    file.sync_all()?;
                    debug!("Acquired instance lock {} for pid {pid}", path.display());
                    return Ok(Self {
                        path,
                        pid,
                        held: true,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if attempt > 0 {
                        break;
                    }
                    match read_lock_pid(&path) {
                        Some(owner) if owner != pid && ProcessHandle::new(owner).is_alive() => {
                            return Err(LauncherError::AlreadyRunning {
                                pid: owner,
                            });
                        }
                        owner => {
                            info!(
                                "Removing stale instance lock {} (owner {owner:?})",
                                path.display()
                            );
                            remove_if_exists(&path)?;
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Someone recreated the lock between our removal and retry
        match read_lock_pid(&path) {
            Some(owner) => Err(LauncherError::AlreadyRunning {
                pid: owner,
            }),
            None => Err(LauncherError::Other {
                message: format!("Could not acquire instance lock {}", path.display()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Delete the lock file if it still names this process.
    ///
    /// Safe to call more than once. Called automatically on drop, but must be
    /// called explicitly before `std::process::exit`.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;

        if read_lock_pid(&self.path) != Some(self.pid) {
            debug!("Instance lock {} no longer ours, leaving it", self.path.display());
            return;
        }
        match remove_if_exists(&self.path) {
            Ok(_) => debug!("Released instance lock {}", self.path.display()),
            Err(e) => warn!("Failed to remove instance lock {}: {e}", self.path.display()),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Shared advisory lock on the running executable.
///
/// While held, the updater's exclusivity probe reports the executable as
/// busy on platforms where the OS itself does not lock running images.
/// Released when dropped or when the process exits.
#[derive(Debug)]
pub struct ExecutableLease {
    file: File,
    path: PathBuf,
}

impl ExecutableLease {
    /// Try to lease `exe`. Returns `None` when the lock is unavailable.
    pub fn acquire(exe: &Path) -> Option<Self> {
        let file = match File::open(exe) {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot open {} for leasing: {e}", exe.display());
                return None;
            }
        };

        match FileExt::try_lock_shared(&file) {
            Ok(true) => {
                debug!("Holding executable lease on {}", exe.display());
                Some(Self {
                    file,
                    path: exe.to_path_buf(),
                })
            }
            Ok(false) => {
                warn!("Executable {} is locked by an updater", exe.display());
                None
            }
            Err(e) => {
                warn!("Cannot lease {}: {e}", exe.display());
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExecutableLease {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrade::probe::advisory_lock_free;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_pid_and_release_removes() {
        let temp = TempDir::new().unwrap();
        let mut lock = InstanceLock::acquire(temp.path()).unwrap();

        assert_eq!(read_lock_pid(lock.path()), Some(std::process::id()));

        lock.release();
        assert!(!temp.path().join(LOCK_FILE_NAME).exists());
        lock.release();
    }

    #[test]
    fn test_live_owner_blocks_second_instance() {
        let temp = TempDir::new().unwrap();
        // Our own pid stands in for another live instance
        let _first = InstanceLock::acquire(temp.path()).unwrap();

        let err = InstanceLock::acquire_for(temp.path(), u32::MAX - 1).unwrap_err();
        assert!(matches!(err, LauncherError::AlreadyRunning { pid } if pid == std::process::id()));
    }

    #[test]
    fn test_stale_lock_is_replaced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCK_FILE_NAME);

        std::fs::write(&path, "not-a-pid").unwrap();
        let mut lock = InstanceLock::acquire(temp.path()).unwrap();
        assert_eq!(read_lock_pid(&path), Some(std::process::id()));
        lock.release();

        // A pid far beyond any pid_max cannot be alive
        std::fs::write(&path, format!("{}", u32::MAX - 7)).unwrap();
        let lock = InstanceLock::acquire(temp.path()).unwrap();
        assert_eq!(read_lock_pid(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn test_release_leaves_foreign_lock() {
        let temp = TempDir::new().unwrap();
        let mut lock = InstanceLock::acquire(temp.path()).unwrap();
        std::fs::write(lock.path(), "12345").unwrap();

        lock.release();
        assert_eq!(read_lock_pid(&temp.path().join(LOCK_FILE_NAME)), Some(12345));
    }

    #[test]
    fn test_clear_lock_is_idempotent() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCK_FILE_NAME), "1").unwrap();

        assert!(clear_lock(temp.path()).unwrap());
        assert!(!clear_lock(temp.path()).unwrap());
    }

    #[test]
    fn test_lease_blocks_probe_until_dropped() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("launchkit");
        std::fs::write(&exe, b"A").unwrap();

        let lease = ExecutableLease::acquire(&exe).unwrap();
        assert!(!advisory_lock_free(&exe));

        drop(lease);
        assert!(advisory_lock_free(&exe));
    }
}
