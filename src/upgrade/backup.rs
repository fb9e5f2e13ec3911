use crate::constants::{BACKUP_SUFFIX, RESTORE_ATTEMPTS, RESTORE_RETRY_DELAY};
use anyhow::{Context, Result, bail};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, info, warn};

/// Path of the backup kept for `target`.
///
/// The suffix goes between the stem and the extension so the backup keeps an
/// executable extension on Windows:
///
/// ```rust
/// use launchkit::upgrade::backup::backup_path_for;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     backup_path_for(Path::new("/opt/app/launchkit.exe")),
///     PathBuf::from("/opt/app/launchkit_backup.exe"),
/// );
/// assert_eq!(
///     backup_path_for(Path::new("/opt/app/launchkit")),
///     PathBuf::from("/opt/app/launchkit_backup"),
/// );
/// ```
pub fn backup_path_for(target: &Path) -> PathBuf {
    let stem = target.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{stem}{BACKUP_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{BACKUP_SUFFIX}"),
    };
    target.with_file_name(name)
}

/// Copy Unix permission bits from `reference` onto `path`.
///
/// Without a reference the file is made `0o755` so it can be executed.
/// A no-op on other platforms.
pub fn restore_permissions(path: &Path, reference: Option<&Path>) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let permissions = match reference {
            Some(reference) => std::fs::metadata(reference)?.permissions(),
            None => std::fs::Permissions::from_mode(0o755),
        };
        std::fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, reference);
    }
    Ok(())
}

/// The backup belonging to an installed executable.
///
/// The updater creates the backup by renaming the target just before the
/// swap. This type covers putting it back on request through
/// `launchkit rollback`. The backup itself is never deleted here; it stays
/// as a recovery artifact until the next update replaces it.
#[derive(Debug, Clone)]
pub struct BackupManager {
    target_path: PathBuf,
    backup_path: PathBuf,
}

impl BackupManager {
    pub fn new(target_path: PathBuf) -> Self {
        let backup_path = backup_path_for(&target_path);
        Self {
            target_path,
            backup_path,
        }
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.is_file()
    }

    /// Restore the target from the backup, retrying while the target is busy.
    ///
    /// Makes up to three attempts one second apart, which covers a target
    /// that is still being released by an exiting process on Windows.
    ///
    /// # Errors
    ///
    /// Fails when no backup exists or every attempt failed.
    pub async fn restore_backup(&self) -> Result<()> {
        if !self.backup_exists() {
            bail!("No backup found at {}", self.backup_path.display());
        }

        warn!("Restoring {} from {}", self.target_path.display(), self.backup_path.display());

        let strategy = FixedInterval::new(RESTORE_RETRY_DELAY)
            .take(RESTORE_ATTEMPTS.saturating_sub(1) as usize);
        let mut attempt = 0u32;

        Retry::spawn(strategy, || {
            attempt += 1;
            let current = attempt;
            async move {
                self.attempt_restore().await.inspect_err(|e| {
                    warn!("Restore attempt {current} of {RESTORE_ATTEMPTS} failed: {e:#}");
                })
            }
        })
        .await
        .with_context(|| {
            format!(
                "Failed to restore {} after {RESTORE_ATTEMPTS} attempts",
                self.backup_path.display()
            )
        })?;

        info!("Restored {} from backup", self.target_path.display());
        Ok(())
    }

    async fn attempt_restore(&self) -> Result<()> {
        if fs::try_exists(&self.target_path).await.unwrap_or(false) {
            debug!("Removing {}", self.target_path.display());
            fs::remove_file(&self.target_path)
                .await
                .context("Failed to remove current executable")?;
        }

        fs::copy(&self.backup_path, &self.target_path)
            .await
            .context("Failed to copy backup into place")?;

        #[cfg(unix)]
        {
            let permissions = fs::metadata(&self.backup_path)
                .await
                .context("Failed to read backup metadata")?
                .permissions();
            fs::set_permissions(&self.target_path, permissions)
                .await
                .context("Failed to restore permissions")?;
        }

        Ok(())
    }
}
