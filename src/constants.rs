//! Global constants used throughout the launchkit codebase.
//!
//! This module contains file names, timeout durations, poll intervals and
//! other values shared by the live application and the updater process.
//! Both processes must agree on these, since the filesystem is the only
//! channel between them.

use std::time::Duration;

/// Version recorded when no usable local version file exists.
///
/// This is the version the binary was built as.
pub const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Remote version descriptor fetched by the update check.
pub const DEFAULT_UPDATE_URL: &str =
    "https://raw.githubusercontent.com/launchkit/launchkit/main/version.json";

/// Name of the persisted version record, stored next to the executable.
pub const VERSION_FILE_NAME: &str = "version_local.json";

/// Name of the single-instance lock file, stored next to the executable.
pub const LOCK_FILE_NAME: &str = "launcher.lock";

/// Name of the optional configuration file, stored next to the executable.
pub const CONFIG_FILE_NAME: &str = "launchkit.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "LAUNCHKIT_CONFIG_PATH";

/// Environment variable that disables progress bars when set.
pub const NO_PROGRESS_ENV: &str = "LAUNCHKIT_NO_PROGRESS";

/// Suffix inserted before the extension to derive the backup file name.
///
/// `launchkit.exe` becomes `launchkit_backup.exe`.
pub const BACKUP_SUFFIX: &str = "_backup";

/// Extension appended to the target while probing it with a rename round trip.
pub const LOCK_PROBE_SUFFIX: &str = "locktest";

/// Base name of the staged download when the URL carries no usable file name.
pub const DEFAULT_STAGED_NAME: &str = "launchkit_update";

/// Base name of the updater executable shipped next to the application.
pub const UPDATER_BIN_NAME: &str = "launchkit-updater";

/// Timeout for fetching the remote version descriptor (5 seconds).
pub const REMOTE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the updater waits for the old process to exit (30 seconds).
///
/// Expiry is not fatal: the updater continues with the file probe.
pub const PID_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the updater waits for the target executable to become free (60 seconds).
///
/// Expiry aborts the update with the original file untouched.
pub const FILE_FREE_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval for process liveness and file probes (200ms).
pub const POLL_INTERVAL_MS: u64 = 200;

/// Arguments the updater passes to the relaunched application.
pub const RELAUNCH_ARGS: &[&str] = &["run"];

/// How long the updater watches the relaunched application before reporting (500ms).
///
/// A child that is gone by then most likely rejected its startup.
pub const RELAUNCH_SETTLE: Duration = Duration::from_millis(500);

/// Number of attempts when restoring a backup by hand.
pub const RESTORE_ATTEMPTS: u32 = 3;

/// Delay between manual restore attempts (1 second).
pub const RESTORE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Format of the `updated_at` field in the version record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Windows process creation flags used to detach the relaunched application.
///
/// `DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP`
#[cfg(windows)]
pub const DETACHED_CREATION_FLAGS: u32 = 0x0000_0008 | 0x0000_0200;

/// Windows process creation flag used when starting the updater.
///
/// `CREATE_NEW_PROCESS_GROUP`
#[cfg(windows)]
pub const NEW_PROCESS_GROUP_FLAG: u32 = 0x0000_0200;
