//! The updater state machine.
//!
//! Runs in its own short-lived process (`launchkit-updater`) after the live
//! application handed off and exited. Everything here is synchronous: the
//! process has exactly one job and nothing to do concurrently.
//!
//! ```text
//! WAIT_PID -> WAIT_FILE_FREE -> BACKUP -> SWAP -> WRITE_VERSION -> CLEAR_LOCK -> RELAUNCH -> DONE
//!                  |               |        |
//!                  +---------------+--------+--> ABORT
//! ```
//!
//! Only SWAP has a compensating action: when the new file cannot be put in
//! place, the backup is copied back over the target. Failures after SWAP
//! (version record, lock removal, relaunch) are logged and do not affect the
//! outcome, because the new executable is already installed.

use crate::constants::{
    FILE_FREE_TIMEOUT, PID_WAIT_TIMEOUT, POLL_INTERVAL_MS, RELAUNCH_ARGS, RELAUNCH_SETTLE,
};
use crate::core::{LauncherError, user_friendly_error};
use crate::upgrade::backup::{backup_path_for, restore_permissions};
use crate::upgrade::instance_lock::clear_lock;
use crate::upgrade::probe::{AccessProbe, PlatformProbe};
use crate::upgrade::process::{ProcessHandle, spawn_detached};
use crate::upgrade::version_store::VersionStore;
use chrono::Local;
use colored::Colorize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, error, info, warn};

/// States of an update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    WaitPid,
    WaitFileFree,
    Backup,
    Swap,
    WriteVersion,
    ClearLock,
    Relaunch,
    Done,
    Abort,
}

impl fmt::Display for UpdaterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitPid => "WAIT_PID",
            Self::WaitFileFree => "WAIT_FILE_FREE",
            Self::Backup => "BACKUP",
            Self::Swap => "SWAP",
            Self::WriteVersion => "WRITE_VERSION",
            Self::ClearLock => "CLEAR_LOCK",
            Self::Relaunch => "RELAUNCH",
            Self::Done => "DONE",
            Self::Abort => "ABORT",
        };
        f.write_str(name)
    }
}

/// What happened to the backup after a failed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The backup was copied back over the target.
    Restored,
    /// There was no previous executable to restore.
    NothingToRestore,
    /// Copying the backup back failed too.
    Failed(String),
}

/// Normalized updater command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterArgs {
    pub staged: PathBuf,
    pub target: PathBuf,
    pub pid: Option<u32>,
    pub version: Option<String>,
}

impl UpdaterArgs {
    /// Build from raw positional arguments.
    ///
    /// Paths are made absolute. A pid that is not a number is ignored, and a
    /// version that is blank after trimming counts as absent.
    pub fn new(
        staged: &Path,
        target: &Path,
        pid: Option<&str>,
        version: Option<&str>,
    ) -> Result<Self, LauncherError> {
        let absolute = |path: &Path| {
            std::path::absolute(path).map_err(|e| LauncherError::InvalidArguments {
                usage: format!("cannot resolve {}: {e}", path.display()),
            })
        };

        let pid = pid.and_then(|raw| match raw.trim().parse::<u32>() {
            Ok(pid) => Some(pid),
            Err(_) => {
                warn!("Ignoring non-numeric pid argument {raw:?}");
                None
            }
        });

        let version =
            version.map(str::trim).filter(|v| !v.is_empty()).map(ToString::to_string);

        Ok(Self {
            staged: absolute(staged)?,
            target: absolute(target)?,
            pid,
            version,
        })
    }

    /// Directory holding the target, its version record and lock file.
    pub fn install_dir(&self) -> PathBuf {
        self.target.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Poll intervals and timeouts.
#[derive(Debug, Clone, Copy)]
pub struct UpdaterTimings {
    pub pid_timeout: Duration,
    pub file_timeout: Duration,
    pub poll_interval: Duration,
    /// How long the relaunched application must survive to count as started.
    pub relaunch_settle: Duration,
}

impl Default for UpdaterTimings {
    fn default() -> Self {
        Self {
            pid_timeout: PID_WAIT_TIMEOUT,
            file_timeout: FILE_FREE_TIMEOUT,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            relaunch_settle: RELAUNCH_SETTLE,
        }
    }
}

/// Operating-system operations the updater performs.
///
/// Every method defaults to the real implementation; tests override single
/// operations to simulate failures.
pub trait UpdaterOps {
    fn process_alive(&self, pid: u32) -> bool {
        ProcessHandle::new(pid).is_alive()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        std::fs::copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn relaunch(&self, exe: &Path, cwd: &Path) -> io::Result<u32> {
        spawn_detached(exe, RELAUNCH_ARGS, cwd)
    }
}

/// The real operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOps;

impl UpdaterOps for SystemOps {}

impl<T: UpdaterOps + ?Sized> UpdaterOps for &T {
    fn process_alive(&self, pid: u32) -> bool {
        (**self).process_alive(pid)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        (**self).copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        (**self).remove_file(path)
    }

    fn relaunch(&self, exe: &Path, cwd: &Path) -> io::Result<u32> {
        (**self).relaunch(exe, cwd)
    }
}

/// Outcome of an updater run.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    /// `Done` or `Abort`.
    pub final_state: UpdaterState,
    /// Why the run aborted.
    pub error: Option<LauncherError>,
    pub rollback: Option<RollbackOutcome>,
    pub backup_path: Option<PathBuf>,
    pub pid_wait_timed_out: bool,
    pub version_recorded: bool,
    pub lock_cleared: bool,
    pub relaunched_pid: Option<u32>,
    /// The relaunched process was gone before the settle period ended.
    pub relaunch_exited_early: bool,
    pub relaunch_error: Option<LauncherError>,
}

impl UpdateReport {
    fn new() -> Self {
        Self {
            final_state: UpdaterState::WaitPid,
            error: None,
            rollback: None,
            backup_path: None,
            pid_wait_timed_out: false,
            version_recorded: false,
            lock_cleared: false,
            relaunched_pid: None,
            relaunch_exited_early: false,
            relaunch_error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.final_state == UpdaterState::Done
    }

    /// 0 when the new version is installed (even without relaunch), 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_done() { 0 } else { 1 }
    }

    /// Print the operator-facing summary.
    pub fn print_summary(&self, args: &UpdaterArgs) {
        if let Some(error) = &self.error {
            user_friendly_error(anyhow::Error::from(error.clone())).display();
            if let Some(backup) = &self.backup_path {
                eprintln!("  Backup: {}", backup.display());
            }
            eprintln!("  Downloaded file: {}", args.staged.display());
            return;
        }

        println!("{} Update installed at {}", "✓".green().bold(), args.target.display());
        if let Some(backup) = &self.backup_path {
            println!("  Previous version kept at {}", backup.display());
        }
        match (&args.version, self.version_recorded) {
            (Some(version), true) => println!("  Recorded version {}", version.cyan()),
            (Some(version), false) => {
                println!("  {} version {version} was not recorded", "Warning:".yellow())
            }
            (None, _) => {}
        }
        if let Some(error) = &self.relaunch_error {
            user_friendly_error(anyhow::Error::from(error.clone())).display();
        } else if let Some(pid) = self.relaunched_pid {
            if self.relaunch_exited_early {
                println!(
                    "  {} relaunched pid {pid} exited right away. Start {} manually.",
                    "Warning:".yellow(),
                    args.target.display()
                );
            } else {
                println!("  Relaunched (pid {pid})");
            }
        }
    }
}

/// Drives one update from WAIT_PID to DONE or ABORT.
pub struct Updater<P = PlatformProbe, O = SystemOps> {
    args: UpdaterArgs,
    timings: UpdaterTimings,
    probe: P,
    ops: O,
}

impl Updater {
    pub fn new(args: UpdaterArgs) -> Self {
        Self {
            args,
            timings: UpdaterTimings::default(),
            probe: PlatformProbe,
            ops: SystemOps,
        }
    }
}

impl<P: AccessProbe, O: UpdaterOps> Updater<P, O> {
    #[must_use]
    pub fn with_timings(mut self, timings: UpdaterTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_probe<Q: AccessProbe>(self, probe: Q) -> Updater<Q, O> {
        Updater {
            args: self.args,
            timings: self.timings,
            probe,
            ops: self.ops,
        }
    }

    pub fn with_ops<R: UpdaterOps>(self, ops: R) -> Updater<P, R> {
        Updater {
            args: self.args,
            timings: self.timings,
            probe: self.probe,
            ops,
        }
    }

    pub fn args(&self) -> &UpdaterArgs {
        &self.args
    }

    /// Run the whole state machine. Never panics and never returns early
    /// without a report.
    pub fn run(&self) -> UpdateReport {
        let mut report = UpdateReport::new();
        let staged = &self.args.staged;
        let target = &self.args.target;
        let backup = backup_path_for(target);
        let install_dir = self.args.install_dir();

        info!(
            "Updating {} from {} (pid {:?}, version {:?})",
            target.display(),
            staged.display(),
            self.args.pid,
            self.args.version
        );

        if !staged.is_file() {
            error!("Staged file {} does not exist", staged.display());
            return self.abort(
                report,
                LauncherError::StagedFileMissing {
                    path: staged.display().to_string(),
                },
            );
        }

        // WAIT_PID
        if let Some(pid) = self.args.pid {
            self.enter(&mut report, UpdaterState::WaitPid);
            let exited = poll_until(self.timings.pid_timeout, self.timings.poll_interval, || {
                !self.ops.process_alive(pid)
            });
            if exited {
                debug!("Process {pid} has exited");
            } else {
                warn!(
                    "Process {pid} still alive after {}s, continuing",
                    self.timings.pid_timeout.as_secs()
                );
                report.pid_wait_timed_out = true;
            }
        } else {
            debug!("No pid given, skipping {}", UpdaterState::WaitPid);
        }

        // WAIT_FILE_FREE
        self.enter(&mut report, UpdaterState::WaitFileFree);
        let free = poll_until(self.timings.file_timeout, self.timings.poll_interval, || {
            self.probe.is_exclusively_accessible(target)
        });
        if !free {
            error!("{} is still in use", target.display());
            return self.abort(
                report,
                LauncherError::FileLockTimeout {
                    path: target.display().to_string(),
                    waited_secs: self.timings.file_timeout.as_secs(),
                },
            );
        }

        // BACKUP
        self.enter(&mut report, UpdaterState::Backup);
        if backup.exists()
            && let Err(e) = self.ops.remove_file(&backup)
        {
            warn!("Failed to remove old backup {}: {e}", backup.display());
        }
        let had_original = target.exists();
        if had_original {
            if let Err(e) = self.ops.rename(target, &backup) {
                error!("Failed to move {} to {}: {e}", target.display(), backup.display());
                return self.abort(
                    report,
                    LauncherError::BackupFailed {
                        path: target.display().to_string(),
                        reason: e.to_string(),
                    },
                );
            }
            info!("Backed up {} to {}", target.display(), backup.display());
            report.backup_path = Some(backup.clone());
        } else {
            info!("No existing executable at {}, nothing to back up", target.display());
        }

        // SWAP
        self.enter(&mut report, UpdaterState::Swap);
        if let Err(e) = self.swap(staged, target) {
            error!("Failed to install {}: {e}", target.display());
            let outcome = self.rollback(target, &backup, had_original);
            let error = match &outcome {
                RollbackOutcome::Failed(reason) => LauncherError::RollbackFailed {
                    backup: backup.display().to_string(),
                    reason: reason.clone(),
                },
                _ => LauncherError::SwapFailure {
                    target: target.display().to_string(),
                    reason: e.to_string(),
                },
            };
            report.rollback = Some(outcome);
            return self.abort(report, error);
        }
        let reference = had_original.then_some(backup.as_path());
        if let Err(e) = restore_permissions(target, reference) {
            warn!("Failed to set permissions on {}: {e}", target.display());
        }
        info!("Installed new executable at {}", target.display());

        // WRITE_VERSION
        if let Some(version) = &self.args.version {
            self.enter(&mut report, UpdaterState::WriteVersion);
            match VersionStore::new(&install_dir).try_write(version, Local::now()) {
                Ok(()) => report.version_recorded = true,
                Err(e) => warn!("{e}"),
            }
        } else {
            debug!("No version given, skipping {}", UpdaterState::WriteVersion);
        }

        // CLEAR_LOCK
        self.enter(&mut report, UpdaterState::ClearLock);
        match clear_lock(&install_dir) {
            Ok(removed) => {
                report.lock_cleared = true;
                debug!("Instance lock removed: {removed}");
            }
            Err(e) => warn!("Failed to remove instance lock: {e}"),
        }

        // RELAUNCH
        self.enter(&mut report, UpdaterState::Relaunch);
        match self.ops.relaunch(target, &install_dir) {
            Ok(pid) => {
                info!("Relaunched {} as pid {pid}", target.display());
                report.relaunched_pid = Some(pid);
                std::thread::sleep(self.timings.relaunch_settle);
                if !self.ops.process_alive(pid) {
                    warn!(
                        "Relaunched process {pid} exited within {}ms",
                        self.timings.relaunch_settle.as_millis()
                    );
                    report.relaunch_exited_early = true;
                }
            }
            Err(e) => {
                warn!("Failed to relaunch {}: {e}", target.display());
                report.relaunch_error = Some(LauncherError::RelaunchFailure {
                    path: target.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        self.enter(&mut report, UpdaterState::Done);
        report
    }

    fn enter(&self, report: &mut UpdateReport, state: UpdaterState) {
        info!(state = %state, "Entering {state}");
        report.final_state = state;
    }

    fn abort(&self, mut report: UpdateReport, error: LauncherError) -> UpdateReport {
        info!(state = %UpdaterState::Abort, "Update aborted: {error}");
        report.final_state = UpdaterState::Abort;
        report.error = Some(error);
        report
    }

    /// Rename, falling back to copy and delete when renaming is not possible
    /// (for example across volumes).
    fn swap(&self, staged: &Path, target: &Path) -> io::Result<()> {
        match self.ops.rename(staged, target) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Rename into place failed ({e}), copying instead");
                self.ops.copy(staged, target)?;
                if let Err(e) = self.ops.remove_file(staged) {
                    warn!("Failed to remove staged file {}: {e}", staged.display());
                }
                Ok(())
            }
        }
    }

    fn rollback(&self, target: &Path, backup: &Path, had_original: bool) -> RollbackOutcome {
        if !had_original {
            if target.exists()
                && let Err(e) = self.ops.remove_file(target)
            {
                warn!("Failed to remove partial file {}: {e}", target.display());
            }
            return RollbackOutcome::NothingToRestore;
        }

        warn!("Restoring {} from {}", target.display(), backup.display());
        match self.ops.copy(backup, target) {
            Ok(_) => {
                if let Err(e) = restore_permissions(target, Some(backup)) {
                    warn!("Failed to restore permissions on {}: {e}", target.display());
                }
                info!("Rollback succeeded");
                RollbackOutcome::Restored
            }
            Err(e) => {
                error!("Rollback failed: {e}");
                RollbackOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Poll `done` every `interval` until it returns true or `timeout` elapses.
fn poll_until(timeout: Duration, interval: Duration, mut done: impl FnMut() -> bool) -> bool {
    if done() {
        return true;
    }

    let deadline = Instant::now() + timeout;
    for delay in FixedInterval::new(interval) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        std::thread::sleep(delay.min(remaining));
        if done() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_normalization() {
        let args = UpdaterArgs::new(
            Path::new("new.bin"),
            Path::new("app"),
            Some("not-a-pid"),
            Some("  2.0.0 \n"),
        )
        .unwrap();

        assert!(args.staged.is_absolute());
        assert!(args.target.is_absolute());
        assert_eq!(args.pid, None);
        assert_eq!(args.version.as_deref(), Some("2.0.0"));

        let args =
            UpdaterArgs::new(Path::new("a"), Path::new("b"), Some("4242"), Some("   ")).unwrap();
        assert_eq!(args.pid, Some(4242));
        assert_eq!(args.version, None);
    }

    #[test]
    fn test_poll_until_times_out() {
        let start = Instant::now();
        let result = poll_until(Duration::from_millis(100), Duration::from_millis(20), || false);
        assert!(!result);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_poll_until_succeeds_later() {
        let mut calls = 0;
        let result = poll_until(Duration::from_secs(5), Duration::from_millis(1), || {
            calls += 1;
            calls == 3
        });
        assert!(result);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(UpdaterState::WaitFileFree.to_string(), "WAIT_FILE_FREE");
        assert_eq!(UpdaterState::Abort.to_string(), "ABORT");
    }

    #[test]
    fn test_exit_codes() {
        let mut report = UpdateReport::new();
        report.final_state = UpdaterState::Done;
        assert_eq!(report.exit_code(), 0);
        report.final_state = UpdaterState::Abort;
        assert_eq!(report.exit_code(), 1);
    }
}
