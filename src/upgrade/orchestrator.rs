//! The live application's side of an update.
//!
//! [`UpdateOrchestrator`] checks for an update, downloads it and hands off to
//! the external updater. The handoff is fire-and-forget: once the updater is
//! spawned, the launcher drops its instance lock and exits at once so the
//! executable is released. It never learns whether the update succeeded.

use crate::config::LauncherConfig;
use crate::constants::UPDATER_BIN_NAME;
use crate::core::LauncherError;
use crate::upgrade::download::Downloader;
use crate::upgrade::instance_lock::{ExecutableLease, InstanceLock};
use crate::upgrade::process::spawn_in_new_group;
use crate::upgrade::version_check::{UpdateChecker, VersionDescriptor};
use crate::upgrade::version_store::VersionStore;
use crate::utils::DownloadProgress;
use anyhow::{Context, Result};
use std::env::consts::EXE_SUFFIX;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// State shared by the running launcher.
///
/// Passed explicitly to whatever needs it instead of living in globals.
#[derive(Debug)]
pub struct AppContext {
    pub config: LauncherConfig,
    pub install_dir: PathBuf,
    pub current_exe: PathBuf,
    pub version_store: VersionStore,
    instance_lock: Option<InstanceLock>,
    lease: Option<ExecutableLease>,
}

impl AppContext {
    pub fn new(config: LauncherConfig, current_exe: PathBuf) -> Self {
        let install_dir =
            current_exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let version_store = VersionStore::new(&install_dir);

        Self {
            config,
            install_dir,
            current_exe,
            version_store,
            instance_lock: None,
            lease: None,
        }
    }

    /// Context for the running executable, with configuration loaded from
    /// `config_path` or the usual locations.
    pub async fn from_env(config_path: Option<&Path>) -> Result<Self> {
        let current_exe =
            std::env::current_exe().context("Failed to get current executable path")?;
        let install_dir =
            current_exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let config = LauncherConfig::load(&install_dir, config_path).await?;
        Ok(Self::new(config, current_exe))
    }

    /// Become the single running instance and lease the executable.
    pub fn acquire_instance(&mut self) -> Result<(), LauncherError> {
        let lock = InstanceLock::acquire(&self.install_dir)?;
        self.instance_lock = Some(lock);
        self.lease = ExecutableLease::acquire(&self.current_exe);
        Ok(())
    }

    pub fn holds_instance(&self) -> bool {
        self.instance_lock.is_some()
    }

    /// Drop the executable lease and remove the instance lock.
    pub fn release_instance(&mut self) {
        self.lease = None;
        if let Some(mut lock) = self.instance_lock.take() {
            lock.release();
        }
    }
}

/// What the operator wants to do about an available update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateChoice {
    Install,
    OpenReleasePage,
    Later,
}

/// Presents an available update and returns the operator's decision.
pub trait UpdatePrompt {
    fn choose(&mut self, current: &str, descriptor: &VersionDescriptor) -> UpdateChoice;
}

/// Always installs (`launchkit upgrade --yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoInstall;

impl UpdatePrompt for AutoInstall {
    fn choose(&mut self, _current: &str, _descriptor: &VersionDescriptor) -> UpdateChoice {
        UpdateChoice::Install
    }
}

/// How [`UpdateOrchestrator::begin_update`] ended when it did not exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Postponed,
    ReleasePageShown(String),
}

/// Drives check, download and handoff from inside the live application.
pub struct UpdateOrchestrator {
    ctx: AppContext,
    checker: UpdateChecker,
    downloader: Downloader,
}

impl UpdateOrchestrator {
    pub fn new(ctx: AppContext) -> Result<Self, LauncherError> {
        let installed = ctx.version_store.load();
        let checker = UpdateChecker::new(
            ctx.config.upgrade.update_url.clone(),
            installed,
            ctx.config.upgrade.request_timeout(),
        )?;
        let downloader = Downloader::new()?;

        Ok(Self {
            ctx,
            checker,
            downloader,
        })
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AppContext {
        &mut self.ctx
    }

    pub fn into_context(self) -> AppContext {
        self.ctx
    }

    pub fn checker(&self) -> &UpdateChecker {
        &self.checker
    }

    /// The installed version, repairing a missing or broken record.
    pub fn get_installed_version(&self) -> String {
        self.ctx.version_store.load()
    }

    /// The descriptor of an available update. Failures count as "none".
    pub async fn check_for_update(&self) -> Option<VersionDescriptor> {
        self.checker.check_for_update().await
    }

    /// Download `url` into the configured download directory.
    ///
    /// The transfer runs on a separate task. Progress reports travel over a
    /// channel and `on_progress` is invoked on the calling task, which owns
    /// whatever display state it touches.
    pub async fn download_update<F>(
        &self,
        url: &str,
        mut on_progress: F,
    ) -> Result<PathBuf, LauncherError>
    where
        F: FnMut(u64, u64),
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, u64)>();
        let downloader = self.downloader.clone();
        let owned_url = url.to_string();
        let dest_dir = self.ctx.config.upgrade.resolved_download_dir();

        let worker = tokio::spawn(async move {
            downloader
                .download(&owned_url, &dest_dir, |received, total| {
                    let _ = tx.send((received, total));
                })
                .await
        });

        while let Some((received, total)) = rx.recv().await {
            on_progress(received, total);
        }

        worker.await.map_err(|e| LauncherError::DownloadError {
            url: url.to_string(),
            reason: format!("download task failed: {e}"),
        })?
    }

    /// Where the updater executable is expected.
    pub fn updater_path(&self) -> PathBuf {
        match &self.ctx.config.upgrade.updater_path {
            Some(path) => path.clone(),
            None => self.ctx.install_dir.join(format!("{UPDATER_BIN_NAME}{EXE_SUFFIX}")),
        }
    }

    /// Spawn the updater with `(staged, current_exe, pid, version)`.
    ///
    /// Does not wait for it. Returns the updater's pid.
    pub fn launch_updater(
        &self,
        staged: &Path,
        current_exe: &Path,
        pid: u32,
        version: &str,
    ) -> Result<u32, LauncherError> {
        let updater = self.updater_path();
        if !updater.is_file() {
            warn!("Updater not found at {}", updater.display());
            return Err(LauncherError::UpdaterNotFound {
                path: updater.display().to_string(),
                staged: staged.display().to_string(),
            });
        }

        let staged_arg = staged.to_string_lossy();
        let exe_arg = current_exe.to_string_lossy();
        let pid_arg = pid.to_string();
        let args = [staged_arg.as_ref(), exe_arg.as_ref(), pid_arg.as_str(), version];

        info!("Handing off to {} {:?}", updater.display(), args);
        spawn_in_new_group(&updater, &args, &self.ctx.install_dir).map_err(|e| {
            LauncherError::UpdaterLaunchFailed {
                path: updater.display().to_string(),
                staged: staged.display().to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Spawn the updater, release the instance and terminate the process.
    ///
    /// Only returns when the updater could not be started; the launcher then
    /// keeps running and keeps its lock.
    pub fn launch_updater_and_exit(
        &mut self,
        staged: &Path,
        current_exe: &Path,
        pid: u32,
        version: &str,
    ) -> LauncherError {
        match self.launch_updater(staged, current_exe, pid, version) {
            Ok(updater_pid) => {
                debug!("Updater running as pid {updater_pid}, exiting");
                self.ctx.release_instance();
                let _ = std::io::stdout().flush();
                let _ = std::io::stderr().flush();
                std::process::exit(0)
            }
            Err(e) => e,
        }
    }

    /// Offer `descriptor` to the operator and act on the answer.
    ///
    /// On [`UpdateChoice::Install`] this downloads the update and hands off,
    /// and does not return unless something went wrong.
    pub async fn begin_update(
        &mut self,
        descriptor: &VersionDescriptor,
        prompt: &mut dyn UpdatePrompt,
    ) -> Result<UpdateOutcome, LauncherError> {
        let current = self.get_installed_version();

        match prompt.choose(&current, descriptor) {
            UpdateChoice::Later => {
                info!("Update to {} postponed", descriptor.version);
                Ok(UpdateOutcome::Postponed)
            }
            UpdateChoice::OpenReleasePage => {
                let page = descriptor.release_page_url().to_string();
                println!("Release page: {page}");
                Ok(UpdateOutcome::ReleasePageShown(page))
            }
            UpdateChoice::Install => {
                let mut progress = DownloadProgress::new();
                let staged = match self
                    .download_update(&descriptor.download_url, |received, total| {
                        progress.update(received, total);
                    })
                    .await
                {
                    Ok(path) => {
                        progress.finish("Download complete");
                        path
                    }
                    Err(e) => {
                        progress.abandon();
                        return Err(e);
                    }
                };

                let current_exe = self.ctx.current_exe.clone();
                Err(self.launch_updater_and_exit(
                    &staged,
                    &current_exe,
                    std::process::id(),
                    &descriptor.version,
                ))
            }
        }
    }
}
