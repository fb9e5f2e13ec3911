use crate::constants::{DEFAULT_UPDATE_URL, REMOTE_CHECK_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration settings for launchkit self-update behavior.
///
/// `UpgradeConfig` lives in the `[upgrade]` section of `launchkit.toml`. Every
/// field is optional in the file; missing fields take the defaults below.
///
/// # Default Behavior
///
/// - Check for updates at every start (the launcher is long-running, so a
///   single request per start is cheap)
/// - Fetch the version descriptor from [`DEFAULT_UPDATE_URL`]
/// - Give the remote check 5 seconds
/// - Download into the user's Downloads folder
/// - Look for the updater next to the running executable
///
/// ## TOML Example
/// ```toml
/// [upgrade]
/// update_url = "https://example.com/launchkit/version.json"
/// check_on_startup = true
/// request_timeout_secs = 5
/// download_dir = "/var/tmp/launchkit"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// URL of the remote version descriptor.
    #[serde(default = "default_update_url")]
    pub update_url: String,

    /// Whether `launchkit run` checks for updates when it starts.
    #[serde(default = "default_check_on_startup")]
    pub check_on_startup: bool,

    /// Timeout of the remote version check in seconds.
    ///
    /// The check runs while the operator waits, so values are clamped to 1..=9.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Directory the new executable is downloaded into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    /// Explicit location of the updater executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updater_path: Option<PathBuf>,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            update_url: default_update_url(),
            check_on_startup: default_check_on_startup(),
            request_timeout_secs: default_request_timeout_secs(),
            download_dir: None,
            updater_path: None,
        }
    }
}

fn default_update_url() -> String {
    DEFAULT_UPDATE_URL.to_string()
}

fn default_check_on_startup() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    REMOTE_CHECK_TIMEOUT.as_secs()
}

impl UpgradeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The remote check timeout, clamped to a single-digit number of seconds.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(1, 9))
    }

    /// Where downloads are staged.
    ///
    /// Falls back to the user's Downloads folder, then to the system temp dir.
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(std::env::temp_dir)
    }
}
