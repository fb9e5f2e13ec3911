//! Launcher configuration (`launchkit.toml`).
//!
//! The configuration file sits next to the launcher executable so a portable
//! install carries its settings with it. The location can be overridden with
//! `--config` or the `LAUNCHKIT_CONFIG_PATH` environment variable.
//!
//! ```toml
//! [upgrade]
//! update_url = "https://example.com/launchkit/version.json"
//! check_on_startup = false
//! ```

use crate::constants::{CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use crate::core::LauncherError;
use crate::upgrade::config::UpgradeConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Root of `launchkit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Self-update settings.
    #[serde(default)]
    pub upgrade: UpgradeConfig,
}

impl LauncherConfig {
    /// Load the configuration for an install directory.
    ///
    /// Resolution order: `explicit`, then `LAUNCHKIT_CONFIG_PATH`, then
    /// `launchkit.toml` inside `install_dir`. A missing file yields defaults.
    pub async fn load(install_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(install_dir, explicit);
        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        toml::from_str(&content).map_err(|e| {
            LauncherError::ConfigError {
                message: format!("{}: {}", path.display(), e.message()),
            }
            .into()
        })
    }

    /// Write the configuration as pretty TOML.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write configuration to {}", path.display()))
    }

    pub fn resolve_path(install_dir: &Path, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        install_dir.join(CONFIG_FILE_NAME)
    }
}
