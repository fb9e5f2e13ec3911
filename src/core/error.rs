//! Error handling for launchkit
//!
//! This module provides the error types and user-friendly error reporting for both
//! the live application and the updater process. The error system follows two rules:
//! 1. **Strongly-typed errors** for precise handling inside the update core
//! 2. **Actionable messages** for the operator, always naming the file they need
//!    when manual recovery is possible
//!
//! # Architecture
//!
//! - [`LauncherError`] - Enumerated failure cases of the update flow
//! - [`ErrorContext`] - Wrapper that adds a suggestion and details for display
//!
//! # Error Categories
//!
//! - **Remote check**: [`LauncherError::NetworkError`], [`LauncherError::FormatError`]
//! - **Download**: [`LauncherError::DownloadError`]
//! - **Swap**: [`LauncherError::FileLockTimeout`], [`LauncherError::BackupFailed`],
//!   [`LauncherError::SwapFailure`], [`LauncherError::RollbackFailed`]
//! - **Non-fatal**: [`LauncherError::RelaunchFailure`], [`LauncherError::VersionWriteFailure`]
//! - **Handoff**: [`LauncherError::UpdaterNotFound`], [`LauncherError::UpdaterLaunchFailed`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use launchkit::core::{LauncherError, user_friendly_error};
//!
//! let error = LauncherError::FileLockTimeout {
//!     path: "/opt/launchkit/launchkit".to_string(),
//!     waited_secs: 60,
//! };
//! user_friendly_error(anyhow::Error::from(error)).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Failure cases of the launcher and its update flow.
#[derive(Error, Debug)]
pub enum LauncherError {
    /// The remote version descriptor could not be reached.
    #[error("Network error: {operation}")]
    NetworkError {
        operation: String,
        reason: String,
    },

    /// The remote version descriptor was not valid JSON of the expected shape.
    #[error("Malformed version descriptor: {reason}")]
    FormatError {
        reason: String,
    },

    /// Fetching the new executable failed. No partial file is left behind.
    #[error("Failed to download update from {url}: {reason}")]
    DownloadError {
        url: String,
        reason: String,
    },

    /// The target executable stayed locked for the whole probe window.
    #[error("File is still locked after {waited_secs}s: {path}")]
    FileLockTimeout {
        path: String,
        waited_secs: u64,
    },

    /// The backup could not be created. Nothing has been modified.
    #[error("Failed to back up {path}: {reason}")]
    BackupFailed {
        path: String,
        reason: String,
    },

    /// Moving the staged file into place failed.
    #[error("Failed to install new version at {target}: {reason}")]
    SwapFailure {
        target: String,
        reason: String,
    },

    /// Restoring the backup after a failed swap also failed.
    #[error("Failed to restore backup {backup}: {reason}")]
    RollbackFailed {
        backup: String,
        reason: String,
    },

    /// The updated executable could not be started.
    #[error("Failed to relaunch {path}: {reason}")]
    RelaunchFailure {
        path: String,
        reason: String,
    },

    /// The local version record could not be written.
    #[error("Failed to write version record {path}: {reason}")]
    VersionWriteFailure {
        path: String,
        reason: String,
    },

    /// The staged file handed to the updater does not exist.
    #[error("Downloaded file does not exist: {path}")]
    StagedFileMissing {
        path: String,
    },

    /// Another live instance owns the single-instance lock.
    #[error("Launcher is already running (pid {pid})")]
    AlreadyRunning {
        pid: u32,
    },

    /// No updater executable was found where the launcher expects it.
    #[error("Updater not found at {path}")]
    UpdaterNotFound {
        path: String,
        staged: String,
    },

    /// The updater executable exists but could not be spawned.
    #[error("Failed to start updater {path}: {reason}")]
    UpdaterLaunchFailed {
        path: String,
        staged: String,
        reason: String,
    },

    /// The updater was invoked with unusable arguments.
    #[error("Invalid arguments: {usage}")]
    InvalidArguments {
        usage: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{message}")]
    Other {
        message: String,
    },
}

impl Clone for LauncherError {
    fn clone(&self) -> Self {
        match self {
            Self::NetworkError {
                operation,
                reason,
            } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::FormatError {
                reason,
            } => Self::FormatError {
                reason: reason.clone(),
            },
            Self::DownloadError {
                url,
                reason,
            } => Self::DownloadError {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::FileLockTimeout {
                path,
                waited_secs,
            } => Self::FileLockTimeout {
                path: path.clone(),
                waited_secs: *waited_secs,
            },
            Self::BackupFailed {
                path,
                reason,
            } => Self::BackupFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::SwapFailure {
                target,
                reason,
            } => Self::SwapFailure {
                target: target.clone(),
                reason: reason.clone(),
            },
            Self::RollbackFailed {
                backup,
                reason,
            } => Self::RollbackFailed {
                backup: backup.clone(),
                reason: reason.clone(),
            },
            Self::RelaunchFailure {
                path,
                reason,
            } => Self::RelaunchFailure {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::VersionWriteFailure {
                path,
                reason,
            } => Self::VersionWriteFailure {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::StagedFileMissing {
                path,
            } => Self::StagedFileMissing {
                path: path.clone(),
            },
            Self::AlreadyRunning {
                pid,
            } => Self::AlreadyRunning {
                pid: *pid,
            },
            Self::UpdaterNotFound {
                path,
                staged,
            } => Self::UpdaterNotFound {
                path: path.clone(),
                staged: staged.clone(),
            },
            Self::UpdaterLaunchFailed {
                path,
                staged,
                reason,
            } => Self::UpdaterLaunchFailed {
                path: path.clone(),
                staged: staged.clone(),
                reason: reason.clone(),
            },
            Self::InvalidArguments {
                usage,
            } => Self::InvalidArguments {
                usage: usage.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // io::Error is not Clone, keep its message
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// An error plus the operator-facing guidance shown with it.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: LauncherError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: LauncherError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with operator guidance.
///
/// Typed [`LauncherError`]s get specific suggestions; I/O errors are mapped by
/// kind; everything else is shown with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(launcher_error) = error.downcast_ref::<LauncherError>() {
        return create_error_context(launcher_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(LauncherError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion(match cfg!(windows) {
                    true => "Run as Administrator or check the install directory permissions",
                    false => "Check the install directory permissions with 'ls -la'",
                })
                .with_details("The launcher must be able to write next to its own executable");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(LauncherError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(LauncherError::Other {
        message,
    })
}

fn create_error_context(error: LauncherError) -> ErrorContext {
    match &error {
        LauncherError::NetworkError { .. } | LauncherError::FormatError { .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion("Check your internet connection and the update_url in launchkit.toml")
                .with_details("The launcher keeps working normally; only the update check was skipped")
        }

        LauncherError::DownloadError { url, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Try again later or download the new version manually from {url}"
            ))
            .with_details("The partial download was removed"),

        LauncherError::FileLockTimeout { path, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Close the launcher completely (including the tray icon), then run the update again. Target: {path}"
            ))
            .with_details("No changes were made to the installed version"),

        LauncherError::BackupFailed { path, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Check permissions next to {path} and retry the update"))
            .with_details("The installed version was not modified"),

        LauncherError::SwapFailure { target, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("The previous version was restored at {target}"))
            .with_details("The update was not applied"),

        LauncherError::RollbackFailed { backup, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Restore the previous version manually by copying {backup} over the launcher executable"
            ))
            .with_details("Both the update and the automatic restore failed"),

        LauncherError::RelaunchFailure { path, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Start the launcher manually: {path}"))
            .with_details("The update itself was installed correctly"),

        LauncherError::UpdaterNotFound { staged, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "The new version was downloaded to {staged}. Close the launcher, replace the old executable with it, then start it again"
            )),

        LauncherError::UpdaterLaunchFailed { staged, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "The new version was downloaded to {staged}. You can replace the old executable manually"
            )),

        LauncherError::AlreadyRunning { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Look for the launcher icon in the system tray"),

        LauncherError::ConfigError { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Fix the TOML syntax in launchkit.toml or delete it to use defaults"),

        _ => ErrorContext::new(error.clone()),
    }
}
