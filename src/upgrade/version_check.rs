use crate::core::LauncherError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Remote description of the latest published build.
///
/// Fetched from the configured `update_url`; never persisted. Every field
/// defaults to the empty string so a descriptor with missing keys still
/// parses, and an empty `version` simply means "no update".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub changelog: String,
}

impl VersionDescriptor {
    /// Human-facing release page derived from the download URL.
    ///
    /// Release assets usually live under `<release page>/download/<file>`, so
    /// everything from `/download/` on is dropped. URLs without that segment
    /// are returned unchanged.
    pub fn release_page_url(&self) -> &str {
        match self.download_url.find("/download/") {
            Some(idx) => &self.download_url[..idx],
            None => &self.download_url,
        }
    }
}

/// Whether `remote` describes an update relative to `current`.
///
/// This is a literal comparison: any non-empty remote version that is not
/// byte-equal to the current one counts, including an older one. There is
/// deliberately no version ordering here.
pub fn is_update_available(current: &str, remote: &VersionDescriptor) -> bool {
    !remote.version.is_empty() && remote.version != current
}

/// Fetches the remote version descriptor.
///
/// # Examples
///
/// ```rust,no_run
/// use launchkit::upgrade::UpdateChecker;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let checker = UpdateChecker::new(
///     "https://example.com/version.json",
///     "1.0.0",
///     Duration::from_secs(5),
/// )?;
/// if let Some(descriptor) = checker.check_for_update().await {
///     println!("{} is available", descriptor.version);
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpdateChecker {
    client: reqwest::Client,
    url: String,
    current_version: String,
}

impl UpdateChecker {
    pub fn new(
        url: impl Into<String>,
        current_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LauncherError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("launchkit/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LauncherError::NetworkError {
                operation: "build HTTP client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            current_version: current_version.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// GET the descriptor and parse it.
    ///
    /// # Errors
    ///
    /// [`LauncherError::NetworkError`] when the host is unreachable, the
    /// request times out or the server answers with an error status.
    /// [`LauncherError::FormatError`] when the body is not a descriptor.
    pub async fn fetch_remote(&self) -> Result<VersionDescriptor, LauncherError> {
        debug!("Fetching version descriptor from {}", self.url);

        let network_error = |e: reqwest::Error| LauncherError::NetworkError {
            operation: format!("fetch {}", self.url),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(network_error)?;

        let body = response.bytes().await.map_err(network_error)?;

        serde_json::from_slice(&body).map_err(|e| LauncherError::FormatError {
            reason: e.to_string(),
        })
    }

    /// The descriptor of an available update, if any.
    ///
    /// Network and format failures are logged and reported as "no update" so
    /// that a failed check never gets in the way of normal use.
    pub async fn check_for_update(&self) -> Option<VersionDescriptor> {
        match self.fetch_remote().await {
            Ok(descriptor) if is_update_available(&self.current_version, &descriptor) => {
                info!("Update available: {} -> {}", self.current_version, descriptor.version);
                Some(descriptor)
            }
            Ok(_) => {
                debug!("Already on the published version {}", self.current_version);
                None
            }
            Err(e) => {
                warn!("Update check failed: {e}");
                None
            }
        }
    }
}

/// Two-line summary for `launchkit check`.
pub fn format_version_info(current: &str, latest: Option<&VersionDescriptor>) -> String {
    match latest {
        Some(descriptor) if is_update_available(current, descriptor) => format!(
            "Current version: {current}\nLatest version:  {} (update available)",
            descriptor.version
        ),
        _ => format!("Current version: {current} (up to date)"),
    }
}
