//! Streaming download of the new executable.
//!
//! The body is streamed into a temporary file in the destination directory
//! and only renamed to its final name once the transfer completed. A failed
//! or interrupted download therefore never leaves a file that looks like a
//! finished artifact.

use crate::constants::DEFAULT_STAGED_NAME;
use crate::core::LauncherError;
use futures::StreamExt;
use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Downloads release artifacts over HTTP(S).
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> Result<Self, LauncherError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("launchkit/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LauncherError::DownloadError {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
        })
    }

    /// Stream `url` into `dest_dir` and return the path of the finished file.
    ///
    /// `on_progress(received, total)` is called after every chunk. `total` is
    /// zero when the server sent no `Content-Length`.
    ///
    /// # Errors
    ///
    /// Any network or I/O failure becomes [`LauncherError::DownloadError`].
    /// The partially written temporary file is removed in that case.
    pub async fn download<F>(
        &self,
        url: &str,
        dest_dir: &Path,
        mut on_progress: F,
    ) -> Result<PathBuf, LauncherError>
    where
        F: FnMut(u64, u64),
    {
        let fail = |reason: String| LauncherError::DownloadError {
            url: url.to_string(),
            reason,
        };

        let dest = dest_dir.join(staged_file_name(url));
        info!("Downloading {url} to {}", dest.display());

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| fail(format!("cannot create {}: {e}", dest_dir.display())))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| fail(e.to_string()))?;
        let total = response.content_length().unwrap_or(0);

        // Dropped (and deleted) on every early return below
        let staging = NamedTempFile::new_in(dest_dir)
            .map_err(|e| fail(format!("cannot create temporary file: {e}")))?;
        let std_file = staging.reopen().map_err(|e| fail(e.to_string()))?;
        let mut file = tokio::fs::File::from_std(std_file);

        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fail(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| fail(e.to_string()))?;
            received += chunk.len() as u64;
            on_progress(received, total);
        }

        if total > 0 && received != total {
            warn!("Download of {url} ended after {received} of {total} bytes");
            return Err(fail(format!("connection closed after {received} of {total} bytes")));
        }

        file.flush().await.map_err(|e| fail(e.to_string()))?;
        file.sync_all().await.map_err(|e| fail(e.to_string()))?;
        drop(file);

        staging
            .persist(&dest)
            .map_err(|e| fail(format!("cannot move download into place: {}", e.error)))?;

        debug!("Downloaded {received} bytes to {}", dest.display());
        Ok(dest)
    }
}

/// File name for a download, taken from the last URL path segment.
///
/// Query strings and fragments are ignored. When the segment is empty, or on
/// platforms with an executable suffix does not carry it, a fixed name is
/// used instead.
pub fn staged_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let candidate = path.rsplit('/').next().unwrap_or_default();

    let usable = !candidate.is_empty()
        && candidate != "."
        && candidate != ".."
        && !candidate.contains('\\')
        && !candidate.contains(':')
        && (EXE_SUFFIX.is_empty() || candidate.to_ascii_lowercase().ends_with(EXE_SUFFIX));

    if usable {
        candidate.to_string()
    } else {
        format!("{DEFAULT_STAGED_NAME}{EXE_SUFFIX}")
    }
}
