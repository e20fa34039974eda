//! Streaming download of release artifacts.
//!
//! Artifacts are streamed straight to a file in the temp directory, never
//! buffered whole in memory. The destination name is the last segment of the
//! download URL behind the updater's temp prefix, e.g.
//! `$TMP/fkey-update-FKey-v1.3.0-portable.zip`.
//!
//! A failed transfer leaves the partial file where it is; cleanup is the
//! caller's decision.

use crate::constants::{DOWNLOAD_CHUNK_SIZE, DOWNLOAD_TIMEOUT, TEMP_PREFIX};
use crate::core::{Result, UpdateError};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A downloaded archive on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    /// Where the archive was written.
    pub path: PathBuf,
    /// Size announced by the server, if it sent a content length.
    pub total_bytes: Option<u64>,
    /// Bytes actually written.
    pub downloaded_bytes: u64,
}

/// Downloads release archives with progress reporting.
#[derive(Debug, Clone)]
pub struct ArtifactDownloader {
    client: reqwest::Client,
    temp_dir: PathBuf,
}

impl ArtifactDownloader {
    /// Create a downloader writing into the system temp directory.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| UpdateError::network("download setup", e))?;

        Ok(Self {
            client,
            temp_dir: std::env::temp_dir(),
        })
    }

    /// Write downloads into `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Where a download of `url` will be written.
    #[must_use]
    pub fn destination_for(&self, url: &str) -> PathBuf {
        self.temp_dir.join(format!("{TEMP_PREFIX}-{}", file_name_from_url(url)))
    }

    /// Download `url` to the temp directory.
    ///
    /// `on_progress` is called after every chunk written with
    /// `(bytes_downloaded, total_bytes)`. `total_bytes` is `None` when the
    /// server did not announce a length; treat that as indeterminate, not zero.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Network`] if the request cannot be sent
    /// - [`UpdateError::Server`] on a non-success status
    /// - [`UpdateError::Io`] if the file cannot be written or the body stream
    ///   fails midway (the partial file is left in place)
    pub async fn download<F>(&self, url: &str, mut on_progress: Option<F>) -> Result<DownloadedArtifact>
    where
        F: FnMut(u64, Option<u64>),
    {
        debug!("Downloading {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::network("download", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Server {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        let path = self.destination_for(url);
        let mut file =
            File::create(&path).await.map_err(|e| UpdateError::io("create", &path, e))?;

        let mut downloaded_bytes = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| UpdateError::io("download", &path, std::io::Error::other(e)))?
        {
            for piece in chunk.chunks(DOWNLOAD_CHUNK_SIZE) {
                file.write_all(piece).await.map_err(|e| UpdateError::io("write", &path, e))?;
                downloaded_bytes += piece.len() as u64;
                if let Some(callback) = on_progress.as_mut() {
                    callback(downloaded_bytes, total_bytes);
                }
            }
        }

        file.flush().await.map_err(|e| UpdateError::io("write", &path, e))?;

        info!("Downloaded {} bytes to {}", downloaded_bytes, path.display());
        Ok(DownloadedArtifact {
            path,
            total_bytes,
            downloaded_bytes,
        })
    }

    /// Download without progress reporting.
    pub async fn download_quiet(&self, url: &str) -> Result<DownloadedArtifact> {
        self.download(url, None::<fn(u64, Option<u64>)>).await
    }

    /// Directory downloads are written to.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

/// Last non-empty path segment of `url`, ignoring query and fragment.
///
/// Falls back to `download` when the URL has no usable segment. Characters
/// that are not safe in file names on every platform are replaced with `_`.
fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let without_scheme = without_query.split_once("://").map_or(without_query, |(_, rest)| rest);
    let segment = without_scheme
        .split_once('/')
        .and_then(|(_, path)| path.rsplit('/').find(|s| !s.is_empty()))
        .unwrap_or_default();

    let name: String = segment
        .chars()
        .map(|c| match c {
            '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if name.is_empty() || name.starts_with('.') {
        "download".to_string()
    } else {
        name
    }
}
