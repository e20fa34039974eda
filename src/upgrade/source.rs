//! Discovery of the latest published version.
//!
//! The latest version is read from a static, unauthenticated text file
//! (by default `VERSION` on the release branch) rather than a release API,
//! so checks are not subject to API rate limits.

use crate::config::UpdaterConfig;
use crate::constants::VERSION_FETCH_TIMEOUT;
use crate::core::{Result, UpdateError};
use reqwest::StatusCode;
use std::future::Future;
use tracing::debug;

/// Something that can report the latest published version identifier.
///
/// The returned string is trimmed but otherwise unvalidated; leniency is
/// [`is_newer`](super::is_newer)'s job.
pub trait VersionSource: Send + Sync {
    /// Fetch the latest version identifier.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Network`] on transport failure or timeout
    /// - [`UpdateError::NotFound`] when no version file is published
    /// - [`UpdateError::Server`] for any other non-success status
    fn fetch_latest(&self) -> impl Future<Output = Result<String>> + Send;
}

/// [`VersionSource`] reading a plain-text version file over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVersionSource {
    client: reqwest::Client,
    url: String,
}

impl HttpVersionSource {
    /// Build a source for the version URL described by `config`.
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        Self::with_url(config.version_url(), &config.user_agent)
    }

    /// Build a source for an explicit URL.
    pub fn with_url(url: impl Into<String>, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(VERSION_FETCH_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| UpdateError::network("version check setup", e))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The URL this source reads from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl VersionSource for HttpVersionSource {
    async fn fetch_latest(&self) -> Result<String> {
        debug!("Fetching latest version from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| UpdateError::network("version check", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpdateError::NotFound {
                what: format!("version file at {}", self.url),
            });
        }
        if !status.is_success() {
            return Err(UpdateError::Server {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| UpdateError::network("version check", e))?;
        let version = body.trim().to_string();
        debug!("Published version: {}", version);
        Ok(version)
    }
}
