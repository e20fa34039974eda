use crate::config::UpdaterConfig;
use crate::upgrade::version::{is_newer, strip_v_prefix};
use serde::{Deserialize, Serialize};

/// The outcome of one update check.
///
/// Built from a freshly fetched latest version and the configured current
/// version. Immutable once built; every uncached check produces a new one.
/// Serializes with the camelCase keys an embedding UI expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDecision {
    /// Whether `latest_version` is newer than `current_version`.
    pub available: bool,
    /// Version of the running application, as configured.
    pub current_version: String,
    /// Latest published version, always `v`-prefixed.
    pub latest_version: String,
    /// Where the release notes can be read.
    #[serde(rename = "releaseNotesURL")]
    pub release_notes_url: String,
    /// Where the release archive is downloaded from.
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    /// Release page, for display or opening in a browser.
    #[serde(rename = "releaseURL")]
    pub release_url: String,
    /// File name of the release archive.
    pub asset_name: String,
    /// Size of the release archive in bytes, when known.
    pub asset_size: Option<u64>,
}

impl UpdateDecision {
    /// Combine the configured current version with a fetched latest version.
    ///
    /// ```rust
    /// use fkey_updater::config::UpdaterConfig;
    /// use fkey_updater::upgrade::UpdateDecision;
    ///
    /// let config = UpdaterConfig::new("1.2.0");
    /// let decision = UpdateDecision::build(&config, "v1.3.0");
    /// assert!(decision.available);
    /// assert_eq!(decision.latest_version, "v1.3.0");
    /// assert_eq!(decision.asset_name, "FKey-v1.3.0-portable.zip");
    /// ```
    #[must_use]
    pub fn build(config: &UpdaterConfig, latest: &str) -> Self {
        let latest = strip_v_prefix(latest.trim());
        let current = strip_v_prefix(&config.current_version);
        let release_url = config.release_url(latest);

        Self {
            available: is_newer(current, latest),
            current_version: config.current_version.clone(),
            latest_version: format!("v{latest}"),
            release_notes_url: release_url.clone(),
            download_url: config.download_url(latest),
            release_url,
            asset_name: config.asset_name(latest),
            asset_size: None,
        }
    }

    /// The latest version without its `v` prefix.
    #[must_use]
    pub fn latest_version_number(&self) -> &str {
        strip_v_prefix(&self.latest_version)
    }

    /// One-line human summary, used by the CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.available {
            format!("Update available: {} -> {}", self.current_version, self.latest_version)
        } else {
            format!("You are on the latest version ({})", self.current_version)
        }
    }
}
