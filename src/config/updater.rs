//! Updater configuration.
//!
//! Everything the pipeline needs from the embedding application is supplied
//! here at construction time: the running version, the release coordinates,
//! the check interval and the user agent. Nothing is read from the environment.
//!
//! # TOML Example
//!
//! ```toml
//! product = "FKey"
//! owner = "miken90"
//! repo = "fkey"
//! branch = "main"
//! check_interval_secs = 86400
//! user_agent = "FKey-Updater/1.0"
//! target_executable = "/opt/fkey/FKey"
//! ```

use crate::constants::DEFAULT_CHECK_INTERVAL_SECS;
use crate::core::{Result, UpdateError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Configuration for the update pipeline.
///
/// URL templates accept the placeholders `{owner}`, `{repo}`, `{branch}`,
/// `{product}` and `{version}`. `{version}` is always substituted without a
/// leading `v`; templates add the prefix themselves where the release layout
/// needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Product name used in asset names (e.g., "FKey").
    #[serde(default = "default_product")]
    pub product: String,

    /// Repository owner on the release host.
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Repository name on the release host.
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Branch holding the published `VERSION` file.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Version of the running application.
    ///
    /// Usually left out of configuration files; the binary supplies its own
    /// version when the file does not pin one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_version: String,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// How long a cached decision stays fresh, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Where the latest version identifier is published.
    #[serde(default = "default_version_url_template")]
    pub version_url_template: String,

    /// Where the release archive for a version is downloaded from.
    #[serde(default = "default_download_url_template")]
    pub download_url_template: String,

    /// Human-facing release page for a version.
    #[serde(default = "default_release_url_template")]
    pub release_url_template: String,

    /// File name of the release archive for a version.
    #[serde(default = "default_asset_name_template")]
    pub asset_name_template: String,

    /// Executable the install step replaces.
    ///
    /// Unset means the running executable, which is right when the
    /// application embeds the updater and wrong for the standalone binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_executable: Option<PathBuf>,
}

fn default_product() -> String {
    "FKey".to_string()
}

fn default_owner() -> String {
    "miken90".to_string()
}

fn default_repo() -> String {
    "fkey".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_user_agent() -> String {
    "FKey-Updater/1.0".to_string()
}

const fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_version_url_template() -> String {
    "https://raw.githubusercontent.com/{owner}/{repo}/{branch}/VERSION".to_string()
}

fn default_download_url_template() -> String {
    "https://github.com/{owner}/{repo}/releases/download/v{version}/{product}-v{version}-portable.zip"
        .to_string()
}

fn default_release_url_template() -> String {
    "https://github.com/{owner}/{repo}/releases/tag/v{version}".to_string()
}

fn default_asset_name_template() -> String {
    "{product}-v{version}-portable.zip".to_string()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            owner: default_owner(),
            repo: default_repo(),
            branch: default_branch(),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            user_agent: default_user_agent(),
            check_interval_secs: default_check_interval(),
            version_url_template: default_version_url_template(),
            download_url_template: default_download_url_template(),
            release_url_template: default_release_url_template(),
            asset_name_template: default_asset_name_template(),
            target_executable: None,
        }
    }
}

impl UpdaterConfig {
    /// Create a configuration with the default release coordinates and the
    /// given running version.
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            ..Self::default()
        }
    }

    /// Override the release coordinates.
    #[must_use]
    pub fn with_repository(
        mut self,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        self.owner = owner.into();
        self.repo = repo.into();
        self.branch = branch.into();
        self
    }

    /// Override the version file location (mostly useful for mirrors and tests).
    #[must_use]
    pub fn with_version_url_template(mut self, template: impl Into<String>) -> Self {
        self.version_url_template = template.into();
        self
    }

    /// Replace `path` on install instead of the running executable.
    #[must_use]
    pub fn with_target_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_executable = Some(path.into());
        self
    }

    /// The cache TTL as a [`Duration`].
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// URL of the published version file.
    #[must_use]
    pub fn version_url(&self) -> String {
        self.render(&self.version_url_template, "")
    }

    /// Download URL of the release archive for `version`.
    #[must_use]
    pub fn download_url(&self, version: &str) -> String {
        self.render(&self.download_url_template, version)
    }

    /// Release page URL for `version`.
    #[must_use]
    pub fn release_url(&self, version: &str) -> String {
        self.render(&self.release_url_template, version)
    }

    /// Archive file name for `version`.
    #[must_use]
    pub fn asset_name(&self, version: &str) -> String {
        self.render(&self.asset_name_template, version)
    }

    fn render(&self, template: &str, version: &str) -> String {
        template
            .replace("{owner}", &self.owner)
            .replace("{repo}", &self.repo)
            .replace("{branch}", &self.branch)
            .replace("{product}", &self.product)
            .replace("{version}", version.strip_prefix('v').unwrap_or(version))
    }

    /// Load a configuration file, or the defaults when it does not exist.
    ///
    /// `current_version` is used when the file does not pin one.
    pub async fn load_or_default(path: &Path, current_version: &str) -> Result<Self> {
        let exists = fs::try_exists(path)
            .await
            .map_err(|e| UpdateError::io("inspect configuration", path, e))?;
        if exists {
            let mut config = Self::load_from(path).await?;
            if config.current_version.is_empty() {
                config.current_version = current_version.to_string();
            }
            Ok(config)
        } else {
            Ok(Self::new(current_version))
        }
    }

    /// Load a configuration from a TOML file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| UpdateError::io("read configuration", path, e))?;

        toml::from_str(&content).map_err(|e| UpdateError::Config {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Write the configuration as TOML, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdateError::io("create configuration directory", parent, e))?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| UpdateError::Config {
            message: format!("failed to serialize configuration: {e}"),
        })?;

        fs::write(path, content).await.map_err(|e| UpdateError::io("write configuration", path, e))
    }

    /// Default location of the updater configuration file.
    ///
    /// - Unix/macOS: `~/.fkey/updater.toml`
    /// - Windows: `%LOCALAPPDATA%\fkey\updater.toml`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| UpdateError::Config {
                    message: "Unable to determine local data directory".to_string(),
                })?
                .join("fkey")
        } else {
            dirs::home_dir()
                .ok_or_else(|| UpdateError::Config {
                    message: "Unable to determine home directory".to_string(),
                })?
                .join(".fkey")
        };

        Ok(config_dir.join("updater.toml"))
    }
}
