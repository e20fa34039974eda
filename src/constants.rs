//! Global constants used throughout the updater.
//!
//! Timeouts, buffer sizes and the temp-directory naming scheme live here so
//! the pipeline stages and the generated scripts agree on them.

use std::time::Duration;

/// Timeout for fetching the published version file (10 seconds).
pub const VERSION_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for downloading a release artifact (5 minutes).
///
/// Covers the whole transfer, not just the connect phase.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Size of each write while streaming an artifact to disk (32 KiB).
pub const DOWNLOAD_CHUNK_SIZE: usize = 32 * 1024;

/// Default time-to-live of a cached update decision, in seconds (24 hours).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Prefix shared by every file and directory the updater puts in the
/// system temp directory.
pub const TEMP_PREFIX: &str = "fkey-update";

/// Name of the scratch directory the archive is extracted into.
pub const EXTRACT_DIR_NAME: &str = "fkey-update-extract";

/// Base name of the generated replacement script (extension is per platform).
pub const SCRIPT_BASE_NAME: &str = "fkey-updater";

/// Seconds the replacement script waits before touching the old executable.
pub const SCRIPT_INITIAL_DELAY_SECS: u32 = 2;

/// Maximum delete attempts the replacement script makes on a locked executable.
pub const SCRIPT_MAX_DELETE_ATTEMPTS: u32 = 60;

/// Seconds between delete attempts inside the replacement script.
pub const SCRIPT_RETRY_DELAY_SECS: u32 = 1;

/// Log the replacement script appends failures to, next to the script itself.
pub const SCRIPT_LOG_NAME: &str = "fkey-updater.log";
