//! Flattening zip extraction for release archives.
//!
//! Every entry is reduced to its base name and written directly into the
//! destination directory. Directory components inside entry names are
//! discarded, which is what keeps `../` and absolute entry names from
//! escaping the destination. Entries whose base name is empty or starts with
//! `.` are skipped.
//!
//! This is a narrow policy for the portable release archive, which ships a
//! handful of files. It is not a general-purpose extractor: extending it to
//! preserve directory structure would reopen the traversal problem the
//! flattening closes.

use crate::core::{Result, UpdateError};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

/// What an extraction wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Files written, in archive order.
    pub files: Vec<PathBuf>,
    /// Entry names that were skipped.
    pub skipped: Vec<String>,
}

/// Extracts release archives into a single flat directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Create an extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extract `archive_path` into `dest_dir`.
    ///
    /// `dest_dir` must already exist; the caller creates it clean beforehand
    /// and removes it afterwards. Existing files with the same name are
    /// truncated. When a directory entry and a file entry flatten to the same
    /// name, the file is kept. This is blocking I/O; async callers should run it on
    /// `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Io`] if the archive cannot be opened or any entry
    ///   fails to copy (the whole extraction stops)
    /// - [`UpdateError::CorruptArchive`] if the zip container cannot be parsed
    pub fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<ExtractionReport> {
        debug!("Extracting {} into {}", archive_path.display(), dest_dir.display());

        let file = File::open(archive_path).map_err(|e| UpdateError::io("open", archive_path, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| UpdateError::CorruptArchive {
            path: archive_path.to_path_buf(),
            source: e,
        })?;

        let mut report = ExtractionReport::default();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| UpdateError::CorruptArchive {
                path: archive_path.to_path_buf(),
                source: e,
            })?;

            let entry_name = entry.name().to_string();
            let Some(base_name) = entry_base_name(&entry_name) else {
                warn!("Skipping archive entry {:?}", entry_name);
                report.skipped.push(entry_name);
                continue;
            };
            let out_path = dest_dir.join(base_name);

            if entry.is_dir() {
                // `FKey/` next to `FKey/FKey` flattens onto the same name; the file wins
                if out_path.is_file() {
                    debug!("Directory entry {:?} collides with a file", entry_name);
                } else {
                    fs::create_dir_all(&out_path)
                        .map_err(|e| UpdateError::io("create directory", &out_path, e))?;
                }
                continue;
            }

            if out_path.is_dir() {
                fs::remove_dir(&out_path)
                    .map_err(|e| UpdateError::io("replace directory", &out_path, e))?;
            }

            let mut out_file = open_truncated(&out_path, entry.unix_mode())
                .map_err(|e| UpdateError::io("create", &out_path, e))?;
            io::copy(&mut entry, &mut out_file)
                .map_err(|e| UpdateError::io("extract", &out_path, e))?;

            debug!("Extracted {:?} -> {}", entry_name, out_path.display());
            report.files.push(out_path);
        }

        Ok(report)
    }
}

/// The file name an entry is written under, or `None` if it must be skipped.
///
/// Both `/` and `\` count as separators regardless of host, since archives
/// built on Windows may use either. Names containing `:` are rejected so a
/// drive-relative name like `C:evil.exe` can never be joined onto the
/// destination.
pub(crate) fn entry_base_name(name: &str) -> Option<&str> {
    let base = name.trim_end_matches(['/', '\\']).rsplit(['/', '\\']).next()?;

    if base.is_empty() || base.starts_with('.') || base.contains(':') || base.contains('\0') {
        None
    } else {
        Some(base)
    }
}

#[cfg(unix)]
fn open_truncated(path: &Path, mode: Option<u32>) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    // Keep only permission bits; setuid/setgid from an archive are dropped
    options.mode(mode.map_or(0o644, |m| m & 0o777));
    options.open(path)
}

#[cfg(not(unix))]
fn open_truncated(path: &Path, _mode: Option<u32>) -> io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}
