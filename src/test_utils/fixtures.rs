//! Test fixtures for release archives and executables

use anyhow::{Context, Result};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Clone, Debug)]
enum ZipEntry {
    File {
        name: String,
        data: Vec<u8>,
        mode: Option<u32>,
    },
    Dir {
        name: String,
    },
}

/// Builder for zip archives shaped like (or unlike) a release package
#[derive(Clone, Debug, Default)]
pub struct ZipFixture {
    entries: Vec<ZipEntry>,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The portable release layout: the executable plus a readme
    pub fn portable(product: &str) -> Self {
        Self::new()
            .executable(&format!("{product}.exe"), b"new windows build")
            .executable(product, b"#!/bin/sh\necho new build\n")
            .file("README.txt", b"release notes")
    }

    /// Add a regular file entry
    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(ZipEntry::File {
            name: name.to_string(),
            data: data.to_vec(),
            mode: None,
        });
        self
    }

    /// Add a file entry with unix mode 0755
    pub fn executable(self, name: &str, data: &[u8]) -> Self {
        self.file_with_mode(name, data, 0o755)
    }

    /// Add a file entry with explicit unix permissions
    pub fn file_with_mode(mut self, name: &str, data: &[u8], mode: u32) -> Self {
        self.entries.push(ZipEntry::File {
            name: name.to_string(),
            data: data.to_vec(),
            mode: Some(mode),
        });
        self
    }

    /// Add a directory entry
    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push(ZipEntry::Dir {
            name: name.to_string(),
        });
        self
    }

    /// Encode the archive in memory
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            match entry {
                ZipEntry::File {
                    name,
                    data,
                    mode,
                } => {
                    let mut options = SimpleFileOptions::default();
                    if let Some(mode) = mode {
                        options = options.unix_permissions(*mode);
                    }
                    zip.start_file(name.as_str(), options)
                        .with_context(|| format!("Failed to start entry {name}"))?;
                    zip.write_all(data)?;
                }
                ZipEntry::Dir {
                    name,
                } => {
                    zip.add_directory(name.as_str(), SimpleFileOptions::default())
                        .with_context(|| format!("Failed to add directory {name}"))?;
                }
            }
        }

        Ok(zip.finish().context("Failed to finish archive")?.into_inner())
    }

    /// Write the archive to `path`
    pub fn write_to(&self, path: &Path) -> Result<PathBuf> {
        fs::write(path, self.to_bytes()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path.to_path_buf())
    }
}

/// Create a stand-in for the installed executable
pub fn fake_executable(dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(path)
}
