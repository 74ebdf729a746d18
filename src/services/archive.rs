//! Archive unpacking and archive fingerprints.
//!
//! `.zip` is read with the `zip` crate, `.7z` with `sevenz-rust`; every other
//! format goes through an external `7z` executable when one is installed.

use crate::error::{ModError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors from the unpack capability. Corrupt and unsupported archives are
/// told apart from plain I/O failures.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unsupported archive format: {0}")]
    Unsupported(Utf8PathBuf),

    #[error("Corrupt archive {path}: {message}")]
    Corrupt { path: Utf8PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    fn io(path: &Utf8Path, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Utf8Path, message: impl ToString) -> Self {
        ArchiveError::Corrupt {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Unpacks an archive into an existing, empty directory.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &Utf8Path, dest: &Utf8Path) -> std::result::Result<(), ArchiveError>;
}

/// Default extractor backed by `zip`, `sevenz-rust` and the `7z` CLI.
#[derive(Debug, Clone)]
pub struct NativeExtractor {
    seven_zip: String,
}

impl Default for NativeExtractor {
    fn default() -> Self {
        Self {
            seven_zip: "7z".to_string(),
        }
    }
}

impl NativeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different 7-Zip executable for formats without a native reader.
    pub fn with_seven_zip(mut self, program: impl Into<String>) -> Self {
        self.seven_zip = program.into();
        self
    }

    fn extract_zip(&self, path: &Utf8Path, dest: &Utf8Path) -> std::result::Result<(), ArchiveError> {
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| ArchiveError::corrupt(path, e))?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| ArchiveError::corrupt(path, e))?;
            let Some(enclosed) = entry.enclosed_name() else {
                tracing::warn!("Skipping unsafe zip entry {:?} in {}", entry.name(), path);
                continue;
            };

            let out_path = dest.as_std_path().join(enclosed);
            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| ArchiveError::io(dest, e))?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| ArchiveError::io(dest, e))?;
            }
            let mut out_file = File::create(&out_path).map_err(|e| ArchiveError::io(dest, e))?;
            io::copy(&mut entry, &mut out_file).map_err(|e| ArchiveError::corrupt(path, e))?;
        }

        Ok(())
    }

    fn extract_7z(&self, path: &Utf8Path, dest: &Utf8Path) -> std::result::Result<(), ArchiveError> {
        sevenz_rust::decompress_file(path.as_std_path(), dest.as_std_path())
            .map_err(|e| ArchiveError::corrupt(path, e))
    }

    /// `Ok(false)` when the executable is not installed.
    fn extract_with_cli(
        &self,
        path: &Utf8Path,
        dest: &Utf8Path,
    ) -> std::result::Result<bool, ArchiveError> {
        let output = Command::new(&self.seven_zip)
            .arg("x")
            .arg("-y")
            .arg(format!("-o{dest}"))
            .arg(path.as_str())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ArchiveError::io(path, e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchiveError::corrupt(path, stderr.trim()));
        }
        Ok(true)
    }
}

impl ArchiveExtractor for NativeExtractor {
    fn extract(&self, archive: &Utf8Path, dest: &Utf8Path) -> std::result::Result<(), ArchiveError> {
        let extension = archive.extension().map(str::to_ascii_lowercase);
        tracing::debug!("Extracting {} into {}", archive, dest);

        match extension.as_deref() {
            Some("zip") => self.extract_zip(archive, dest),
            Some("7z") => self.extract_7z(archive, dest),
            _ => {
                if self.extract_with_cli(archive, dest)? {
                    Ok(())
                } else {
                    Err(ArchiveError::Unsupported(archive.to_path_buf()))
                }
            }
        }
    }
}

/// blake3 hex digest of a file's bytes.
pub fn hash_file(path: &Utf8Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| ModError::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).map_err(|e| ModError::io(path, e))?;
    Ok(hasher.finalize().to_hex().to_string())
}
