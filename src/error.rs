//! Error taxonomy for classification, extraction and installation.
//!
//! Classification predicates never fail for "not a match"; only real I/O
//! problems become errors. [`ModError::InvalidPath`] is the recoverable,
//! caller-visible "nothing installable here" condition.

use camino::Utf8PathBuf;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a path did not yield any installable mod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    InvalidMod,
    InvalidArchive,
    StoppedSearching,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::InvalidMod => "Invalid mod",
            InvalidReason::InvalidArchive => "Invalid archive",
            InvalidReason::StoppedSearching => "Stopped searching for mod",
        };
        f.write_str(text)
    }
}

/// Errors raised by the mod engine.
#[derive(Error, Debug)]
pub enum ModError {
    #[error("{reason}: {path}")]
    InvalidPath {
        path: Utf8PathBuf,
        reason: InvalidReason,
    },

    #[error("Unexpected input in {path}: {message}")]
    UnexpectedInput { path: Utf8PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),

    #[error("Invalid mod record at {path}: {source}")]
    Marker {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{filename} must be marked as mod or dlc before installing")]
    Unresolved { filename: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Worker(String),
}

impl ModError {
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        ModError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(path: impl Into<Utf8PathBuf>, reason: InvalidReason) -> Self {
        ModError::InvalidPath {
            path: path.into(),
            reason,
        }
    }

    /// The reason when this is an "invalid path" condition.
    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self {
            ModError::InvalidPath { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ModError::Cancelled)
    }
}

impl From<walkdir::Error> for ModError {
    fn from(err: walkdir::Error) -> Self {
        let path = err
            .path()
            .and_then(|p| Utf8PathBuf::from_path_buf(p.to_path_buf()).ok())
            .unwrap_or_default();
        ModError::io(path, std::io::Error::from(err))
    }
}

pub type Result<T> = std::result::Result<T, ModError>;
