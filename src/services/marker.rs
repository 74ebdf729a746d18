//! Sidecar record stored next to an installed mod.

use crate::error::{ModError, Result};
use crate::models::mod_record::Mod;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

pub const MARKER_FILE: &str = "w3mm.json";

pub fn marker_path(dir: &Utf8Path) -> Utf8PathBuf {
    dir.join(MARKER_FILE)
}

/// Write `record` as pretty JSON into `dir`, creating the directory.
pub fn write_marker(record: &Mod, dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let path = marker_path(dir);
    fs::create_dir_all(dir).map_err(|e| ModError::io(dir, e))?;

    let json = record.to_record().map_err(|source| ModError::Marker {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|e| ModError::io(&path, e))?;

    tracing::debug!("Wrote marker {}", path);
    Ok(path)
}

/// Read the record stored in `dir`. `Ok(None)` when there is no marker.
pub fn read_marker(dir: &Utf8Path) -> Result<Option<Mod>> {
    let path = marker_path(dir);
    if !path.is_file() {
        return Ok(None);
    }

    let json = fs::read_to_string(&path).map_err(|e| ModError::io(&path, e))?;
    let record = Mod::from_record(&json).map_err(|source| ModError::Marker {
        path: path.clone(),
        source,
    })?;
    Ok(Some(record))
}
