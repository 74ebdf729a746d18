//! Directory predicates used by every tree walk.
//!
//! A directory is a **mod root** when its name starts with `mod` (or `~mod`,
//! a disabled mod), it is not inside a literal `dlc`/`dlcs` folder and it has
//! a non-empty `content` child. **Dlc roots** follow the same content rule
//! with dlc-style naming. An **ambiguous root** is a misnamed folder directly
//! below the search root that still carries content.
//!
//! Predicates return `Ok(false)` for "no match"; only I/O failures are errors.

use super::scanner::{LooseFileKind, classify_loose_file};
use super::walk::{is_content_dir, is_non_empty_dir, list_dir, relative_path};
use crate::error::Result;
use camino::Utf8Path;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

static MOD_ROOT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(~)?mod").expect("Invalid mod root regex"));

static DLC_FOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^dlcs?$").expect("Invalid dlc folder regex"));

/// Outcome of [`contains_valid_mod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// Something installable was found (`found`, `exhausted`) = (true, true).
    Found,
    /// The search limit was hit first: (false, false). Ask before going on.
    LimitReached,
    /// The whole tree was searched without a match: (false, true).
    Exhausted,
}

impl ProbeResult {
    pub fn found(&self) -> bool {
        matches!(self, ProbeResult::Found)
    }

    pub fn exhausted(&self) -> bool {
        !matches!(self, ProbeResult::LimitReached)
    }
}

fn dir_name(dir: &Utf8Path) -> Option<&str> {
    dir.file_name()
}

fn parent_is_dlc_folder(dir: &Utf8Path) -> bool {
    dir.parent()
        .and_then(Utf8Path::file_name)
        .is_some_and(|name| DLC_FOLDER_NAME.is_match(name))
}

/// A child named `content` (any case) exists and is non-empty.
pub fn contains_content_directory(dir: &Utf8Path) -> Result<bool> {
    for child in list_dir(dir)?.dirs {
        if is_content_dir(&child) && is_non_empty_dir(&child)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn is_mod_root(dir: &Utf8Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let Some(name) = dir_name(dir) else {
        return Ok(false);
    };
    if !MOD_ROOT_NAME.is_match(name) || parent_is_dlc_folder(dir) {
        return Ok(false);
    }
    contains_content_directory(dir)
}

pub fn is_dlc_root(dir: &Utf8Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let Some(name) = dir_name(dir) else {
        return Ok(false);
    };
    let name = name.to_ascii_lowercase();
    let dlc_named = name.starts_with("dlc")
        || (name.ends_with("dlc") && !name.starts_with("mod"))
        || (name.starts_with("mod") && parent_is_dlc_folder(dir));
    if !dlc_named {
        return Ok(false);
    }
    contains_content_directory(dir)
}

/// Misnamed package folder directly below `search_root`.
pub fn maybe_ambiguous_root(dir: &Utf8Path, search_root: &Utf8Path) -> Result<bool> {
    if dir.parent() != Some(search_root) || !dir.is_dir() {
        return Ok(false);
    }
    let listing = list_dir(dir)?;
    if listing.dirs.is_empty() {
        return Ok(false);
    }
    contains_content_directory(dir)
}

/// Any direct file of `dir` that the loose-file rules would collect.
fn has_loose_bin_file(dir: &Utf8Path, search_root: &Utf8Path) -> Result<bool> {
    Ok(list_dir(dir)?.files.iter().any(|file| {
        classify_loose_file(&relative_path(search_root, file)) != LooseFileKind::Ignored
    }))
}

/// Breadth-first probe for anything installable below `dir`.
///
/// Gives up with [`ProbeResult::LimitReached`] once more than `search_limit`
/// directories were enqueued without a match.
pub fn contains_valid_mod(dir: &Utf8Path, search_limit: usize) -> Result<ProbeResult> {
    let mut queue = VecDeque::from([dir.to_path_buf()]);
    let mut enqueued = 1usize;

    while let Some(check) = queue.pop_front() {
        if is_mod_root(&check)?
            || is_dlc_root(&check)?
            || maybe_ambiguous_root(&check, dir)?
            || has_loose_bin_file(&check, dir)?
        {
            tracing::debug!("Found installable data at {}", check);
            return Ok(ProbeResult::Found);
        }

        for child in list_dir(&check)?.dirs {
            if is_content_dir(&child) {
                continue;
            }
            enqueued += 1;
            if enqueued > search_limit {
                tracing::debug!("Search limit {} reached below {}", search_limit, dir);
                return Ok(ProbeResult::LimitReached);
            }
            queue.push_back(child);
        }
    }

    Ok(ProbeResult::Exhausted)
}
