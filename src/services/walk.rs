//! Directory listing helpers shared by the classifier, scanner and builder.

use crate::error::{ModError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

/// Name of the game's bundled-data directory.
pub const CONTENT_DIR: &str = "content";

/// Immediate children of a directory, each list in byte-wise name order.
#[derive(Debug, Default)]
pub struct DirListing {
    pub dirs: Vec<Utf8PathBuf>,
    pub files: Vec<Utf8PathBuf>,
}

/// List a directory's children. Entries with non UTF-8 names are skipped.
pub fn list_dir(dir: &Utf8Path) -> Result<DirListing> {
    let mut listing = DirListing::default();
    let entries = fs::read_dir(dir).map_err(|e| ModError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| ModError::io(dir, e))?;
        let path = match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(path) => path,
            Err(path) => {
                tracing::warn!("Skipping non UTF-8 path: {:?}", path);
                continue;
            }
        };
        let file_type = entry.file_type().map_err(|e| ModError::io(&path, e))?;
        if file_type.is_dir() {
            listing.dirs.push(path);
        } else if file_type.is_file() {
            listing.files.push(path);
        }
    }

    listing.dirs.sort();
    listing.files.sort();
    Ok(listing)
}

/// True when the directory has at least one entry.
pub fn is_non_empty_dir(dir: &Utf8Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).map_err(|e| ModError::io(dir, e))?;
    Ok(entries.next().is_some())
}

pub fn is_content_dir(dir: &Utf8Path) -> bool {
    dir.file_name()
        .is_some_and(|name| name.eq_ignore_ascii_case(CONTENT_DIR))
}

/// `/`-separated path of `path` relative to `root`.
pub fn relative_path(root: &Utf8Path, path: &Utf8Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every regular file below `dir`, in name order.
pub fn files_below(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match Utf8PathBuf::from_path_buf(entry.into_path()) {
            Ok(path) => files.push(path),
            Err(path) => tracing::warn!("Skipping non UTF-8 path: {:?}", path),
        }
    }
    Ok(files)
}

/// Total byte size of every regular file below `dir`.
pub fn dir_size(dir: &Utf8Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

pub fn file_size(path: &Utf8Path) -> Result<u64> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|e| ModError::io(path, e))
}

/// Cooperative cancellation flag shared between a scan and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Error out when cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ModError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_temp() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    #[test]
    fn test_list_dir_sorted_and_split() {
        let (_temp, root) = utf8_temp();
        fs::create_dir(root.join("b")).unwrap();
        fs::create_dir(root.join("a")).unwrap();
        fs::write(root.join("z.txt"), "z").unwrap();
        fs::write(root.join("y.txt"), "y").unwrap();

        let listing = list_dir(&root).unwrap();
        assert_eq!(listing.dirs, vec![root.join("a"), root.join("b")]);
        assert_eq!(listing.files, vec![root.join("y.txt"), root.join("z.txt")]);
    }

    #[test]
    fn test_list_missing_dir_is_io_error() {
        let (_temp, root) = utf8_temp();
        let err = list_dir(&root.join("missing")).unwrap_err();
        assert!(matches!(err, ModError::Io { .. }));
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Utf8Path::new("/games/mods");
        let path = root.join("modA").join("content").join("blob0.bundle");
        assert_eq!(relative_path(root, &path), "modA/content/blob0.bundle");
        assert_eq!(relative_path(root, root), "");
    }

    #[test]
    fn test_dir_size_is_recursive() {
        let (_temp, root) = utf8_temp();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/one"), "12345").unwrap();
        fs::write(root.join("a/b/two"), "123").unwrap();

        assert_eq!(dir_size(&root).unwrap(), 8);
        assert_eq!(files_below(&root).unwrap().len(), 2);
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(token.check().is_ok());
        shared.cancel();
        assert!(token.check().unwrap_err().is_cancelled());
    }
}
