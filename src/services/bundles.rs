//! Conflict report over the logical files packed inside `.bundle` blobs.
//!
//! Decoding bundles is game-specific; callers plug it in through
//! [`BundleLister`].

use crate::error::Result;
use crate::models::mod_record::{DataType, Mod};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

const BUNDLE_EXTENSION: &str = "bundle";

/// Lists the logical paths stored in a bundle file.
#[cfg_attr(test, mockall::automock)]
pub trait BundleLister: Send + Sync {
    fn list_entries(&self, bundle: &Utf8Path) -> Result<Vec<String>>;
}

/// A logical path provided by more than one mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConflict {
    pub entry: String,
    /// Filenames of the mods providing `entry`, in the order given.
    pub mods: Vec<String>,
}

/// Conflicts between the enabled mod and dlc records, reading bundles from
/// below each record's `source`.
pub fn find_bundle_conflicts(mods: &[Mod], lister: &dyn BundleLister) -> Result<Vec<BundleConflict>> {
    find_bundle_conflicts_in(mods, lister, |record| record.source.clone())
}

/// Like [`find_bundle_conflicts`], with bundle paths resolved under
/// `root_of(record)`, e.g. the installed mod directory.
pub fn find_bundle_conflicts_in(
    mods: &[Mod],
    lister: &dyn BundleLister,
    root_of: impl Fn(&Mod) -> Utf8PathBuf,
) -> Result<Vec<BundleConflict>> {
    let mut providers: IndexMap<String, Vec<String>> = IndexMap::new();

    for record in mods {
        if !record.enabled || !matches!(record.datatype, DataType::Mod | DataType::Dlc) {
            continue;
        }
        let root = root_of(record);
        for content in &record.contents {
            let is_bundle = Utf8Path::new(&content.source)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(BUNDLE_EXTENSION));
            if !is_bundle {
                continue;
            }

            for entry in lister.list_entries(&root.join(&content.source))? {
                let owners = providers.entry(entry).or_default();
                if !owners.contains(&record.filename) {
                    owners.push(record.filename.clone());
                }
            }
        }
    }

    let conflicts: Vec<BundleConflict> = providers
        .into_iter()
        .filter(|(_, owners)| owners.len() > 1)
        .map(|(entry, mods)| BundleConflict { entry, mods })
        .collect();

    if !conflicts.is_empty() {
        tracing::info!("Found {} conflicting bundled files", conflicts.len());
    }
    Ok(conflicts)
}
