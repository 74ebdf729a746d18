//! Services module - classification, extraction and installation of mods.
//!
//! # Components
//!
//! - [`classifier`]: predicates deciding whether a directory is a mod, dlc or
//!   ambiguous root
//! - [`DirectoryScanner`]: breadth-first walks for roots, loose files,
//!   content files and readmes
//! - [`naming`]: ordered regex pipelines producing package names and
//!   canonical filenames
//! - [`FileExtractor`]: manifests of one classified root
//! - [`ModBuilder`]: turns a directory or archive into [`Mod`](crate::models::Mod) records
//! - [`Installer`]: copies records into the game directory behind one gate
//! - [`archive`], [`bundles`]: external capabilities behind traits
//! - [`marker`]: sidecar persistence of installed records
//!
//! Nothing here touches process-wide state; configuration is passed in.

pub mod archive;
pub mod builder;
pub mod bundles;
pub mod classifier;
pub mod extractor;
pub mod installer;
pub mod marker;
pub mod naming;
pub mod scanner;
pub mod walk;

pub use archive::{ArchiveError, ArchiveExtractor, NativeExtractor};
pub use builder::{ModBuilder, StagedMod};
pub use bundles::{BundleConflict, BundleLister, find_bundle_conflicts};
pub use classifier::{
    ProbeResult, contains_content_directory, contains_valid_mod, is_dlc_root, is_mod_root,
    maybe_ambiguous_root,
};
pub use extractor::{Extraction, FileExtractor};
pub use installer::{BatchOutcome, Installer};
pub use marker::{MARKER_FILE, read_marker, write_marker};
pub use naming::{format_dlc_name, format_mod_name, format_package_name};
pub use scanner::{
    DirectoryScanner, LooseFileKind, LooseFiles, RootKind, classify_loose_file,
    resolve_common_bin_root,
};
pub use walk::CancelToken;
