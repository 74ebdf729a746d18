use super::scanner::DirectoryScanner;
use super::walk::dir_size;
use crate::error::Result;
use crate::models::files::{BinFile, ContentFile};
use crate::models::settings::SettingsFragment;
use camino::Utf8Path;

/// Manifests gathered from one classified root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Bytes of every regular file below the root.
    pub size: u64,
    pub files: Vec<BinFile>,
    pub settings: Vec<SettingsFragment>,
    pub inputs: Vec<SettingsFragment>,
    pub contents: Vec<ContentFile>,
}

/// Collects size, loose files, fragments and content files of a root.
///
/// Inside a claimed root every loose file belongs to it, so the loose-file
/// walk runs without the ungrouped filter.
#[derive(Debug, Clone)]
pub struct FileExtractor<'a> {
    scanner: &'a DirectoryScanner,
}

impl<'a> FileExtractor<'a> {
    pub fn new(scanner: &'a DirectoryScanner) -> Self {
        Self { scanner }
    }

    pub fn extract(&self, root: &Utf8Path) -> Result<Extraction> {
        let size = dir_size(root)?;
        let loose = self.scanner.fetch_bin_files(root, false)?;
        let contents = self.scanner.fetch_content_files(root)?;

        tracing::debug!(
            "Extracted {}: {} content files, {} loose files, {} bytes",
            root,
            contents.len(),
            loose.files.len(),
            size
        );

        Ok(Extraction {
            size,
            files: loose.files,
            settings: loose.settings,
            inputs: loose.inputs,
            contents,
        })
    }
}
