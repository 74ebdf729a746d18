//! Breadth-first walks that enumerate roots, loose files, content files and
//! readmes below a search directory.
//!
//! Every walk uses an explicit FIFO queue and visits children in name order,
//! so discovery order is stable across runs and platforms.

use super::archive::hash_file;
use super::classifier::{is_dlc_root, is_mod_root, maybe_ambiguous_root};
use super::walk::{
    CancelToken, file_size, files_below, is_content_dir, list_dir, relative_path,
};
use crate::error::{ModError, Result};
use crate::metrics::ScanMetrics;
use crate::models::config::ScanConfig;
use crate::models::files::{BinFile, ContentFile, MENU_CONFIG_DIR, Readme};
use crate::models::settings::{SettingsFragment, SettingsKind};
use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::sync::{Arc, LazyLock};

const LOOSE_EXTENSIONS: [&str; 6] = ["ini", "xml", "txt", "settings", "dll", "asi"];

const INI_TARGET_DIR: &str = "bin/config/platform/pc";
const PLUGIN_TARGET_DIR: &str = "bin/x64";
const PLUGIN_CONFIG_EXTENSION: &str = "cfg";

static INPUT_XML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)input.*(?:\.xml|xml\.txt)$").expect("Invalid input xml regex")
});

static HIDDEN_XML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)hidden.*(?:\.xml|xml\.txt)$").expect("Invalid hidden xml regex")
});

static INPUT_SETTINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)input\.?settings").expect("Invalid input settings regex"));

static USER_SETTINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)user\.?settings").expect("Invalid user settings regex"));

/// Where a loose file goes, decided from its path relative to the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LooseFileKind {
    /// Copied to `target` under the game root.
    Bin { target: String },
    /// A dll/asi plugin; sibling `.cfg` files follow it into the same directory.
    Plugin { target: String },
    InputSettings,
    UserSettings,
    Ignored,
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Apply the loose-file rules to a `/`-separated path, first match wins.
pub fn classify_loose_file(relative: &str) -> LooseFileKind {
    let (dirs, name) = match relative.rsplit_once('/') {
        Some((dirs, name)) => (dirs, name),
        None => ("", relative),
    };
    let Some(extension) = extension_of(name) else {
        return LooseFileKind::Ignored;
    };
    if !LOOSE_EXTENSIONS.contains(&extension.as_str()) {
        return LooseFileKind::Ignored;
    }
    let is_plugin = extension == "dll" || extension == "asi";

    let segments: Vec<&str> = dirs.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(bin) = segments.iter().position(|s| s.eq_ignore_ascii_case("bin")) {
        let mut target = segments[bin..].join("/");
        target.push('/');
        target.push_str(name);
        return if is_plugin {
            LooseFileKind::Plugin { target }
        } else {
            LooseFileKind::Bin { target }
        };
    }

    if INPUT_XML.is_match(name) {
        return LooseFileKind::Bin {
            target: format!("{MENU_CONFIG_DIR}/input.xml"),
        };
    }
    if HIDDEN_XML.is_match(name) {
        return LooseFileKind::Bin {
            target: format!("{MENU_CONFIG_DIR}/hidden.xml"),
        };
    }
    match extension.as_str() {
        "xml" => {
            return LooseFileKind::Bin {
                target: format!("{MENU_CONFIG_DIR}/{name}"),
            };
        }
        "ini" => {
            return LooseFileKind::Bin {
                target: format!("{INI_TARGET_DIR}/{name}"),
            };
        }
        "dll" | "asi" => {
            return LooseFileKind::Plugin {
                target: format!("{PLUGIN_TARGET_DIR}/{name}"),
            };
        }
        _ => {}
    }
    if INPUT_SETTINGS.is_match(name) {
        return LooseFileKind::InputSettings;
    }
    if USER_SETTINGS.is_match(name) {
        return LooseFileKind::UserSettings;
    }
    LooseFileKind::Ignored
}

/// Loose files collected below one directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LooseFiles {
    pub files: Vec<BinFile>,
    pub settings: Vec<SettingsFragment>,
    pub inputs: Vec<SettingsFragment>,
    /// Bytes of every collected file, fragments included.
    pub size: u64,
}

impl LooseFiles {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.settings.is_empty() && self.inputs.is_empty()
    }

    /// Rebase every source onto the innermost directory shared by all of
    /// them. Returns the shared directory (empty when there is none).
    pub fn rebase_on_common_root(mut self) -> (String, Self) {
        let anchors = self
            .files
            .iter()
            .map(|f| bin_anchor(&f.source))
            .chain(
                self.settings
                    .iter()
                    .chain(self.inputs.iter())
                    .map(|s| parent_segments(&s.source)),
            );
        let common = common_prefix(anchors);
        if common.is_empty() {
            return (common, self);
        }

        let prefix = format!("{common}/");
        let strip = |source: &mut String| {
            if let Some(rest) = source.strip_prefix(&prefix) {
                *source = rest.to_string();
            }
        };
        self.files.iter_mut().for_each(|f| strip(&mut f.source));
        self.settings.iter_mut().for_each(|s| strip(&mut s.source));
        self.inputs.iter_mut().for_each(|s| strip(&mut s.source));
        (common, self)
    }
}

fn parent_segments(source: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = source.split('/').collect();
    segments.pop();
    segments
}

/// Directory segments of `source` that precede its first `bin` segment.
fn bin_anchor(source: &str) -> Vec<&str> {
    let mut segments = parent_segments(source);
    if let Some(bin) = segments.iter().position(|s| s.eq_ignore_ascii_case("bin")) {
        segments.truncate(bin);
    }
    segments
}

fn common_prefix<'a>(mut anchors: impl Iterator<Item = Vec<&'a str>>) -> String {
    let Some(mut common) = anchors.next() else {
        return String::new();
    };
    for anchor in anchors {
        let shared = common
            .iter()
            .zip(anchor.iter())
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }
    common.join("/")
}

/// Innermost directory shared by every file (below any `bin` segment),
/// plus the files with sources rewritten relative to it.
pub fn resolve_common_bin_root(files: &[BinFile]) -> (String, Vec<BinFile>) {
    let loose = LooseFiles {
        files: files.to_vec(),
        ..LooseFiles::default()
    };
    let (common, loose) = loose.rebase_on_common_root();
    (common, loose.files)
}

/// Which predicate a root walk collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Mod,
    Dlc,
    Ambiguous,
}

/// Tree walker applying the classifier predicates.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    options: ScanConfig,
    cancel: CancelToken,
    metrics: Arc<ScanMetrics>,
}

impl DirectoryScanner {
    pub fn new(options: ScanConfig) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
            metrics: Arc::new(ScanMetrics::new()),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn options(&self) -> &ScanConfig {
        &self.options
    }

    /// Roots of one kind below `root`, relative to it, in discovery order.
    ///
    /// Claimed roots are not descended into, and neither are directories
    /// that qualify as the other kind of root.
    pub fn fetch_roots(&self, root: &Utf8Path, kind: RootKind) -> Result<Vec<Utf8PathBuf>> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([root.to_path_buf()]);

        while let Some(check) = queue.pop_front() {
            self.cancel.check()?;
            let claimed = match kind {
                RootKind::Mod => is_mod_root(&check)?,
                RootKind::Dlc => is_dlc_root(&check)?,
                RootKind::Ambiguous => {
                    maybe_ambiguous_root(&check, root)?
                        && !is_mod_root(&check)?
                        && !is_dlc_root(&check)?
                }
            };
            if claimed {
                tracing::debug!("Found {:?} root {}", kind, check);
                found.push(Utf8PathBuf::from(relative_path(root, &check)));
                continue;
            }

            let other = match kind {
                RootKind::Mod => is_dlc_root(&check)?,
                RootKind::Dlc => is_mod_root(&check)?,
                RootKind::Ambiguous => is_mod_root(&check)? || is_dlc_root(&check)?,
            };
            if other {
                continue;
            }
            for child in list_dir(&check)?.dirs {
                if !is_content_dir(&child) {
                    queue.push_back(child);
                }
            }
        }

        Ok(found)
    }

    /// Collect loose binary files and settings fragments below `root`.
    ///
    /// With `only_ungrouped`, directories that are roots in their own right
    /// are left to their own extraction and nothing is returned when `root`
    /// itself is one.
    pub fn fetch_bin_files(&self, root: &Utf8Path, only_ungrouped: bool) -> Result<LooseFiles> {
        let mut loose = LooseFiles::default();
        if only_ungrouped && (is_mod_root(root)? || is_dlc_root(root)?) {
            return Ok(loose);
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = queue.pop_front() {
            self.cancel.check()?;
            let listing = list_dir(&dir)?;

            for file in &listing.files {
                let relative = relative_path(root, file);
                match classify_loose_file(&relative) {
                    LooseFileKind::Bin { target } => {
                        if seen.insert(relative.clone()) {
                            loose.size += file_size(file)?;
                            loose.files.push(BinFile::new(relative, target));
                        }
                    }
                    LooseFileKind::Plugin { target } => {
                        if seen.insert(relative.clone()) {
                            loose.size += file_size(file)?;
                            let target_dir = target
                                .rsplit_once('/')
                                .map(|(dir, _)| dir.to_string())
                                .unwrap_or_default();
                            loose.files.push(BinFile::new(relative, target));
                            self.attach_plugin_configs(
                                root,
                                &listing.files,
                                &target_dir,
                                &mut seen,
                                &mut loose,
                            )?;
                        }
                    }
                    LooseFileKind::InputSettings => {
                        if let Some(fragment) = read_fragment(file, relative, SettingsKind::Input)? {
                            loose.size += file_size(file)?;
                            loose.inputs.push(fragment);
                        }
                    }
                    LooseFileKind::UserSettings => {
                        if let Some(fragment) = read_fragment(file, relative, SettingsKind::User)? {
                            loose.size += file_size(file)?;
                            loose.settings.push(fragment);
                        }
                    }
                    LooseFileKind::Ignored => {}
                }
            }

            for child in listing.dirs {
                if is_content_dir(&child) {
                    continue;
                }
                if only_ungrouped
                    && (is_mod_root(&child)?
                        || is_dlc_root(&child)?
                        || maybe_ambiguous_root(&child, root)?)
                {
                    continue;
                }
                queue.push_back(child);
            }
        }

        Ok(loose)
    }

    fn attach_plugin_configs(
        &self,
        root: &Utf8Path,
        siblings: &[Utf8PathBuf],
        target_dir: &str,
        seen: &mut HashSet<String>,
        loose: &mut LooseFiles,
    ) -> Result<()> {
        for sibling in siblings {
            let Some(name) = sibling.file_name() else {
                continue;
            };
            if extension_of(name).as_deref() != Some(PLUGIN_CONFIG_EXTENSION) {
                continue;
            }
            let relative = relative_path(root, sibling);
            if seen.insert(relative.clone()) {
                loose.size += file_size(sibling)?;
                let target = if target_dir.is_empty() {
                    name.to_string()
                } else {
                    format!("{target_dir}/{name}")
                };
                loose.files.push(BinFile::new(relative, target));
            }
        }
        Ok(())
    }

    /// Every file below the first `content` directories found on each branch,
    /// fingerprinted and sorted by relative path.
    pub fn fetch_content_files(&self, root: &Utf8Path) -> Result<Vec<ContentFile>> {
        let files = self.collect_content_dirs(root, is_content_dir)?;
        self.fingerprint(root, files)
    }

    /// Like [`Self::fetch_content_files`], but every sibling `content*`
    /// directory counts. Patch archives ship `content0`, `content1`, ...
    pub fn fetch_patch_content_files(&self, root: &Utf8Path) -> Result<Vec<ContentFile>> {
        let files = self.collect_content_dirs(root, |dir| {
            dir.file_name()
                .is_some_and(|name| name.to_ascii_lowercase().starts_with("content"))
        })?;
        self.fingerprint(root, files)
    }

    fn collect_content_dirs(
        &self,
        root: &Utf8Path,
        matches: impl Fn(&Utf8Path) -> bool,
    ) -> Result<Vec<Utf8PathBuf>> {
        let mut files = Vec::new();
        let mut queue = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = queue.pop_front() {
            self.cancel.check()?;
            let children = list_dir(&dir)?.dirs;
            let content: Vec<&Utf8PathBuf> = children.iter().filter(|c| matches(c)).collect();

            if content.is_empty() {
                queue.extend(children.iter().cloned());
                continue;
            }
            for content_dir in content {
                files.extend(files_below(content_dir)?);
            }
        }

        Ok(files)
    }

    fn fingerprint(&self, root: &Utf8Path, files: Vec<Utf8PathBuf>) -> Result<Vec<ContentFile>> {
        let hash_one = |path: &Utf8PathBuf| -> Result<(ContentFile, u64)> {
            let hash = hash_file(path)?;
            let size = file_size(path)?;
            Ok((ContentFile::new(relative_path(root, path), hash), size))
        };

        let hashed: Vec<(ContentFile, u64)> = if self.options.parallel_hashing {
            files.par_iter().map(hash_one).collect::<Result<_>>()?
        } else {
            files.iter().map(hash_one).collect::<Result<_>>()?
        };

        let bytes: u64 = hashed.iter().map(|(_, size)| size).sum();
        self.metrics.record_bytes_hashed(bytes);

        let mut contents: Vec<ContentFile> = hashed.into_iter().map(|(file, _)| file).collect();
        contents.sort();
        Ok(contents)
    }

    /// `.txt`/`.md` files whose name mentions "readme", with their text.
    pub fn fetch_readmes(&self, root: &Utf8Path) -> Result<Vec<Readme>> {
        let mut readmes = Vec::new();
        let mut queue = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = queue.pop_front() {
            self.cancel.check()?;
            let listing = list_dir(&dir)?;
            for file in &listing.files {
                let Some(name) = file.file_name() else {
                    continue;
                };
                let is_text = matches!(extension_of(name).as_deref(), Some("txt" | "md"));
                if is_text && name.to_ascii_lowercase().contains("readme") {
                    let bytes = fs::read(file).map_err(|e| ModError::io(file, e))?;
                    readmes.push(Readme {
                        source: relative_path(root, file),
                        content: String::from_utf8_lossy(&bytes).into_owned(),
                    });
                }
            }
            queue.extend(listing.dirs.into_iter().filter(|d| !is_content_dir(d)));
        }

        Ok(readmes)
    }
}

/// Parse a settings fragment; parse failures are logged and skipped.
fn read_fragment(
    path: &Utf8Path,
    relative: String,
    kind: SettingsKind,
) -> Result<Option<SettingsFragment>> {
    let bytes = fs::read(path).map_err(|e| ModError::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    match SettingsFragment::parse(relative, kind, &text) {
        Ok(fragment) => Ok(Some(fragment)),
        Err(e @ ModError::UnexpectedInput { .. }) => {
            tracing::warn!("Skipping settings fragment: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
