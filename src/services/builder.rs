//! Turns one filesystem path into the Mod records it contains.
//!
//! A directory is walked breadth-first. Each visited directory is either
//! claimed as a mod, dlc or ambiguous root (and not descended into) or has
//! its children queued. Loose files outside every claimed root become one
//! trailing `bin` record. Archives are unpacked into a scratch directory that
//! lives exactly as long as the build.

use super::archive::{ArchiveError, ArchiveExtractor, NativeExtractor, hash_file};
use super::classifier::{
    ProbeResult, contains_valid_mod, is_dlc_root, is_mod_root, maybe_ambiguous_root,
};
use super::extractor::FileExtractor;
use super::naming::{format_dlc_name, format_mod_name, format_package_name};
use super::scanner::DirectoryScanner;
use super::walk::{CancelToken, dir_size, is_content_dir, list_dir};
use crate::error::{InvalidReason, ModError, Result};
use crate::metrics::ScanMetrics;
use crate::models::config::ManagerConfig;
use crate::models::mod_record::{DataType, Mod, UNDEFINED_SUFFIX};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

const BIN_SUFFIX: &str = "Bin";
const PATCH_SUFFIX: &str = "Patch";

/// Naming inputs of a build: the path the user handed in and its name.
#[derive(Debug, Clone)]
struct Origin {
    path: Utf8PathBuf,
    /// Full file name; archive extensions are stripped by the formatter.
    name: String,
    /// Name without extension, for synthesized filenames.
    stem: String,
}

impl Origin {
    fn new(path: &Utf8Path) -> Self {
        let name = path.file_name().unwrap_or_default().to_string();
        let stem = if path.is_file() {
            path.file_stem().unwrap_or_default().to_string()
        } else {
            name.clone()
        };
        Self {
            path: path.to_path_buf(),
            name,
            stem,
        }
    }
}

/// A record built from an unpacked archive.
///
/// `record` already names the archive as its source; its files are readable
/// under `files_root` until the scratch directory is removed.
#[derive(Debug, Clone)]
pub struct StagedMod {
    pub record: Mod,
    pub files_root: Utf8PathBuf,
}

impl StagedMod {
    fn stamp(mut record: Mod, archive: &Utf8Path, archive_hash: &str) -> Self {
        let files_root = std::mem::replace(&mut record.source, archive.to_path_buf());
        record.md5hash = archive_hash.to_string();
        Self { record, files_root }
    }
}

pub struct ModBuilder {
    config: ManagerConfig,
    scanner: DirectoryScanner,
    extractor: Box<dyn ArchiveExtractor>,
    metrics: Arc<ScanMetrics>,
    cancel: CancelToken,
}

impl ModBuilder {
    pub fn new(config: &ManagerConfig) -> Self {
        let metrics = Arc::new(ScanMetrics::new());
        let cancel = CancelToken::new();
        Self {
            scanner: DirectoryScanner::new(config.scan.clone())
                .with_cancel_token(cancel.clone())
                .with_metrics(Arc::clone(&metrics)),
            config: config.clone(),
            extractor: Box::new(NativeExtractor::new()),
            metrics,
            cancel,
        }
    }

    /// Replace the archive unpack capability.
    pub fn with_extractor(mut self, extractor: Box<dyn ArchiveExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.scanner = self.scanner.with_cancel_token(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.scanner = self.scanner.with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        &self.metrics
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn scanner(&self) -> &DirectoryScanner {
        &self.scanner
    }

    /// Build from a directory or an archive file.
    ///
    /// `package` overrides the grouping key derived from the path's name.
    pub fn from_path(&self, path: &Utf8Path, package: Option<&str>) -> Result<Vec<Mod>> {
        let meta = fs::metadata(path).map_err(|e| ModError::io(path, e))?;
        if meta.is_dir() {
            self.from_directory(path, package)
        } else {
            self.from_archive(path, package)
        }
    }

    pub fn from_directory(&self, path: &Utf8Path, package: Option<&str>) -> Result<Vec<Mod>> {
        self.measured(path, || self.build_directory(path, &Origin::new(path), package))
    }

    /// Unpack, validate and build an archive. Every record's `source` is the
    /// archive itself and `md5hash` carries the archive fingerprint.
    pub fn from_archive(&self, path: &Utf8Path, package: Option<&str>) -> Result<Vec<Mod>> {
        self.from_archive_with(path, package, |staged| {
            Ok(staged.into_iter().map(|s| s.record).collect())
        })
    }

    /// Like [`Self::from_archive`], but hands the already stamped records to
    /// `f` while the unpacked files still exist under each `files_root`.
    pub fn from_archive_with<F>(&self, path: &Utf8Path, package: Option<&str>, f: F) -> Result<Vec<Mod>>
    where
        F: FnOnce(Vec<StagedMod>) -> Result<Vec<Mod>>,
    {
        self.measured(path, || {
            let archive_hash = hash_file(path)?;
            let origin = Origin::new(path);

            self.with_extracted_archive(path, |scratch| {
                let staged = self
                    .build_directory(scratch, &origin, package)?
                    .into_iter()
                    .map(|record| StagedMod::stamp(record, path, &archive_hash))
                    .collect();
                f(staged)
            })
        })
    }

    /// Run `f` against the validated, unpacked contents of `archive`.
    ///
    /// The scratch directory is removed on every exit path.
    pub fn with_extracted_archive<T>(
        &self,
        archive: &Utf8Path,
        f: impl FnOnce(&Utf8Path) -> Result<T>,
    ) -> Result<T> {
        let scratch = self.scratch_dir()?;
        let scratch_path = Utf8PathBuf::try_from(scratch.path().to_path_buf())
            .map_err(|e| ModError::NonUtf8Path(e.into_path_buf()))?;

        let result = self.run_in_scratch(archive, &scratch_path, f);

        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to remove scratch directory {}: {}", scratch_path, e);
        }
        result
    }

    fn run_in_scratch<T>(
        &self,
        archive: &Utf8Path,
        scratch: &Utf8Path,
        f: impl FnOnce(&Utf8Path) -> Result<T>,
    ) -> Result<T> {
        self.cancel.check()?;
        self.extractor
            .extract(archive, scratch)
            .map_err(|e| match e {
                ArchiveError::Unsupported(_) | ArchiveError::Corrupt { .. } => {
                    tracing::warn!("{}", e);
                    ModError::invalid(archive, InvalidReason::InvalidArchive)
                }
                ArchiveError::Io { path, source } => ModError::Io { path, source },
            })?;
        self.metrics.record_archive();

        self.validate(archive, scratch)?;
        f(scratch)
    }

    fn validate(&self, archive: &Utf8Path, scratch: &Utf8Path) -> Result<()> {
        let limit = self.config.scan.search_limit;
        match contains_valid_mod(scratch, limit)? {
            ProbeResult::Found => Ok(()),
            ProbeResult::Exhausted => Err(ModError::invalid(archive, InvalidReason::InvalidMod)),
            ProbeResult::LimitReached if !self.config.scan.deep_search => {
                tracing::info!("Search limit {} reached in {}", limit, archive);
                Err(ModError::invalid(archive, InvalidReason::StoppedSearching))
            }
            ProbeResult::LimitReached => {
                tracing::info!("Search limit reached in {}, searching deeper", archive);
                if contains_valid_mod(scratch, usize::MAX)?.found() {
                    Ok(())
                } else {
                    Err(ModError::invalid(archive, InvalidReason::InvalidMod))
                }
            }
        }
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("w3modkit-");
        match self.config.scratch_dir() {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| ModError::io(dir, e))?;
                builder.tempdir_in(dir).map_err(|e| ModError::io(dir, e))
            }
            None => builder.tempdir().map_err(|e| {
                let temp = std::env::temp_dir().to_string_lossy().into_owned();
                ModError::io(temp, e)
            }),
        }
    }

    /// Build one `pat` record from every `content*` directory of a patch.
    pub fn from_patch(&self, path: &Utf8Path, package: Option<&str>) -> Result<Mod> {
        let origin = Origin::new(path);
        self.cancel.check()?;

        let contents = self.scanner.fetch_patch_content_files(path)?;
        let loose = self.scanner.fetch_bin_files(path, false)?;
        if contents.is_empty() && loose.is_empty() {
            self.metrics.record_failure();
            return Err(ModError::invalid(path, InvalidReason::InvalidMod));
        }

        let modname = format_package_name(&origin.name);
        let package = package.map(str::to_string).unwrap_or_else(|| modname.clone());
        let filename = format!("{}{PATCH_SUFFIX}", format_mod_name(&origin.stem, "mod"));

        let mut record = Mod::new(modname, filename, DataType::Pat, package, path);
        record.size = dir_size(path)?;
        record.contents = contents;
        record.files = loose.files;
        record.settings = loose.settings;
        record.inputs = loose.inputs;
        record.enabled = !origin.name.starts_with('~');
        if self.config.scan.collect_readmes {
            record.readmes = self.scanner.fetch_readmes(path)?;
        }

        self.metrics.record_mods_built(1);
        tracing::info!("Built patch {} from {}", record.filename, path);
        Ok(record)
    }

    /// [`Self::from_path`] on the blocking thread pool.
    pub async fn from_path_async(
        self: Arc<Self>,
        path: Utf8PathBuf,
        package: Option<String>,
    ) -> Result<Vec<Mod>> {
        tokio::task::spawn_blocking(move || self.from_path(&path, package.as_deref()))
            .await
            .map_err(|e| ModError::Worker(e.to_string()))?
    }

    fn measured(&self, path: &Utf8Path, build: impl FnOnce() -> Result<Vec<Mod>>) -> Result<Vec<Mod>> {
        let started = Instant::now();
        let result = build();
        self.metrics.record_scan_time(started.elapsed());

        match &result {
            Ok(mods) => {
                self.metrics.record_mods_built(mods.len());
                tracing::info!("Built {} mod(s) from {}", mods.len(), path);
            }
            Err(e) if e.is_cancelled() => tracing::info!("Scan of {} cancelled", path),
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    fn build_directory(
        &self,
        search_root: &Utf8Path,
        origin: &Origin,
        package: Option<&str>,
    ) -> Result<Vec<Mod>> {
        let modname = format_package_name(&origin.name);
        let package = package.map(str::to_string).unwrap_or_else(|| modname.clone());
        let extractor = FileExtractor::new(&self.scanner);

        let mut mods = Vec::new();
        let mut claimed: HashMap<(String, DataType), Utf8PathBuf> = HashMap::new();
        let mut queue = VecDeque::from([search_root.to_path_buf()]);

        while let Some(check) = queue.pop_front() {
            self.cancel.check()?;
            let name = check.file_name().unwrap_or_default();

            let classified = if is_mod_root(&check)? {
                Some((DataType::Mod, format_mod_name(name, "mod"), ""))
            } else if is_dlc_root(&check)? {
                Some((DataType::Dlc, format_dlc_name(name), ""))
            } else if maybe_ambiguous_root(&check, search_root)? {
                Some((DataType::Udf, format_mod_name(name, "mod"), UNDEFINED_SUFFIX))
            } else {
                None
            };

            let Some((datatype, stem, suffix)) = classified else {
                let children = list_dir(&check)?.dirs;
                queue.extend(children.into_iter().filter(|dir| !is_content_dir(dir)));
                continue;
            };

            let filename = unclaimed_filename(&claimed, &stem, suffix, datatype);
            if let Some(first) = claimed.get(&(format!("{stem}{suffix}"), datatype)) {
                tracing::warn!(
                    "{} and {} both classify as {}{} ({}); registering the latter as {}",
                    first,
                    check,
                    stem,
                    suffix,
                    datatype,
                    filename
                );
            }
            claimed.insert((filename.clone(), datatype), check.clone());

            tracing::debug!("Classified {} as {} ({})", check, datatype, filename);
            self.metrics.record_root();

            let extraction = extractor.extract(&check)?;
            let mut record = Mod::new(modname.as_str(), filename, datatype, package.as_str(), check.clone());
            record.size = extraction.size;
            record.files = extraction.files;
            record.settings = extraction.settings;
            record.inputs = extraction.inputs;
            record.contents = extraction.contents;
            record.enabled = !name.starts_with('~');
            mods.push(record);
        }

        let loose = self.scanner.fetch_bin_files(search_root, true)?;
        if !loose.is_empty() {
            let (common, loose) = loose.rebase_on_common_root();
            let source = if common.is_empty() {
                search_root.to_path_buf()
            } else {
                search_root.join(&common)
            };
            let filename = format!("{}{BIN_SUFFIX}", format_mod_name(&origin.stem, "mod"));
            tracing::debug!("Collected {} loose files as {}", loose.files.len(), filename);

            let mut record = Mod::new(modname.as_str(), filename, DataType::Bin, package.as_str(), source);
            record.size = loose.size;
            record.files = loose.files;
            record.settings = loose.settings;
            record.inputs = loose.inputs;
            record.enabled = !origin.name.starts_with('~');
            mods.push(record);
        }

        if mods.is_empty() {
            return Err(ModError::invalid(origin.path.clone(), InvalidReason::InvalidMod));
        }

        if self.config.scan.collect_readmes {
            let readmes = self.scanner.fetch_readmes(search_root)?;
            for record in &mut mods {
                record.readmes = readmes.clone();
            }
        }

        Ok(mods)
    }
}

/// First of `stem`, `stem2`, `stem3`, ... (each followed by `suffix`) not yet
/// claimed for `datatype` in this build.
fn unclaimed_filename(
    claimed: &HashMap<(String, DataType), Utf8PathBuf>,
    stem: &str,
    suffix: &str,
    datatype: DataType,
) -> String {
    let mut filename = format!("{stem}{suffix}");
    let mut n = 2;
    while claimed.contains_key(&(filename.clone(), datatype)) {
        filename = format!("{stem}{n}{suffix}");
        n += 1;
    }
    filename
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::archive::MockArchiveExtractor;
    use std::sync::Mutex;

    fn utf8_temp() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    fn write(path: &Utf8Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn config_in(root: &Utf8Path) -> ManagerConfig {
        ManagerConfig {
            scratch_dir: Some(root.join("scratch")),
            ..ManagerConfig::default()
        }
    }

    fn builder_with(root: &Utf8Path, mock: MockArchiveExtractor) -> ModBuilder {
        ModBuilder::new(&config_in(root)).with_extractor(Box::new(mock))
    }

    #[test]
    fn test_archive_sources_are_stamped() {
        let (_temp, root) = utf8_temp();
        let archive = root.join("modArchived-1234-1-0.zip");
        write(&archive, "archive bytes");

        let seen_scratch = Arc::new(Mutex::new(None::<Utf8PathBuf>));
        let seen = Arc::clone(&seen_scratch);
        let mut mock = MockArchiveExtractor::new();
        mock.expect_extract().times(1).returning(move |_, dest| {
            *seen.lock().unwrap() = Some(dest.to_path_buf());
            write(&dest.join("modArchived/content/blob0.bundle"), "bundle");
            Ok(())
        });

        let builder = builder_with(&root, mock);
        let mods = builder.from_path(&archive, None).unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].filename, "modArchived");
        assert_eq!(mods[0].source, archive);
        assert_eq!(mods[0].md5hash, blake3::hash(b"archive bytes").to_hex().to_string());
        assert_eq!(mods[0].package, "Archived");

        let scratch = seen_scratch.lock().unwrap().clone().unwrap();
        assert!(scratch.starts_with(root.join("scratch")));
        assert!(!scratch.exists());
    }

    #[test]
    fn test_corrupt_archive_is_invalid_archive() {
        let (_temp, root) = utf8_temp();
        let archive = root.join("broken.7z");
        write(&archive, "??");

        let mut mock = MockArchiveExtractor::new();
        mock.expect_extract().returning(|archive, _| {
            Err(ArchiveError::Corrupt {
                path: archive.to_path_buf(),
                message: "bad header".to_string(),
            })
        });

        let err = builder_with(&root, mock).from_archive(&archive, None).unwrap_err();
        assert_eq!(err.invalid_reason(), Some(InvalidReason::InvalidArchive));
        assert!(err.to_string().contains("broken.7z"));
        assert!(fs::read_dir(root.join("scratch")).unwrap().next().is_none());
    }

    #[test]
    fn test_archive_without_mod_is_invalid_mod() {
        let (_temp, root) = utf8_temp();
        let archive = root.join("pictures.zip");
        write(&archive, "zip");

        let mut mock = MockArchiveExtractor::new();
        mock.expect_extract().returning(|_, dest| {
            write(&dest.join("screens/one.png"), "png");
            Ok(())
        });

        let err = builder_with(&root, mock).from_archive(&archive, None).unwrap_err();
        assert_eq!(err.invalid_reason(), Some(InvalidReason::InvalidMod));
    }

    #[test]
    fn test_search_limit_stops_or_goes_deeper() {
        let (_temp, root) = utf8_temp();
        let archive = root.join("deep.zip");
        write(&archive, "zip");

        let unpack = |dest: &Utf8Path| {
            for i in 0..4 {
                fs::create_dir_all(dest.join(format!("empty{i}"))).unwrap();
            }
            write(&dest.join("zz/modDeep/content/blob0.bundle"), "b");
        };

        let mut mock = MockArchiveExtractor::new();
        mock.expect_extract().returning(move |_, dest| {
            unpack(dest);
            Ok(())
        });
        let mut config = config_in(&root);
        config.scan.search_limit = 3;
        let shallow = ModBuilder::new(&config).with_extractor(Box::new(mock));
        let err = shallow.from_archive(&archive, None).unwrap_err();
        assert_eq!(err.invalid_reason(), Some(InvalidReason::StoppedSearching));

        let mut mock = MockArchiveExtractor::new();
        mock.expect_extract().returning(move |_, dest| {
            unpack(dest);
            Ok(())
        });
        config.scan.deep_search = true;
        let deep = ModBuilder::new(&config).with_extractor(Box::new(mock));
        let mods = deep.from_archive(&archive, None).unwrap();
        assert_eq!(mods[0].filename, "modDeep");
    }

    #[test]
    fn test_from_archive_with_sees_scratch_sources() {
        let (_temp, root) = utf8_temp();
        let archive = root.join("modScoped.zip");
        write(&archive, "zip");

        let mut mock = MockArchiveExtractor::new();
        mock.expect_extract().returning(|_, dest| {
            write(&dest.join("modScoped/content/blob0.bundle"), "b");
            Ok(())
        });

        let builder = builder_with(&root, mock);
        let mods = builder
            .from_archive_with(&archive, None, |staged| {
                assert_eq!(staged[0].record.source, archive);
                assert!(staged[0].files_root.join("content/blob0.bundle").is_file());
                Ok(staged.into_iter().map(|s| s.record).collect())
            })
            .unwrap();
        assert_eq!(mods[0].source, archive);
        assert_eq!(builder.metrics().mods_built.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn test_patch() {
        let (_temp, root) = utf8_temp();
        let patch = root.join("Fancy Patch");
        write(&patch.join("content0/blob0.bundle"), "a");
        write(&patch.join("content1/blob0.bundle"), "b");

        let builder = ModBuilder::new(&config_in(&root));
        let record = builder.from_patch(&patch, None).unwrap();
        assert_eq!(record.datatype, DataType::Pat);
        assert!(record.filename.ends_with(PATCH_SUFFIX));
        assert!(record.filename.starts_with("mod"));
        assert_eq!(record.contents.len(), 2);

        let empty = root.join("Empty");
        fs::create_dir_all(&empty).unwrap();
        let err = builder.from_patch(&empty, None).unwrap_err();
        assert_eq!(err.invalid_reason(), Some(InvalidReason::InvalidMod));
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let (_temp, root) = utf8_temp();
        let builder = ModBuilder::new(&config_in(&root));
        let err = builder.from_path(&root.join("missing"), None).unwrap_err();
        assert!(matches!(err, ModError::Io { .. }));
    }
}
