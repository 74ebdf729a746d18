//! Copies classified mods into the game directory.
//!
//! Content lands in `<game>/mods/<filename>` (or `<game>/dlc/<filename>`),
//! loose files at `<game>/<target>`, and every installed record leaves a
//! sidecar marker in its mod directory. Settings fragments are recorded in
//! the marker but not merged into the game's own settings files.

use super::builder::ModBuilder;
use super::marker::write_marker;
use crate::error::{ModError, Result};
use crate::metrics::ScanMetrics;
use crate::models::config::ManagerConfig;
use crate::models::mod_record::{DataType, Mod};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, MutexGuard};

/// Result of one path in an install batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: Utf8PathBuf,
    pub result: Result<Vec<Mod>>,
}

#[derive(Debug, Clone)]
pub struct Installer {
    game_path: Utf8PathBuf,
    /// Held around copying and marker writes only; classification runs outside it.
    gate: Arc<Mutex<()>>,
    metrics: Arc<ScanMetrics>,
}

impl Installer {
    pub fn new(game_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            game_path: game_path.into(),
            gate: Arc::new(Mutex::new(())),
            metrics: Arc::new(ScanMetrics::new()),
        }
    }

    /// `None` when no game path is configured.
    pub fn from_config(config: &ManagerConfig) -> Option<Self> {
        config.game_path.as_deref().map(Self::new)
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn game_path(&self) -> &Utf8Path {
        &self.game_path
    }

    /// Directory that holds a record's content and marker.
    pub fn mod_dir(&self, record: &Mod) -> Utf8PathBuf {
        let parent = match record.datatype {
            DataType::Dlc => "dlc",
            _ => "mods",
        };
        self.game_path.join(parent).join(&record.filename)
    }

    /// Install a record whose files live under its `source`.
    pub fn install(&self, record: &Mod) -> Result<Mod> {
        self.install_from(record, record.source())
    }

    /// Install a record, reading its files from `files_root`.
    pub fn install_from(&self, record: &Mod, files_root: &Utf8Path) -> Result<Mod> {
        if record.datatype == DataType::Udf {
            return Err(ModError::Unresolved {
                filename: record.filename.clone(),
            });
        }

        let mod_dir = self.mod_dir(record);
        for content in &record.contents {
            copy_file(&files_root.join(&content.source), &mod_dir.join(&content.source))?;
        }
        for file in &record.files {
            copy_file(&files_root.join(&file.source), &self.game_path.join(&file.target))?;
        }
        if !record.settings.is_empty() || !record.inputs.is_empty() {
            tracing::debug!(
                "{} ships {} settings and {} input fragments",
                record.filename,
                record.settings.len(),
                record.inputs.len()
            );
        }

        let mut installed = record.clone();
        installed.installed = true;
        installed.installdate = Some(unix_now());
        write_marker(&installed, &mod_dir)?;

        self.metrics.record_install();
        tracing::info!("Installed {} ({}) into {}", installed.filename, installed.datatype, mod_dir);
        Ok(installed)
    }

    /// Block gated installs until the returned guard is dropped.
    pub async fn hold_installs(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Classify `path` and install everything it contains.
    ///
    /// Classification and archive unpacking run without the install gate;
    /// the gate is taken once the records are ready to be copied. Archives are
    /// installed while their scratch directory is alive and the returned
    /// records and markers point at the archive.
    ///
    /// Blocks on the gate, so call it from a plain thread or the blocking
    /// pool, never from inside an async task.
    pub fn install_path(
        &self,
        builder: &ModBuilder,
        path: &Utf8Path,
        package: Option<&str>,
    ) -> Result<Vec<Mod>> {
        let meta = fs::metadata(path).map_err(|e| ModError::io(path, e))?;
        if meta.is_dir() {
            let mods = builder.from_directory(path, package)?;
            let _guard = self.gate.blocking_lock();
            return mods.iter().map(|record| self.install(record)).collect();
        }

        builder.from_archive_with(path, package, |staged| {
            let _guard = self.gate.blocking_lock();
            staged
                .iter()
                .map(|s| self.install_from(&s.record, &s.files_root))
                .collect()
        })
    }

    /// Install several paths, each on the blocking pool.
    ///
    /// Paths are classified concurrently and copied one at a time behind the
    /// install gate. Outcomes keep the order of `paths`; a failing path is
    /// logged and does not stop the rest of the batch.
    pub async fn install_batch(
        &self,
        builder: Arc<ModBuilder>,
        paths: Vec<Utf8PathBuf>,
    ) -> Vec<BatchOutcome> {
        let tasks: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let installer = self.clone();
                let builder = Arc::clone(&builder);
                let task_path = path.clone();
                let task = tokio::task::spawn_blocking(move || {
                    installer.install_path(&builder, &task_path, None)
                });
                (path, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (path, task) in tasks {
            let result = task
                .await
                .map_err(|e| ModError::Worker(e.to_string()))
                .and_then(|result| result);

            if let Err(e) = &result {
                tracing::warn!("{}", e);
            }
            outcomes.push(BatchOutcome { path, result });
        }

        outcomes
    }
}

fn copy_file(from: &Utf8Path, to: &Utf8Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| ModError::io(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| ModError::io(from, e))?;
    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
