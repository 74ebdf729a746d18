// Mod registry module
//
// Holds the mods known to the manager behind Arc<RwLock<T>> and emits change
// events over a broadcast channel.

use crate::error::{ModError, Result};
use crate::models::{DataType, Mod};
use crate::services::builder::ModBuilder;
use crate::services::marker::read_marker;
use crate::services::walk::list_dir;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Registry key: a filename is unique per datatype.
pub type ModKey = (String, DataType);

/// Events emitted when the registry changes
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryEvent {
    ScanStarted {
        path: Utf8PathBuf,
    },

    /// Every mod of one scan was registered at once
    ModsRegistered {
        path: Utf8PathBuf,
        filenames: Vec<String>,
    },

    /// A scan ended in an error; nothing was registered
    ScanFailed {
        path: Utf8PathBuf,
        reason: String,
    },

    ScanCancelled {
        path: Utf8PathBuf,
    },

    ModChanged {
        filename: String,
        datatype: DataType,
    },

    ModRemoved {
        filename: String,
        datatype: DataType,
    },
}

/// Thread-safe store of registered mods, in registration order.
///
/// Scans register all-or-nothing: a failed or cancelled scan leaves the
/// registry untouched.
pub struct ModRegistry {
    mods: Arc<RwLock<IndexMap<ModKey, Mod>>>,
    events_tx: broadcast::Sender<RegistryEvent>,
}

impl ModRegistry {
    /// Create an empty registry with a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(100);
        Self {
            mods: Arc::new(RwLock::new(IndexMap::new())),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }

    pub fn snapshot(&self) -> Vec<Mod> {
        self.mods
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, filename: &str, datatype: DataType) -> Option<Mod> {
        self.mods
            .read()
            .expect("registry lock poisoned")
            .get(&(filename.to_string(), datatype))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.mods.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn begin_scan(&self, path: &Utf8Path) {
        self.emit(RegistryEvent::ScanStarted {
            path: path.to_path_buf(),
        });
    }

    /// Register the outcome of one scan.
    ///
    /// Returns the number of mods registered. Errors are passed through after
    /// the matching failure event is emitted.
    pub fn register_scan(&self, path: &Utf8Path, scan: Result<Vec<Mod>>) -> Result<usize> {
        let mods = match scan {
            Ok(mods) => mods,
            Err(e) => {
                self.emit_failure(path, &e);
                return Err(e);
            }
        };

        let mut keys = HashSet::new();
        if let Some(duplicate) = mods.iter().find(|m| !keys.insert(m.key())) {
            let e = ModError::UnexpectedInput {
                path: path.to_path_buf(),
                message: format!("{} found twice as {}", duplicate.filename, duplicate.datatype),
            };
            self.emit_failure(path, &e);
            return Err(e);
        }

        let filenames: Vec<String> = mods.iter().map(|m| m.filename.clone()).collect();
        {
            let mut registered = self.mods.write().expect("registry lock poisoned");
            for record in mods {
                registered.insert((record.filename.clone(), record.datatype), record);
            }
        }

        tracing::info!("Registered {} mod(s) from {}", filenames.len(), path);
        let count = filenames.len();
        self.emit(RegistryEvent::ModsRegistered {
            path: path.to_path_buf(),
            filenames,
        });
        Ok(count)
    }

    fn emit_failure(&self, path: &Utf8Path, e: &ModError) {
        let path = path.to_path_buf();
        if e.is_cancelled() {
            tracing::info!("Scan of {} cancelled", path);
            self.emit(RegistryEvent::ScanCancelled { path });
        } else {
            tracing::warn!("{}", e);
            self.emit(RegistryEvent::ScanFailed {
                path,
                reason: e.to_string(),
            });
        }
    }

    /// Classify `path` on the blocking pool and register the result.
    pub async fn scan(&self, builder: Arc<ModBuilder>, path: &Utf8Path) -> Result<usize> {
        self.begin_scan(path);
        let result = builder.from_path_async(path.to_path_buf(), None).await;
        self.register_scan(path, result)
    }

    /// Register every mod that has a marker under `<game>/mods` or
    /// `<game>/dlc`. Unreadable markers are logged and skipped.
    pub fn load_installed(&self, game: &Utf8Path) -> Result<usize> {
        let mut found = Vec::new();
        for parent in ["mods", "dlc"] {
            let dir = game.join(parent);
            if !dir.is_dir() {
                continue;
            }
            for mod_dir in list_dir(&dir)?.dirs {
                match read_marker(&mod_dir) {
                    Ok(Some(record)) => found.push(record),
                    Ok(None) => tracing::debug!("No marker in {}", mod_dir),
                    Err(e) => tracing::warn!("Skipping installed mod: {}", e),
                }
            }
        }
        self.register_scan(game, Ok(found))
    }

    /// Mutate one registered mod. Returns false when the key is unknown.
    pub fn update<F>(&self, filename: &str, datatype: DataType, update_fn: F) -> bool
    where
        F: FnOnce(&mut Mod),
    {
        let changed = {
            let mut registered = self.mods.write().expect("registry lock poisoned");
            let Some(record) = registered.get_mut(&(filename.to_string(), datatype)) else {
                return false;
            };
            let before = record.clone();
            update_fn(record);
            *record != before
        };

        if changed {
            self.emit(RegistryEvent::ModChanged {
                filename: filename.to_string(),
                datatype,
            });
        }
        true
    }

    pub fn set_enabled(&self, filename: &str, datatype: DataType, enabled: bool) -> bool {
        self.update(filename, datatype, |record| record.enabled = enabled)
    }

    pub fn remove(&self, filename: &str, datatype: DataType) -> Option<Mod> {
        let removed = self
            .mods
            .write()
            .expect("registry lock poisoned")
            .shift_remove(&(filename.to_string(), datatype));

        if removed.is_some() {
            self.emit(RegistryEvent::ModRemoved {
                filename: filename.to_string(),
                datatype,
            });
        }
        removed
    }
}

impl Default for ModRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same store and channel
impl Clone for ModRegistry {
    fn clone(&self) -> Self {
        Self {
            mods: Arc::clone(&self.mods),
            events_tx: self.events_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(filename: &str, datatype: DataType) -> Mod {
        Mod::new("Pkg", filename, datatype, "Pkg", "/src")
    }

    #[test]
    fn test_register_scan() {
        let registry = ModRegistry::new();
        let mut rx = registry.subscribe();

        let count = registry
            .register_scan(
                Utf8Path::new("/src"),
                Ok(vec![record("mod-dlc", DataType::Dlc), record("modDlc", DataType::Mod)]),
            )
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("modDlc", DataType::Mod).is_some());
        assert!(registry.get("modDlc", DataType::Dlc).is_none());
        assert!(matches!(
            rx.try_recv().unwrap(),
            RegistryEvent::ModsRegistered { filenames, .. } if filenames.len() == 2
        ));
    }

    #[test]
    fn test_failed_scan_registers_nothing() {
        let registry = ModRegistry::new();
        let mut rx = registry.subscribe();

        let err = registry
            .register_scan(Utf8Path::new("/src"), Err(ModError::Cancelled))
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(registry.is_empty());
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::ScanCancelled { .. }));
    }

    #[test]
    fn test_duplicate_keys_register_nothing() {
        let registry = ModRegistry::new();
        let mut rx = registry.subscribe();

        let result = registry.register_scan(
            Utf8Path::new("/src"),
            Ok(vec![record("modA", DataType::Mod), record("modA", DataType::Mod)]),
        );
        assert!(result.is_err());
        assert!(registry.is_empty());
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::ScanFailed { .. }));
    }

    #[test]
    fn test_update_emits_only_on_change() {
        let registry = ModRegistry::new();
        registry
            .register_scan(Utf8Path::new("/src"), Ok(vec![record("modA", DataType::Mod)]))
            .unwrap();
        let mut rx = registry.subscribe();

        assert!(registry.set_enabled("modA", DataType::Mod, true));
        assert!(rx.try_recv().is_err());

        assert!(registry.set_enabled("modA", DataType::Mod, false));
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::ModChanged { .. }));
        assert!(!registry.get("modA", DataType::Mod).unwrap().enabled);

        assert!(!registry.set_enabled("modMissing", DataType::Mod, false));
    }

    #[test]
    fn test_scan_of_missing_path_fails() {
        let registry = ModRegistry::new();
        let mut rx = registry.subscribe();
        let builder = Arc::new(ModBuilder::new(&crate::models::ManagerConfig::default()));

        let result = tokio_test::block_on(registry.scan(builder, Utf8Path::new("/no/such/w3modkit/path")));

        assert!(matches!(result, Err(ModError::Io { .. })));
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::ScanStarted { .. }));
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::ScanFailed { .. }));
    }

    #[test]
    fn test_remove() {
        let registry = ModRegistry::new();
        let clone = registry.clone();
        registry
            .register_scan(Utf8Path::new("/src"), Ok(vec![record("modA", DataType::Mod)]))
            .unwrap();
        let mut rx = clone.subscribe();

        assert!(clone.remove("modA", DataType::Mod).is_some());
        assert!(registry.is_empty());
        assert!(matches!(rx.try_recv().unwrap(), RegistryEvent::ModRemoved { .. }));
        assert!(registry.remove("modA", DataType::Mod).is_none());
    }
}
