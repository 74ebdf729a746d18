use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Manager configuration from w3modkit.yaml
///
/// Passed explicitly to the builder and installer; nothing in the engine
/// reads process-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Game install root (the directory holding `bin`, `content`, `mods`, `dlc`).
    pub game_path: Option<Utf8PathBuf>,

    /// Where archive scratch directories are created. System temp dir if unset.
    pub scratch_dir: Option<Utf8PathBuf>,

    pub debug_mode: bool,

    pub log_dir: String,

    pub scan: ScanConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            game_path: None,
            scratch_dir: None,
            debug_mode: false,
            log_dir: "logs".to_string(),
            scan: ScanConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn mods_dir(&self) -> Option<Utf8PathBuf> {
        self.game_path.as_deref().map(|game| game.join("mods"))
    }

    pub fn dlc_dir(&self) -> Option<Utf8PathBuf> {
        self.game_path.as_deref().map(|game| game.join("dlc"))
    }

    pub fn scratch_dir(&self) -> Option<&Utf8Path> {
        self.scratch_dir.as_deref()
    }
}

/// Tunables for the classification walks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directories the validity probe may enqueue before it gives up.
    pub search_limit: usize,

    /// Keep searching past `search_limit` instead of stopping.
    pub deep_search: bool,

    /// Hash content files on the rayon pool.
    pub parallel_hashing: bool,

    pub collect_readmes: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            search_limit: 100,
            deep_search: false,
            parallel_hashing: true,
            collect_readmes: true,
        }
    }
}
