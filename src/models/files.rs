use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Game directory that holds menu and input definitions.
pub const MENU_CONFIG_DIR: &str = "bin/config/r4game/user_config_matrix/pc";

/// Script file extension inside `content/scripts`.
pub const SCRIPT_EXTENSION: &str = "ws";

/// A loose file and the place it lands in the game's `bin` layout.
///
/// Both paths are relative and `/`-separated: `source` is relative to the
/// owning mod's source directory, `target` to the game root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinFile {
    pub source: String,
    pub target: String,
}

impl BinFile {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// True when the file lands in the menu-config directory.
    pub fn is_menu_file(&self) -> bool {
        match self.target.rsplit_once('/') {
            Some((dir, _)) => dir.eq_ignore_ascii_case(MENU_CONFIG_DIR),
            None => false,
        }
    }
}

impl Ord for BinFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source
            .cmp(&other.source)
            .then_with(|| self.target.cmp(&other.target))
    }
}

impl PartialOrd for BinFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A file below a `content` directory plus its fingerprint.
///
/// Identity is the relative `source` path only; the hash is change-tracking
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFile {
    pub source: String,
    pub hash: String,
}

impl ContentFile {
    pub fn new(source: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            hash: hash.into(),
        }
    }

    pub fn is_script(&self) -> bool {
        self.source
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
    }
}

impl PartialEq for ContentFile {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ContentFile {}

impl Hash for ContentFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl Ord for ContentFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source.cmp(&other.source)
    }
}

impl PartialOrd for ContentFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A readme shipped with a package, with its full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readme {
    pub source: String,
    pub content: String,
}
