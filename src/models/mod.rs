//! Data models for the mod engine.
//!
//! - [`Mod`]: one installable unit produced by a scan, with its manifests
//! - [`BinFile`], [`ContentFile`], [`Readme`]: manifest entries
//! - [`SettingsFragment`]: parsed `user.settings`/`input.settings` snippets
//! - [`ManagerConfig`]: configuration loaded from `w3modkit.yaml`
//!
//! Manifest paths are relative and `/`-separated; records serialize to the
//! sidecar JSON format with serde.

pub mod config;
pub mod files;
pub mod mod_record;
pub mod settings;

pub use config::{ManagerConfig, ScanConfig};
pub use files::{BinFile, ContentFile, MENU_CONFIG_DIR, Readme};
pub use mod_record::{DataType, FieldValue, Mod, ModField, UNDEFINED_SUFFIX};
pub use settings::{SettingsFragment, SettingsKind};
