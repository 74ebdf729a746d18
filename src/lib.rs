// w3modkit - mod classification and install engine for The Witcher 3
//
// Library crate with the classification engine, persistence and install
// logic. The binary crate (main.rs) classifies paths from the command line.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use error::{InvalidReason, ModError, Result};
pub use metrics::ScanMetrics;
pub use models::{DataType, ManagerConfig, Mod, ScanConfig};
pub use services::{CancelToken, Installer, ModBuilder};
pub use state::{ModRegistry, RegistryEvent};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
