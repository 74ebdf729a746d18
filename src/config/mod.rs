use crate::models::ManagerConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

pub const CONFIG_FILE: &str = "w3modkit.yaml";
pub const ENV_PREFIX: &str = "W3MM";

/// Loads and saves `w3modkit.yaml`.
///
/// Values from the file are overridden by `W3MM_*` environment variables,
/// with `__` separating nested keys (`W3MM_SCAN__SEARCH_LIMIT=20`).
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at `config_dir`, creating it if needed.
    pub fn new(config_dir: impl AsRef<Utf8Path>) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> Utf8PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Load the manager configuration. A missing file yields defaults.
    pub fn load_config(&self) -> Result<ManagerConfig> {
        self.load_with_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(&self, env: Environment) -> Result<ManagerConfig> {
        let path = self.config_path();
        if !path.exists() {
            tracing::warn!("{} not found, using defaults", path);
        }

        let layered = Config::builder()
            .add_source(
                File::from(path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read config layers for {}", path))?;

        let config: ManagerConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", path))?;

        tracing::info!("Loaded config from {}", path);
        Ok(config)
    }

    pub fn save_config(&self, config: &ManagerConfig) -> Result<()> {
        let path = self.config_path();
        let yaml = serde_yaml_ng::to_string(config).context("Failed to serialize config")?;

        fs::write(&path, yaml).with_context(|| format!("Failed to write config: {}", path))?;

        tracing::info!("Saved config to {}", path);
        Ok(())
    }
}
