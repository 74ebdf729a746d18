//! Integration tests for ConfigManager and w3modkit.yaml handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Defaults for missing files and missing keys
//! - The loaded config driving the builder

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;
use w3modkit::{ConfigManager, ManagerConfig, ModBuilder};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(manager.config_path(), config_path.join("w3modkit.yaml"));
}

#[test]
fn test_nested_config_dir_is_created() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("a/b/w3modkit");

    ConfigManager::new(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn test_load_defaults_when_file_missing() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = manager.load_config().unwrap();

    assert_eq!(config.log_dir, "logs");
    assert_eq!(config.scan.search_limit, 100);
    assert!(config.scan.collect_readmes);
}

#[test]
fn test_save_and_reload() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = ManagerConfig::default();
    config.game_path = Some(config_path.join("The Witcher 3"));
    config.scratch_dir = Some(config_path.join("scratch"));
    config.scan.search_limit = 12;
    config.scan.parallel_hashing = false;
    manager.save_config(&config).unwrap();

    let raw = fs::read_to_string(manager.config_path()).unwrap();
    assert!(raw.contains("search_limit: 12"));

    let loaded = manager.load_config().unwrap();
    assert_eq!(loaded.game_path, config.game_path);
    assert_eq!(loaded.scratch_dir, config.scratch_dir);
    assert_eq!(loaded.scan.search_limit, 12);
    assert!(!loaded.scan.parallel_hashing);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.config_path(), "debug_mode: true\nscan:\n  deep_search: true\n").unwrap();

    let config = manager.load_config().unwrap();

    assert!(config.debug_mode);
    assert!(config.scan.deep_search);
    assert_eq!(config.scan.search_limit, 100);
    assert!(config.game_path.is_none());
}

#[test]
fn test_loaded_config_reaches_scanner() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.config_path(), "scan:\n  collect_readmes: false\n").unwrap();

    let config = manager.load_config().unwrap();
    let builder = ModBuilder::new(&config);

    assert!(!builder.scanner().options().collect_readmes);
}
