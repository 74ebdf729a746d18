//! Integration tests for ModRegistry with registry events
//!
//! These tests verify that the ModRegistry correctly:
//! - Registers whole scans and emits events
//! - Leaves the registry untouched on failed or cancelled scans
//! - Reloads installed mods from their markers
//! - Shares one store across clones and threads

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{Duration, timeout};
use w3modkit::{
    CancelToken, DataType, Installer, ManagerConfig, ModBuilder, ModRegistry, RegistryEvent,
};

fn utf8_temp() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
    (temp, path)
}

fn write(path: &Utf8Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<RegistryEvent>) -> RegistryEvent {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_scan_registers_and_emits() {
    let (_temp, root) = utf8_temp();
    let path = root.join("mod-with-dlc");
    write(&path.join("dlc/mod-dlc/content/blob0.bundle"), "d");
    write(&path.join("mods/mod-dlc/content/blob0.bundle"), "m");

    let registry = ModRegistry::new();
    let mut rx = registry.subscribe();
    let builder = Arc::new(ModBuilder::new(&ManagerConfig::default()));

    let count = registry.scan(builder, &path).await.unwrap();
    assert_eq!(count, 2);

    assert!(matches!(next_event(&mut rx).await, RegistryEvent::ScanStarted { .. }));
    let event = next_event(&mut rx).await;
    assert!(
        matches!(&event, RegistryEvent::ModsRegistered { filenames, .. } if filenames == &["mod-dlc", "modDlc"]),
        "Expected ModsRegistered event, got: {:?}",
        event
    );

    assert!(registry.get("mod-dlc", DataType::Dlc).is_some());
    assert!(registry.get("modDlc", DataType::Mod).is_some());
}

#[tokio::test]
async fn test_failed_scan_leaves_registry_empty() {
    let (_temp, root) = utf8_temp();
    let path = root.join("empty");
    fs::create_dir_all(path.join("modEmpty/content")).unwrap();

    let registry = ModRegistry::new();
    let mut rx = registry.subscribe();
    let builder = Arc::new(ModBuilder::new(&ManagerConfig::default()));

    assert!(registry.scan(builder, &path).await.is_err());
    assert!(registry.is_empty());

    next_event(&mut rx).await;
    let event = next_event(&mut rx).await;
    assert!(
        matches!(&event, RegistryEvent::ScanFailed { reason, .. } if reason.starts_with("Invalid mod")),
        "Expected ScanFailed event, got: {:?}",
        event
    );
}

#[tokio::test]
async fn test_cancelled_scan_registers_nothing() {
    let (_temp, root) = utf8_temp();
    let path = root.join("pack");
    write(&path.join("modA/content/blob0.bundle"), "a");

    let cancel = CancelToken::new();
    let builder = Arc::new(ModBuilder::new(&ManagerConfig::default()).with_cancel_token(cancel.clone()));
    cancel.cancel();

    let registry = ModRegistry::new();
    let mut rx = registry.subscribe();
    let err = registry.scan(builder, &path).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(registry.is_empty());
    next_event(&mut rx).await;
    assert!(matches!(next_event(&mut rx).await, RegistryEvent::ScanCancelled { .. }));
}

#[test]
fn test_load_installed_reads_markers() {
    let (_temp, root) = utf8_temp();
    let source = root.join("downloads/pack");
    write(&source.join("modA/content/blob0.bundle"), "a");
    write(&source.join("dlcs/dlcB/content/blob0.bundle"), "b");

    let game = root.join("game");
    let builder = ModBuilder::new(&ManagerConfig::default());
    let installer = Installer::new(&game);
    let installed = installer.install_path(&builder, &source, None).unwrap();
    assert_eq!(installed.len(), 2);

    // A folder without a marker and a broken marker are both skipped
    fs::create_dir_all(game.join("mods/modManual")).unwrap();
    write(&game.join("mods/modBroken/w3mm.json"), "{");

    let registry = ModRegistry::new();
    assert_eq!(registry.load_installed(&game).unwrap(), 2);

    let record = registry.get("modA", DataType::Mod).unwrap();
    assert!(record.installed);
    assert_eq!(record.package, "pack");
    assert!(registry.get("dlcB", DataType::Dlc).unwrap().installed);
}

#[test]
fn test_clones_share_state_across_threads() {
    let registry = ModRegistry::new();
    let mut handles = Vec::new();

    for i in 0..4 {
        let registry = registry.clone();
        handles.push(std::thread::spawn(move || {
            let record = w3modkit::Mod::new("P", format!("mod{i}"), DataType::Mod, "P", "/src");
            registry
                .register_scan(Utf8Path::new("/src"), Ok(vec![record]))
                .unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 4);
    assert!(registry.set_enabled("mod2", DataType::Mod, false));
    assert!(!registry.snapshot().iter().find(|m| m.filename == "mod2").unwrap().enabled);
}
