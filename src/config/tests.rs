//! Tests for Configuration Module

use super::*;
use crate::core::options::HelperExecutable;
use semver::Version;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Create a test config store with temporary directory
async fn create_test_store() -> (ConfigStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let settings = ConfigStoreConfig {
        config_path: temp_dir.path().join("update.json"),
        create_default: true,
    };

    let store = ConfigStore::new(settings).await.unwrap();
    (store, temp_dir)
}

#[tokio::test]
async fn test_create_default_config() {
    let (store, _temp) = create_test_store().await;

    let config = store.get().await;
    assert!(config.source.is_none());
    assert_eq!(config.http_timeout_secs, 60);
    assert_eq!(config.helper_relative_dir, PathBuf::from("updater"));
    assert_eq!(config.helper_executable, HelperExecutable::default());
    assert!(store.config_path().exists());
}

#[tokio::test]
async fn test_missing_config_without_default() {
    let temp = TempDir::new().unwrap();
    let settings = ConfigStoreConfig {
        config_path: temp.path().join("absent.json"),
        create_default: false,
    };
    assert!(matches!(
        ConfigStore::new(settings).await,
        Err(ConfigError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_set_source_persists() {
    let (store, temp) = create_test_store().await;
    let source = SourceConfig::ReleaseFeed {
        url: Url::parse("https://api.github.com/repos/acme/app/releases/latest").unwrap(),
        asset_prefix: "App".to_string(),
        extension: ".zip".to_string(),
    };

    let updated = store.set_source(source.clone()).await.unwrap();
    assert_eq!(updated.source.as_ref(), Some(&source));

    // Reload from disk
    let settings = ConfigStoreConfig {
        config_path: temp.path().join("update.json"),
        create_default: false,
    };
    let reloaded = ConfigStore::new(settings).await.unwrap();
    assert_eq!(reloaded.get().await.source, Some(source));
    assert!(!temp.path().join("update.json.tmp").exists());
}

#[tokio::test]
async fn test_reset_config() {
    let (store, _temp) = create_test_store().await;
    store
        .update(|config| config.http_timeout_secs = 5)
        .await
        .unwrap();

    let reset = store.reset().await.unwrap();
    assert_eq!(reset.http_timeout_secs, 60);
}

#[test]
fn test_source_wire_format() {
    let manifest: SourceConfig = serde_json::from_str(
        r#"{ "kind": "manifest", "url": "https://updates.example.com/manifest.json" }"#,
    )
    .unwrap();
    assert_eq!(
        manifest,
        SourceConfig::Manifest {
            url: Url::parse("https://updates.example.com/manifest.json").unwrap()
        }
    );

    let feed: SourceConfig = serde_json::from_str(
        r#"{ "kind": "release_feed", "url": "https://api.example.com/latest", "asset_prefix": "App" }"#,
    )
    .unwrap();
    match feed {
        SourceConfig::ReleaseFeed { extension, .. } => assert_eq!(extension, ".zip"),
        other => panic!("unexpected source: {other:?}"),
    }

    assert!(serde_json::from_str::<SourceConfig>(r#"{ "kind": "ftp", "url": "x" }"#).is_err());
}

#[test]
fn test_partial_document_uses_defaults() {
    let config: UpdateConfig = serde_json::from_str(
        r#"{
            "source": { "kind": "manifest", "url": "https://updates.example.com/m.json" },
            "helper_executable": { "windows": "helper.exe", "unix": "helper" },
            "temp_root": "/var/tmp/app"
        }"#,
    )
    .unwrap();

    let options = config.to_options();
    assert_eq!(options.http_timeout, Duration::from_secs(60));
    assert_eq!(options.helper_executable.unix, "helper");
    assert_eq!(options.temp_root, PathBuf::from("/var/tmp/app"));
}

#[test]
fn test_build_manager_requires_source() {
    let config = UpdateConfig::default();
    assert!(matches!(
        config.build_manager(config.to_options()),
        Err(ConfigError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_manager_from_config_checks_source() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("manifest.json");
    std::fs::write(
        &manifest,
        r#"{ "version": "9.0.0", "artifacts": { "linux-x64": { "url": "p.zip", "sha256": "00" } } }"#,
    )
    .unwrap();

    let config = UpdateConfig {
        source: Some(SourceConfig::Manifest {
            url: Url::from_file_path(&manifest).unwrap(),
        }),
        ..Default::default()
    };
    let options = config
        .to_options()
        .with_current_version(Version::new(1, 0, 0))
        .with_platform_id("linux-x64");
    let manager = config.build_manager(options).unwrap();

    let info = manager.check_for_update(&CancellationToken::new()).await.unwrap();
    assert_eq!(info.version, Version::new(9, 0, 0));
}
