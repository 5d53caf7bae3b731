//! Tests for the logging system

use super::*;
use tempfile::TempDir;

#[test]
fn test_log_level_display() {
    assert_eq!(LogLevel::Trace.to_string(), "trace");
    assert_eq!(LogLevel::Debug.to_string(), "debug");
    assert_eq!(LogLevel::Info.to_string(), "info");
    assert_eq!(LogLevel::Warn.to_string(), "warn");
    assert_eq!(LogLevel::Error.to_string(), "error");
}

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Text);
    assert_eq!(config.output, LogOutput::Console);
    assert!(config.log_directory.is_none());
    assert!(config.include_target);
    assert!(!config.include_thread_id);
}

#[test]
fn test_logging_config_builder() {
    let config = LoggingConfig::new()
        .with_level(LogLevel::Debug)
        .with_format(LogFormat::Json)
        .with_output(LogOutput::File)
        .with_file_prefix("custom.log")
        .with_rotation(LogRotation::Hourly)
        .with_module_level("app_update::helper", LogLevel::Trace);

    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.output, LogOutput::File);
    assert_eq!(config.file_prefix, "custom.log");
    assert_eq!(config.rotation, LogRotation::Hourly);
    assert_eq!(
        config.module_levels.get("app_update::helper"),
        Some(&LogLevel::Trace)
    );
}

#[test]
fn test_helper_config_always_writes_file() {
    let temp = TempDir::new().unwrap();
    let config = LoggingConfig::helper(Some(temp.path().to_path_buf()));
    assert_eq!(config.output, LogOutput::Both);
    assert_eq!(config.log_directory.as_deref(), Some(temp.path()));
    assert_eq!(config.file_prefix, "updater.log");
    assert_eq!(config.rotation, LogRotation::Never);

    let config = LoggingConfig::helper(None);
    assert_eq!(config.log_directory, Some(default_log_directory()));
}

#[test]
fn test_config_serialization() {
    let config = LoggingConfig::helper(None).with_format(LogFormat::Json);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"json\""));
    assert!(json.contains("\"both\""));

    let parsed: LoggingConfig =
        serde_json::from_str(r#"{"level":"warn","format":"text","output":"console","log_directory":null}"#)
            .unwrap();
    assert_eq!(parsed.level, LogLevel::Warn);
    assert_eq!(parsed.file_prefix, "app-update.log");
    assert_eq!(parsed.rotation, LogRotation::Daily);
}

#[test]
fn test_env_filter_with_module_levels() {
    let config = LoggingConfig::new()
        .with_level(LogLevel::Warn)
        .with_module_level("app_update::helper", LogLevel::Debug);
    let filter = LoggingSystem::build_env_filter(&config);
    let rendered = filter.to_string();
    assert!(rendered.contains("warn"));
    assert!(rendered.contains("app_update::helper=debug"));
}

#[test]
fn test_init_creates_log_directory() {
    let temp = TempDir::new().unwrap();
    let log_dir = temp.path().join("nested").join("logs");
    let config = LoggingConfig::helper(Some(log_dir.clone())).with_output(LogOutput::File);

    // Another test may already own the global subscriber; the directory is
    // created before installation either way.
    let result = LoggingSystem::init(config);
    assert!(log_dir.is_dir());
    if let Ok(system) = result {
        assert_eq!(system.log_directory(), Some(&log_dir));
        assert_eq!(system.log_level(), LogLevel::Info);
    }
}
