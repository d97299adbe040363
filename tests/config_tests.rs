// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use field_capture::Config;
use field_capture::backends::camera::Facing;
use field_capture::config::CONFIG_VERSION;
use field_capture::errors::ConfigError;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.version, CONFIG_VERSION);
    assert_eq!(config.constraints.max_file_count, 50);
    assert_eq!(config.constraints.max_total_bytes, 200 * 1024 * 1024);
    assert_eq!(config.constraints.max_single_file_bytes, 70 * 1024 * 1024);
    assert_eq!(
        config.capture.default_facing,
        Facing::Environment,
        "Sessions should open on the back camera"
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.constraints.max_file_count = 10;
    config.capture.default_facing = Facing::User;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        format!(r#"{{"version": {CONFIG_VERSION}, "resize": {{"jpeg_quality": 70}}}}"#),
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.resize.jpeg_quality, 70);
    assert_eq!(config.resize.scale_divisor, 2);
    assert_eq!(config.constraints, Config::default().constraints);
}

#[test]
fn test_version_mismatch_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"version": 0, "constraints": {"max_file_count": 3}}"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        format!(r#"{{"version": {CONFIG_VERSION}, "constraints": {{"max_file_count": 0}}}}"#),
    )
    .unwrap();
    assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_save_failure_is_a_write_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let result = Config::default().save_to(&blocker.join("config.json"));

    assert!(matches!(result, Err(ConfigError::Write(_))));
    assert!(
        result
            .unwrap_err()
            .to_string()
            .starts_with("Failed to write config")
    );
}
