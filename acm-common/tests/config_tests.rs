//! Integration tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate ACM_* variables are marked with #[serial].

use acm_common::config::{
    load_toml_config, resolve_config_path, resolve_praat_path, resolve_root_folder, Gender,
    TomlConfig, CONFIG_ENV_VAR, PRAAT_PATH_ENV_VAR, ROOT_FOLDER_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_config_file_degrades_to_defaults() {
    let config = load_toml_config(None).expect("defaults should always load");

    assert_eq!(config.server.bind, "127.0.0.1:5790");
    assert_eq!(config.tasks.idle_timeout_secs, 120);
    assert!(config.praat.path.is_none());
}

#[test]
fn test_full_config_file_round_trips_through_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("acm.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/data/acm"

[logging]
level = "debug"

[server]
bind = "0.0.0.0:8080"

[praat]
path = "/opt/praat"

[tasks]
idle_timeout_secs = 600
reaper_interval_secs = 10

[measurement]
window_offset = 0.05
gender_attribute = "participant_sex"
fallback_gender = "female"
"#,
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/data/acm")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.tasks.reaper_interval_secs, 10);
    assert_eq!(config.measurement.window_offset, 0.05);
    assert_eq!(config.measurement.gender_attribute, "participant_sex");
    assert_eq!(config.measurement.fallback_gender, Gender::Female);

    let serialized = toml::to_string(&config).unwrap();
    let reparsed: TomlConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(reparsed.server.bind, config.server.bind);
    assert_eq!(reparsed.measurement.male, config.measurement.male);
}

#[test]
fn test_malformed_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[tasks\nidle_timeout_secs = ").unwrap();

    let err = load_toml_config(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("Parse"), "unexpected error: {}", err);
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default_root() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);

    let root = resolve_root_folder(None, &TomlConfig::default());
    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("acm"));
}

#[test]
#[serial]
fn test_env_config_path_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/acm-env-config.toml");
    assert_eq!(
        resolve_config_path(None),
        Some(PathBuf::from("/tmp/acm-env-config.toml"))
    );
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_praat_env_is_ignored() {
    env::set_var(PRAAT_PATH_ENV_VAR, "   ");
    let mut config = TomlConfig::default();
    config.praat.path = Some(PathBuf::from("/opt/praat"));

    assert_eq!(resolve_praat_path(&config), PathBuf::from("/opt/praat"));
    env::remove_var(PRAAT_PATH_ENV_VAR);
}
