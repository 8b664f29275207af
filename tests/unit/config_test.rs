//! Unit tests for settings loading
//!
//! Covers defaults, file overrides, environment variable precedence and
//! validation of loaded values.

use lighter_breaker::config::{self, BreakerSettings, ConfigError};
use serial_test::serial;
use std::env;

mod utils {
    use std::fs;
    use std::path::PathBuf;

    /// Write a config file under the system temp dir and return its path
    pub fn create_temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "lighter-breaker-{}-{}.toml",
            std::process::id(),
            name
        ));
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove_temp_config(path: &PathBuf) {
        let _ = fs::remove_file(path);
    }

    /// Clean up environment variables with LIGHTER_BREAKER prefix
    pub fn clean_env_vars() {
        let keys: Vec<String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("LIGHTER_BREAKER"))
            .map(|(k, _)| k)
            .collect();

        for key in keys {
            unsafe { std::env::remove_var(&key) };
        }
    }
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
#[serial]
fn test_load_defaults_without_sources() {
    utils::clean_env_vars();

    let settings = config::load(None).expect("defaults should load");

    assert_eq!(settings, BreakerSettings::default());
    assert_eq!(settings.max_retries, 10);
    assert_eq!(settings.open_duration_ms, 10_000);
}

#[test]
#[serial]
fn test_missing_file_is_not_an_error() {
    utils::clean_env_vars();

    let path = std::env::temp_dir().join("lighter-breaker-does-not-exist.toml");
    let settings = BreakerSettings::load(Some(path.as_path())).unwrap();

    assert_eq!(settings, BreakerSettings::default());
}

// =============================================================================
// File and environment layering
// =============================================================================

#[test]
#[serial]
fn test_file_overrides_defaults() {
    utils::clean_env_vars();
    let path = utils::create_temp_config("file", "max_retries = 3\nopen_duration_ms = 1500\n");

    let settings = config::load(Some(path.as_path()));
    utils::remove_temp_config(&path);

    let settings = settings.unwrap();
    assert_eq!(settings.max_retries, 3);
    assert_eq!(settings.open_duration_ms, 1500);
}

#[test]
#[serial]
fn test_partial_file_keeps_other_defaults() {
    utils::clean_env_vars();
    let path = utils::create_temp_config("partial", "max_retries = 4\n");

    let settings = config::load(Some(path.as_path()));
    utils::remove_temp_config(&path);

    let settings = settings.unwrap();
    assert_eq!(settings.max_retries, 4);
    assert_eq!(settings.open_duration_ms, 10_000);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    utils::clean_env_vars();
    let path = utils::create_temp_config("env", "max_retries = 3\nopen_duration_ms = 1500\n");
    unsafe { env::set_var("LIGHTER_BREAKER__MAX_RETRIES", "7") };

    let settings = config::load(Some(path.as_path()));
    utils::remove_temp_config(&path);
    utils::clean_env_vars();

    let settings = settings.unwrap();
    assert_eq!(settings.max_retries, 7);
    assert_eq!(settings.open_duration_ms, 1500);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
#[serial]
fn test_zero_max_retries_is_rejected() {
    utils::clean_env_vars();
    unsafe { env::set_var("LIGHTER_BREAKER__MAX_RETRIES", "0") };

    let result = config::load(None);
    utils::clean_env_vars();

    match result {
        Err(ConfigError::ValidationError(message)) => assert!(message.contains("max_retries")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_zero_open_duration_is_rejected() {
    utils::clean_env_vars();
    let path = utils::create_temp_config("zero", "open_duration_ms = 0\n");

    let result = config::load(Some(path.as_path()));
    utils::remove_temp_config(&path);

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
#[serial]
fn test_malformed_value_is_a_load_error() {
    utils::clean_env_vars();
    let path = utils::create_temp_config("malformed", "max_retries = \"many\"\n");

    let result = config::load(Some(path.as_path()));
    utils::remove_temp_config(&path);

    assert!(matches!(result, Err(ConfigError::Load(_))));
}
