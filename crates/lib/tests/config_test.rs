//! # Configuration Tests
//!
//! Environment variables are process-global, so every test here runs
//! serially and clears the variables it touches.

use hpetl::config::{get_config, ConfigError, ValidationPolicy};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const VARS: &[&str] = &[
    "DATA_DIR",
    "API_BASE_URL",
    "API_RESOURCE",
    "PAGE_SIZE",
    "MONGO_CONNECTION",
    "MONGO_DATABASE",
    "VALIDATION_POLICY",
    "HPETL_RETRY__RETRY_COUNT",
    "HPETL_RETRY__CONNECT_TIMEOUT_SECS",
    "HPETL_MONGO_DATABASE",
    "TEST_MONGO_HOST",
];

fn clear_env_vars() {
    for var in VARS {
        env::remove_var(var);
    }
}

fn yaml_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_get_config_defaults() {
    clear_env_vars();

    let config = get_config(None).expect("defaults should load");

    assert_eq!(config.data_dir, PathBuf::from("data"));
    assert_eq!(config.api_base_url, "https://hp-api.onrender.com/api");
    assert_eq!(config.api_resource, "characters");
    assert_eq!(config.page_size, None);
    assert_eq!(config.mongo_connection, "mongodb://localhost:27017/");
    assert_eq!(config.mongo_database, "harry_potter");
    assert_eq!(config.validation_policy, ValidationPolicy::Skip);
    assert_eq!(config.retry.retry_count, 3);
}

#[test]
#[serial]
fn test_plain_env_vars_override_defaults() {
    clear_env_vars();
    env::set_var("DATA_DIR", "/app/data");
    env::set_var("MONGO_CONNECTION", "mongodb://mongo:27017/");
    env::set_var("PAGE_SIZE", "50");
    env::set_var("VALIDATION_POLICY", "abort");

    let config = get_config(None).unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/app/data"));
    assert_eq!(config.mongo_connection, "mongodb://mongo:27017/");
    assert_eq!(config.page_size, Some(50));
    assert_eq!(config.validation_policy, ValidationPolicy::Abort);

    clear_env_vars();
}

#[test]
#[serial]
fn test_prefixed_env_vars_set_nested_keys() {
    clear_env_vars();
    env::set_var("HPETL_RETRY__RETRY_COUNT", "7");
    env::set_var("HPETL_RETRY__CONNECT_TIMEOUT_SECS", "2");

    let config = get_config(None).unwrap();

    assert_eq!(config.retry.retry_count, 7);
    assert_eq!(config.retry.connect_timeout_secs, 2);
    assert_eq!(config.retry.backoff_interval_ms, 500);

    clear_env_vars();
}

#[test]
#[serial]
fn test_yaml_file_with_substitution_and_env_precedence() {
    clear_env_vars();
    env::set_var("TEST_MONGO_HOST", "db.internal");
    env::set_var("HPETL_MONGO_DATABASE", "from_env");

    let file = yaml_file(
        r#"
data_dir: /srv/hp
mongo_connection: "mongodb://${TEST_MONGO_HOST}:27017/"
mongo_database: from_file
retry:
  backoff_interval_ms: 10
"#,
    );

    let config = get_config(file.path().to_str()).unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/srv/hp"));
    assert_eq!(config.mongo_connection, "mongodb://db.internal:27017/");
    assert_eq!(config.mongo_database, "from_env");
    assert_eq!(config.retry.backoff_interval_ms, 10);
    assert_eq!(config.retry.retry_count, 3);

    clear_env_vars();
}

#[test]
#[serial]
fn test_explicit_missing_config_file_is_an_error() {
    clear_env_vars();

    let result = get_config(Some("/definitely/not/here/hpetl.yml"));

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}
