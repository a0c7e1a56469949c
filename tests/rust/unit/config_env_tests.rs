use std::env;

use serial_test::serial;
use variant_query::config::{CompilerConfig, ConfigError};

const VARS: [&str; 5] = [
    "VTQ_INLINE_THRESHOLD",
    "VTQ_BATCH_SIZE",
    "VTQ_NA",
    "VTQ_PRETTY_CACHE_ROWS",
    "VTQ_SHOW_PROGRESS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = CompilerConfig::from_env().unwrap();
    assert_eq!(config, CompilerConfig::default());
}

#[test]
#[serial]
fn test_from_env_values() {
    clear_env();
    env::set_var("VTQ_INLINE_THRESHOLD", "10");
    env::set_var("VTQ_BATCH_SIZE", "32");
    env::set_var("VTQ_NA", "NA");
    env::set_var("VTQ_SHOW_PROGRESS", "false");

    let config = CompilerConfig::from_env().unwrap();
    assert_eq!(config.inline_threshold, 10);
    assert_eq!(config.batch_size, 32);
    assert_eq!(config.na, "NA");
    assert!(!config.show_progress);
    clear_env();
}

#[test]
#[serial]
fn test_from_env_rejects_bad_values() {
    clear_env();
    env::set_var("VTQ_BATCH_SIZE", "many");
    match CompilerConfig::from_env() {
        Err(ConfigError::Parse { field, value, .. }) => {
            assert_eq!(field, "VTQ_BATCH_SIZE");
            assert_eq!(value, "many");
        }
        other => panic!("expected parse error, got {:?}", other),
    }

    env::set_var("VTQ_BATCH_SIZE", "1000");
    assert!(matches!(
        CompilerConfig::from_env(),
        Err(ConfigError::Validation(_))
    ));
    clear_env();
}
