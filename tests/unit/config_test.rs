//! Tests for configuration validation and loading

use std::path::PathBuf;
use std::time::Duration;

use prometheus_slot_coordinator::config::{CoordinatorConfig, ShutdownConfig, StoreBackendConfig};
use prometheus_slot_coordinator::core::ExitPolicy;

#[test]
fn test_default_config_is_valid() {
    let cfg = CoordinatorConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_task_duration_secs, 28 * 3600);
    assert_eq!(cfg.pool_size, 5);
    assert_eq!(cfg.store, StoreBackendConfig::InMemory);
}

#[test]
fn test_invalid_values() {
    let cfg = CoordinatorConfig {
        pool_size: 0,
        ..CoordinatorConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = CoordinatorConfig {
        max_task_duration_secs: 0,
        ..CoordinatorConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = CoordinatorConfig {
        store: StoreBackendConfig::File {
            path: PathBuf::from("/tmp/lanes"),
            stream: "  ".into(),
        },
        ..CoordinatorConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = CoordinatorConfig {
        shutdown: ShutdownConfig {
            action_timeout_secs: 0,
            ..ShutdownConfig::default()
        },
        ..CoordinatorConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_str_applies_defaults() {
    let cfg = CoordinatorConfig::from_json_str(
        r#"{
            "pool_size": 8,
            "store": { "kind": "file", "path": "/var/lib/lanes" },
            "shutdown": { "exit_after_sweep": false }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.pool_size, 8);
    assert_eq!(cfg.recent_window_hours, 1);
    assert_eq!(
        cfg.store,
        StoreBackendConfig::File {
            path: PathBuf::from("/var/lib/lanes"),
            stream: "lanes".into(),
        }
    );
    assert!(cfg.shutdown.require_primary_thread);
    assert_eq!(cfg.shutdown.exit_policy(), ExitPolicy::Return);
    assert_eq!(cfg.shutdown.action_timeout(), Duration::from_secs(30));
}

#[test]
fn test_from_json_str_rejects_bad_input() {
    assert!(CoordinatorConfig::from_json_str("{ not json").is_err());
    assert!(CoordinatorConfig::from_json_str(r#"{"pool_size": 0}"#).is_err());
}

#[test]
fn test_exit_policy() {
    let shutdown = ShutdownConfig {
        exit_code: 3,
        ..ShutdownConfig::default()
    };
    assert_eq!(shutdown.exit_policy(), ExitPolicy::Exit(3));
}

#[test]
fn test_from_env() {
    std::env::set_var("SLOT_POOL_SIZE", "7");
    std::env::set_var("SLOT_MAX_TASK_DURATION_SECS", "3600");
    std::env::set_var("SLOT_STORE_PATH", "/srv/lanes");
    std::env::set_var("SLOT_SHUTDOWN_EXIT", "false");
    let cfg = CoordinatorConfig::from_env().unwrap();
    assert_eq!(cfg.pool_size, 7);
    assert_eq!(cfg.max_task_duration_secs, 3600);
    assert_eq!(
        cfg.store,
        StoreBackendConfig::File {
            path: PathBuf::from("/srv/lanes"),
            stream: "lanes".into(),
        }
    );
    assert!(!cfg.shutdown.exit_after_sweep);

    std::env::set_var("SLOT_POOL_SIZE", "many");
    assert!(CoordinatorConfig::from_env().is_err());

    for key in [
        "SLOT_POOL_SIZE",
        "SLOT_MAX_TASK_DURATION_SECS",
        "SLOT_STORE_PATH",
        "SLOT_SHUTDOWN_EXIT",
    ] {
        std::env::remove_var(key);
    }
}
