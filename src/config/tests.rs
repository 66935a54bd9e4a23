use super::settings::{PartialSessionSettings, PartialSettings, Settings};
use super::load_config_from;
use serial_test::serial;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.session.connect_timeout_ms, 5_000);
    assert_eq!(settings.session.subscribe_timeout_ms, 10_000);
    assert_eq!(settings.reconnect.max_attempts, 3);
    assert_eq!(settings.reconnect.initial_backoff_ms, 3_000);
    assert_eq!(settings.reconnect.max_backoff_ms, 30_000);
    assert_eq!(settings.reconnect.multiplier, 2.0);
    assert_eq!(settings.logging.level, "info");
    assert_eq!(
        settings.session.subscribe_timeout(),
        Duration::from_secs(10)
    );
}

#[test]
fn test_partial_merge_keeps_defaults() {
    let partial = PartialSettings {
        session: Some(PartialSessionSettings {
            connect_timeout_ms: Some(750),
            subscribe_timeout_ms: None,
        }),
        ..Default::default()
    };

    let merged = partial.merge(Settings::default());
    assert_eq!(merged.session.connect_timeout_ms, 750);
    assert_eq!(merged.session.subscribe_timeout_ms, 10_000);
    assert_eq!(merged.reconnect, Settings::default().reconnect);
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent");
    let cfg = load_config_from(path.to_str().expect("utf-8 path")).expect("load_config failed");
    assert_eq!(cfg, Settings::default());
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let toml = r#"
        [session]
        connect_timeout_ms = 1500

        [reconnect]
        max_attempts = 7
        multiplier = 1.5

        [logging]
        level = "debug"
    "#;
    fs::write(tmp.path().join("client.toml"), toml).expect("write config file");

    let path = tmp.path().join("client");
    let cfg = load_config_from(path.to_str().expect("utf-8 path")).expect("load_config failed");
    assert_eq!(cfg.session.connect_timeout_ms, 1500);
    assert_eq!(cfg.session.subscribe_timeout_ms, 10_000);
    assert_eq!(cfg.reconnect.max_attempts, 7);
    assert_eq!(cfg.reconnect.multiplier, 1.5);
    assert_eq!(cfg.reconnect.initial_backoff_ms, 3_000);
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    fs::write(
        tmp.path().join("client.toml"),
        "[session]\nsubscribe_timeout_ms = 400\n",
    )
    .expect("write config file");
    let path = tmp.path().join("client");

    temp_env::with_vars(
        [
            ("POPSUB_CLIENT_SESSION__SUBSCRIBE_TIMEOUT_MS", Some("250")),
            ("POPSUB_CLIENT_RECONNECT__MAX_ATTEMPTS", Some("0")),
        ],
        || {
            let cfg = load_config_from(path.to_str().expect("utf-8 path"))
                .expect("load_config failed");
            assert_eq!(cfg.session.subscribe_timeout_ms, 250);
            assert_eq!(cfg.reconnect.max_attempts, 0);
            assert_eq!(cfg.session.connect_timeout_ms, 5_000);
        },
    );
}
