mod common;

use std::io::Write;

use common::MockController;
use ppmac_control::{ConfigError, ConnectionConfig, Session, SessionSettings};
use tempfile::NamedTempFile;

fn json_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_connection_config_defaults() {
    let file = json_file(r#"{ "host": "192.168.0.200", "password": "deltatau" }"#);
    let config = ConnectionConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config.host, "192.168.0.200");
    assert_eq!(config.user, "root");
    assert_eq!(config.port, "22");
    assert!(!config.short_startup);
    assert!(!format!("{:?}", config).contains("deltatau"), "password must not be printed");
}

#[test]
fn test_connection_config_errors() {
    let file = json_file(r#"{ "host": "" }"#);
    assert!(matches!(
        ConnectionConfig::from_json_file(file.path()),
        Err(ConfigError::Invalid(_))
    ));

    let file = json_file("{ not json");
    assert!(matches!(
        ConnectionConfig::from_json_file(file.path()),
        Err(ConfigError::Json(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ConnectionConfig::from_json_file(dir.path().join("absent.json")),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_session_settings_fill_defaults() {
    let file = json_file(r#"{ "common_timeout_ms": 2500 }"#);
    let settings = SessionSettings::from_json_file(file.path()).unwrap();

    assert_eq!(
        settings,
        SessionSettings {
            common_timeout_ms: 2500,
            ..SessionSettings::default()
        }
    );
    assert_eq!(settings.lock_wait_ms, 200);
    assert_eq!(settings.handshake_read_timeout_ms, 2000);
}

#[test]
fn test_zero_settings_rejected() {
    let file = json_file(r#"{ "lock_wait_ms": 0 }"#);
    assert!(matches!(
        SessionSettings::from_json_file(file.path()),
        Err(ConfigError::Invalid(_))
    ));

    let settings = SessionSettings {
        common_timeout_ms: 0,
        ..SessionSettings::default()
    };
    assert!(Session::with_settings(MockController::replying("").factory(), settings).is_err());
}

#[test]
fn test_session_starts_with_configured_timeout() {
    let settings = SessionSettings {
        common_timeout_ms: 4000,
        ..SessionSettings::default()
    };
    let session = Session::with_settings(MockController::replying("").factory(), settings).unwrap();
    assert_eq!(session.timeout(), 4000);
}
