use std::fs;
use std::time::Duration;

use ingest_app::config::AppConfig;
use pretty_assertions::assert_eq;

#[test]
fn loaded_file_overrides_defaults_and_records_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingest.ron");
    fs::write(
        &path,
        r#"(server_url: "ws://backend:9000/ws", reconnect_delay_ms: 250)"#,
    )
    .unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.source.as_deref(), Some(path.as_path()));
    assert_eq!(config.server_url, "ws://backend:9000/ws");
    assert_eq!(
        config.tracker_settings().connection.reconnect_delay,
        Duration::from_millis(250)
    );
    assert_eq!(config.api_base, AppConfig::default().api_base);
}

#[test]
fn defaults_have_no_source() {
    let config = AppConfig::default();

    assert_eq!(config.source, None);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = AppConfig::load(Some(&dir.path().join("absent.ron"))).unwrap_err();

    assert!(format!("{err:#}").contains("absent.ron"));
}
