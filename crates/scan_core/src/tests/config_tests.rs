use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

#[test]
fn defaults_match_the_reference_deployment() {
    let settings = ClientSettings::default();
    assert_eq!(settings.poll_interval(), Duration::from_secs(2));
    assert_eq!(
        settings.ingest_config(),
        IngestConfig {
            max_files: 20,
            max_size_bytes: 10 * 1024 * 1024,
        }
    );
    assert_eq!(settings.api_base_url(), "http://127.0.0.1:8002/api");
}

#[test]
fn api_base_url_normalizes_trailing_slashes() {
    let settings = ClientSettings {
        server_url: "https://scans.example.org//".into(),
        ..ClientSettings::default()
    };
    assert_eq!(settings.api_base_url(), "https://scans.example.org/api");
}

#[test]
fn file_values_override_defaults() {
    let file_cfg = parse_file_settings(
        r#"
        server_url = "http://10.0.0.5:9000"
        poll_interval_ms = 500
        max_files = 5
        "#,
    )
    .expect("parse");
    let mut settings = ClientSettings::default();
    settings.merge_file(file_cfg);

    assert_eq!(settings.server_url, "http://10.0.0.5:9000");
    assert_eq!(settings.poll_interval_ms, 500);
    assert_eq!(settings.max_files, 5);
    assert_eq!(settings.max_upload_size_mb, 10);
}

#[test]
fn env_overrides_win_and_bad_numbers_are_ignored() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("TOUR_SERVER_URL", "http://first"),
        ("APP__SERVER_URL", "http://second"),
        ("APP__POLL_INTERVAL_MS", "not-a-number"),
        ("APP__MAX_UPLOAD_SIZE_MB", "25"),
    ]);
    let mut settings = ClientSettings::default();
    settings.merge_env(|key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.server_url, "http://second");
    assert_eq!(settings.poll_interval_ms, 2000);
    assert_eq!(settings.max_upload_size_mb, 25);
}

#[test]
fn loads_settings_from_file_on_disk() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("scan_core_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("tour.toml");
    fs::write(&path, "max_files = 3\nrequest_timeout_secs = 5\n").expect("write config");

    let settings = load_settings_from(&path);
    assert_eq!(settings.max_files, 3);
    assert_eq!(settings.request_timeout(), Duration::from_secs(5));

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    assert!(parse_file_settings("max_files = \"many\"").is_err());
}
