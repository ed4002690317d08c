use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::ProfileId;
use tracing::warn;

use crate::ingest::IngestConfig;

pub const DEFAULT_CONFIG_FILE: &str = "tour.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub max_files: usize,
    pub max_upload_size_mb: u64,
    pub request_timeout_secs: u64,
    pub wheelchair_profile_id: Option<ProfileId>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8002".into(),
            poll_interval_ms: 2000,
            max_files: 20,
            max_upload_size_mb: 10,
            request_timeout_secs: 30,
            wheelchair_profile_id: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    poll_interval_ms: Option<u64>,
    max_files: Option<usize>,
    max_upload_size_mb: Option<u64>,
    request_timeout_secs: Option<u64>,
    wheelchair_profile_id: Option<ProfileId>,
}

impl ClientSettings {
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig::from_megabytes(self.max_files, self.max_upload_size_mb)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.server_url.trim().trim_end_matches('/'))
    }

    fn merge_file(&mut self, file_cfg: FileSettings) {
        if let Some(v) = file_cfg.server_url {
            self.server_url = v;
        }
        if let Some(v) = file_cfg.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = file_cfg.max_files {
            self.max_files = v;
        }
        if let Some(v) = file_cfg.max_upload_size_mb {
            self.max_upload_size_mb = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.wheelchair_profile_id {
            self.wheelchair_profile_id = Some(v);
        }
    }

    fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TOUR_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = v;
        }
        if let Some(v) = lookup("APP__MAX_FILES").and_then(|v| v.parse().ok()) {
            self.max_files = v;
        }
        if let Some(v) = lookup("APP__MAX_UPLOAD_SIZE_MB").and_then(|v| v.parse().ok()) {
            self.max_upload_size_mb = v;
        }
        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = v;
        }
        if let Some(v) = lookup("APP__WHEELCHAIR_PROFILE_ID").and_then(|v| v.parse().ok()) {
            self.wheelchair_profile_id = Some(v);
        }
    }
}

/// Defaults, then `tour.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE))
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match parse_file_settings(&raw) {
            Ok(file_cfg) => settings.merge_file(file_cfg),
            Err(err) => warn!(path = %path.display(), "ignoring config file: {err:#}"),
        }
    }

    settings.merge_env(|key| std::env::var(key).ok());
    settings
}

fn parse_file_settings(raw: &str) -> anyhow::Result<FileSettings> {
    toml::from_str(raw).context("invalid toml")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
