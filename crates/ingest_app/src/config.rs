use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ingest_engine::{ConnectionSettings, SubmitSettings, TrackerSettings};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "ingest.ron";

/// Settings read from `ingest.ron`. Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub api_base: String,
    pub state_dir: PathBuf,
    pub log_file: PathBuf,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub cleanup_delay_ms: u64,
    pub max_frame_bytes: usize,
    /// File the settings were read from; `None` when defaults are used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let connection = ConnectionSettings::default();
        let submit = SubmitSettings::default();
        let tracker = TrackerSettings::default();
        Self {
            server_url: connection.url,
            api_base: submit.api_base,
            state_dir: PathBuf::from(".ingest"),
            log_file: PathBuf::from("./engine.log"),
            reconnect_delay_ms: millis(connection.reconnect_delay),
            connect_timeout_secs: connection.connect_timeout.as_secs(),
            request_timeout_secs: submit.request_timeout.as_secs(),
            cleanup_delay_ms: millis(tracker.cleanup_delay),
            max_frame_bytes: connection.max_frame_bytes,
            source: None,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `ingest.ron` in the working directory when no path is
    /// given. Only an explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILENAME), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: AppConfig = ron::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.source = Some(path);
        Ok(config)
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            connection: ConnectionSettings {
                url: self.server_url.clone(),
                reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                max_frame_bytes: self.max_frame_bytes,
            },
            cleanup_delay: Duration::from_millis(self.cleanup_delay_ms),
            ..TrackerSettings::default()
        }
    }

    pub fn submit_settings(&self) -> SubmitSettings {
        SubmitSettings {
            api_base: self.api_base.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..SubmitSettings::default()
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
