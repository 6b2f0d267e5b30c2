use std::path::PathBuf;

use fc_protocol::{CompressionLevel, ResolutionPreset, SourceKind, DEFAULT_CADENCE_MS};
use serde::Deserialize;

/// Top-level application configuration.
/// Loaded from environment variables (prefix `FC`, section separator `__`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Relay server settings
    #[serde(default)]
    pub relay: RelayConfig,
    /// Client endpoint settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Frame producer settings
    #[serde(default)]
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Host to bind to (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,
    /// Relay port (default: 8041)
    #[serde(default = "default_relay_port")]
    pub port: u16,
    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Inbound messages above this size are dropped (default: 10 MB)
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the relay
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    /// Display name used for chat; must be non-empty once trimmed
    #[serde(default)]
    pub display_name: Option<String>,
    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSettings {
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub resolution: ResolutionPreset,
    #[serde(default)]
    pub compression: CompressionLevel,
    /// Sampling interval in milliseconds (default: 40)
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    /// Directory screenshots are written to (default: current directory)
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl AppConfig {
    /// Load config from environment variables, after an optional `.env`.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(
            config::Environment::default()
                .prefix("FC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Build from an explicit source (used by tests and embedding callers).
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let cfg = config::Config::builder().add_source(source).build()?;
        cfg.try_deserialize()
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ClientConfig {
    /// The configured display name, if it is usable.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_relay_port(),
            log_level: default_log_level(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            display_name: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            resolution: ResolutionPreset::default(),
            compression: CompressionLevel::default(),
            cadence_ms: default_cadence_ms(),
            export_dir: default_export_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_relay_port() -> u16 {
    8041
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_message_bytes() -> usize {
    fc_protocol::MAX_MESSAGE_SIZE
}
fn default_relay_url() -> String {
    "ws://127.0.0.1:8041/ws".to_string()
}
fn default_cadence_ms() -> u64 {
    DEFAULT_CADENCE_MS
}
fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}
