//! Configuration loading for signal-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).
//! Every field has a default, so an empty file is a valid configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

/// Root configuration for signal-relay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration.
    pub server: ServerConfig,
    /// Rate limiting and resource caps.
    pub limits: LimitsConfig,
    /// Registry behaviour.
    pub registry: RegistryConfig,
    /// HTTP endpoints configuration.
    pub http: HttpConfig,
    /// Cleanup task configuration.
    pub cleanup: CleanupConfig,
    /// Traffic log configuration.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket listener (default: 127.0.0.1:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Path that accepts WebSocket upgrades (default: `/`).
    ///
    /// `/signaling` is always accepted as well.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

/// Rate limiting and resource caps.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum new connections per IP address per minute (default: 30).
    #[serde(default = "default_connections_per_ip")]
    pub connections_per_ip: u32,
    /// Maximum inbound messages per connection per minute (default: 600).
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
    /// Maximum inbound messages per second across all connections (default: 5000).
    #[serde(default = "default_global_messages_per_second")]
    pub global_messages_per_second: u32,
    /// Seconds a connection may stay unidentified before it is dropped (default: 30).
    #[serde(default = "default_identify_timeout_secs")]
    pub identify_timeout_secs: u64,
    /// Maximum concurrent sessions (default: 10000).
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    /// Maximum inbound frame size in bytes (default: 64KB).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Outbound messages buffered per connection before drops start (default: 256).
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

/// Registry behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Close the older connection when a new one registers the same id
    /// (default: false, the older connection stays open but unreachable).
    #[serde(default)]
    pub close_superseded: bool,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 60).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

/// Traffic log configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the per-run traffic log file. When unset, traffic
    /// records only go to the main log output.
    pub traffic_log_dir: Option<PathBuf>,
}

// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_ws_path() -> String {
    "/".to_string()
}

fn default_connections_per_ip() -> u32 {
    30
}

fn default_messages_per_minute() -> u32 {
    600
}

fn default_global_messages_per_second() -> u32 {
    5000
}

fn default_identify_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_sessions() -> usize {
    10_000
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            ws_path: default_ws_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            connections_per_ip: default_connections_per_ip(),
            messages_per_minute: default_messages_per_minute(),
            global_messages_per_second: default_global_messages_per_second(),
            identify_timeout_secs: default_identify_timeout_secs(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            max_message_size: default_max_message_size(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds
    /// values the relay cannot run with.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// Used for the implicit `relay.toml`; an explicitly requested file
    /// should go through [`Config::from_file`] so a typo is an error.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values that would make rate limiters or queues unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        let checks = [
            ("limits.connections_per_ip", limits.connections_per_ip as u64),
            ("limits.messages_per_minute", limits.messages_per_minute as u64),
            (
                "limits.global_messages_per_second",
                limits.global_messages_per_second as u64,
            ),
            ("limits.identify_timeout_secs", limits.identify_timeout_secs),
            ("limits.outbound_buffer", limits.outbound_buffer as u64),
            ("limits.max_message_size", limits.max_message_size as u64),
            ("cleanup.interval_secs", self.cleanup.interval_secs),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero",
                });
            }
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "server.ws_path",
                reason: "must start with '/'",
            });
        }
        if matches!(self.server.ws_path.as_str(), "/health" | "/metrics") {
            return Err(ConfigError::Invalid {
                field: "server.ws_path",
                reason: "collides with an HTTP endpoint",
            });
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}
