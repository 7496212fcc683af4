//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `apiary.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use apiary_adapter_fswatch::FsWatchConfig;
use apiary_adapter_mqtt::MqttConfig;
use apiary_adapter_ntfy::NtfyConfig;
use apiary_adapter_telegram::TelegramConfig;
use apiary_app::host::HostConfig;
use apiary_app::retry::RetryConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Unit folders and runtime settings.
    pub units: UnitsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// MQTT bus settings.
    pub mqtt: MqttConfig,
    /// Telegram chat transport settings.
    pub telegram: TelegramConfig,
    /// ntfy notification transport settings.
    pub ntfy: NtfyConfig,
    /// Filesystem watcher settings.
    pub watcher: FsWatchConfig,
    /// Retry scheduler settings.
    pub retry: RetrySection,
}

/// Where units live and how they are run.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    /// Folders scanned and watched for unit files.
    pub folders: Vec<String>,
    /// Capacity of each unit's invocation queue.
    pub invocation_capacity: usize,
    /// Capacity of the message, publish and subscribe event channels.
    pub channel_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Retry scheduler configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Outstanding-task bound per sender; `0` means unbounded.
    pub max_tasks_per_sender: usize,
    /// Backoff-delay ceiling in seconds.
    pub max_task_delay_secs: u64,
}

impl Config {
    /// Load configuration from `apiary.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the resulting configuration is semantically invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("apiary.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("APIARY_UNITS") {
            self.units.folders = val.split(':').map(ToString::to_string).collect();
        }
        if let Ok(val) = std::env::var("APIARY_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("APIARY_MQTT_PORT") {
            if let Ok(port) = val.parse() {
                self.mqtt.broker_port = port;
            }
        }
        if let Ok(val) = std::env::var("APIARY_TELEGRAM_TOKEN") {
            self.telegram.token = val;
        }
        if let Ok(val) = std::env::var("APIARY_TELEGRAM_CHAT_IDS") {
            let ids: Vec<i64> = val.split(',').filter_map(|id| id.trim().parse().ok()).collect();
            if !ids.is_empty() {
                self.telegram.chat_ids = ids;
            }
        }
        if let Ok(val) = std::env::var("APIARY_NTFY_SERVER") {
            self.ntfy.server = val;
        }
        if let Ok(val) = std::env::var("APIARY_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.units.folders.is_empty() {
            return Err(ConfigError::Validation(
                "at least one unit folder must be configured".to_string(),
            ));
        }
        if self.telegram.enabled {
            if self.telegram.token.is_empty() {
                return Err(ConfigError::Validation(
                    "telegram is enabled but no token is set".to_string(),
                ));
            }
            if self.telegram.chat_ids.is_empty() {
                return Err(ConfigError::Validation(
                    "telegram is enabled but no chat_ids are set".to_string(),
                ));
            }
        }
        if self.ntfy.enabled && self.ntfy.server.is_empty() {
            return Err(ConfigError::Validation(
                "ntfy is enabled but no server is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the unit host.
    #[must_use]
    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            invocation_capacity: self.units.invocation_capacity,
        }
    }

    /// Settings for the retry scheduler.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_tasks_per_sender: self.retry.max_tasks_per_sender,
            max_task_delay: std::time::Duration::from_secs(self.retry.max_task_delay_secs),
        }
    }
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            folders: vec!["units".to_string()],
            invocation_capacity: 32,
            channel_capacity: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "apiaryd=info,apiary=info".to_string(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_tasks_per_sender: 64,
            max_task_delay_secs: 60 * 60,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
