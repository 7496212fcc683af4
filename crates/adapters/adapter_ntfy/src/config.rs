//! ntfy transport configuration.

use serde::Deserialize;

/// Configuration for the ntfy notification transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NtfyConfig {
    /// Whether the transport is wired up at all.
    pub enabled: bool,
    /// Base URL of the ntfy server.
    pub server: String,
    /// Priority applied when a notification does not set one (ntfy knows
    /// `1` lowest through `5` highest).
    pub default_priority: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Number of delivery workers.
    pub workers: usize,
    /// Capacity of the delivery queue; senders block when it is full.
    pub queue_capacity: usize,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: "https://ntfy.sh".to_string(),
            default_priority: "3".to_string(),
            request_timeout_secs: 10,
            workers: 1,
            queue_capacity: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_be_disabled_by_default() {
        let config = NtfyConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.server, "https://ntfy.sh");
        assert_eq!(config.default_priority, "3");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.workers, 1);
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            enabled = true
            server = "https://ntfy.example.com"
            default_priority = "4"
        "#;
        let config: NtfyConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.server, "https://ntfy.example.com");
        assert_eq!(config.default_priority, "4");
    }
}
