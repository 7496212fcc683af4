//! Telegram transport configuration.

use serde::Deserialize;

/// Configuration for the Telegram chat transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the transport is wired up at all.
    pub enabled: bool,
    /// Bot API token.
    pub token: String,
    /// Chats every message is fanned out to.
    pub chat_ids: Vec<i64>,
    /// Base URL of the bot API.
    pub api_base: String,
    /// Number of delivery workers.
    pub workers: usize,
    /// Capacity of the delivery queue; senders block when it is full.
    pub queue_capacity: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            chat_ids: Vec::new(),
            api_base: "https://api.telegram.org".to_string(),
            workers: 2,
            queue_capacity: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_be_disabled_by_default() {
        let config = TelegramConfig::default();
        assert!(!config.enabled);
        assert!(config.token.is_empty());
        assert_eq!(config.api_base, "https://api.telegram.org");
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            enabled = true
            token = "123:abc"
            chat_ids = [42, 43]
            workers = 4
        "#;
        let config: TelegramConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.token, "123:abc");
        assert_eq!(config.chat_ids, vec![42, 43]);
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_capacity, 16);
    }
}
