//! Filesystem watcher configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the polling filesystem watcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsWatchConfig {
    /// Seconds between polling passes.
    pub poll_interval_secs: u64,
}

impl Default for FsWatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
        }
    }
}

impl FsWatchConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_two_seconds() {
        assert_eq!(FsWatchConfig::default().poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn should_clamp_a_zero_interval() {
        let config = FsWatchConfig {
            poll_interval_secs: 0,
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn should_deserialize_from_toml() {
        let config: FsWatchConfig = toml::from_str("poll_interval_secs = 10").unwrap();
        assert_eq!(config.poll_interval_secs, 10);
    }
}
