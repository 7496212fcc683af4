//! MQTT bus configuration.

use serde::Deserialize;

/// Configuration for the MQTT bus connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Broker username; credentials are only sent when this is non-empty.
    pub username: String,
    /// Broker password, paired with `username`.
    pub password: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Capacity of the client's outgoing request channel.
    pub channel_capacity: usize,
    /// How long to wait before retrying after a lost connection, in seconds.
    pub reconnect_delay_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "apiary".to_string(),
            username: String::new(),
            password: String::new(),
            keep_alive_secs: 30,
            channel_capacity: 64,
            reconnect_delay_secs: 5,
        }
    }
}
