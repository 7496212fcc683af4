//! MQTT adapter error types.

use apiary_domain::error::ApiaryError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The MQTT session has not been established yet.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to parse an incoming MQTT payload as JSON.
    #[error("failed to parse MQTT payload")]
    PayloadParse(#[source] serde_json::Error),
}

impl MqttError {
    /// Convert into an [`ApiaryError::Transport`] for propagation across
    /// port boundaries.
    pub fn into_domain(self) -> ApiaryError {
        ApiaryError::Transport(Box::new(self))
    }
}

impl From<MqttError> for ApiaryError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
