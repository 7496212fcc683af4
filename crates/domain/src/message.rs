//! Bus messages — what arrives from and is sent to the message bus.

use std::path::PathBuf;

/// An inbound message delivered by the bus adapter.
///
/// `data` is the decoded key/value view of the raw payload; adapters that
/// cannot decode a payload drop the message before it reaches the core.
#[derive(Debug, Clone)]
pub struct BusMessage {
    topic: String,
    payload: Vec<u8>,
    data: serde_json::Value,
}

impl BusMessage {
    /// Bundle a raw payload with its decoded view.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, data: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            data,
        }
    }

    /// Topic the message was published on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decoded key/value view of the payload.
    #[must_use]
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}

/// A publish requested by a unit, queued for the bus adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
}

/// A topic interest announced by a freshly loaded unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeEvent {
    pub topic: String,
    /// Source path of the interested unit.
    pub unit: PathBuf,
}
