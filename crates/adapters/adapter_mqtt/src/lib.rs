//! # apiary-adapter-mqtt
//!
//! MQTT adapter — the hub's publish/subscribe bus over an MQTT broker.
//!
//! ## Responsibilities
//! - Maintain the broker session (rumqttc drives the reconnect loop)
//! - Decode inbound publishes into [`BusMessage`]s; undecodable payloads
//!   are dropped here and never reach the core
//! - Re-subscribe every known topic after a reconnect
//!
//! ## Dependency rule
//! Depends on `apiary-app` and `apiary-domain` only; the core never
//! imports this crate.

pub mod config;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use apiary_app::ports::bus::MessageBus;
use apiary_app::subscriptions::SubscriptionRegistry;
use apiary_domain::error::ApiaryError;
use apiary_domain::message::BusMessage;

pub use config::MqttConfig;
pub use error::MqttError;

/// Outbound half of the bus. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
}

/// Inbound half of the bus: drives the rumqttc event loop.
///
/// Must be spawned; nothing moves on the session until it runs.
pub struct EventPump {
    eventloop: EventLoop,
    client: AsyncClient,
    registry: Arc<SubscriptionRegistry>,
    message_tx: mpsc::Sender<BusMessage>,
    connected_tx: watch::Sender<bool>,
    reconnect_delay: Duration,
}

impl MqttBus {
    /// Build the client pair. Inbound messages land on `message_tx`;
    /// `registry` is consulted after reconnects to restore subscriptions.
    #[must_use]
    pub fn new(
        config: &MqttConfig,
        registry: Arc<SubscriptionRegistry>,
        message_tx: mpsc::Sender<BusMessage>,
    ) -> (Self, EventPump) {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.into()));
        if !config.username.is_empty() {
            options.set_credentials(config.username.clone(), config.password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity.max(1));
        let (connected_tx, connected) = watch::channel(false);

        let bus = Self {
            client: client.clone(),
            connected,
        };
        let pump = EventPump {
            eventloop,
            client,
            registry,
            message_tx,
            connected_tx,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs.into()),
        };
        (bus, pump)
    }
}

impl MessageBus for MqttBus {
    async fn connect(&self) -> Result<(), ApiaryError> {
        let mut connected = self.connected.clone();
        loop {
            if *connected.borrow_and_update() {
                return Ok(());
            }
            connected
                .changed()
                .await
                .map_err(|_| MqttError::NotConnected.into_domain())?;
        }
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), ApiaryError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(MqttError::Client)?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), ApiaryError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(MqttError::Client)?;
        Ok(())
    }
}

impl EventPump {
    /// Drive the session until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = self.eventloop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to MQTT broker");
                    let _ = self.connected_tx.send(true);
                    Self::restore_subscriptions(&self.client, &self.registry).await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match decode(&publish.topic, &publish.payload) {
                        Ok(message) => {
                            if self.message_tx.send(message).await.is_err() {
                                debug!("message pump is gone, stopping");
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(topic = publish.topic, error = %err, "undecodable payload, dropping message");
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    let _ = self.connected_tx.send(false);
                    warn!(error = %err, "MQTT connection lost, retrying");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }
        debug!("MQTT event pump stopped");
    }

    // Borrows only the fields it uses so the future stays `Send`:
    // borrowing all of `&self` would require the non-`Sync` `EventLoop`.
    async fn restore_subscriptions(client: &AsyncClient, registry: &SubscriptionRegistry) {
        for topic in registry.all_topics() {
            if let Err(err) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                error!(topic, error = %err, "failed to restore subscription");
            }
        }
    }
}

/// Decode one inbound publish. Payloads must be valid JSON.
fn decode(topic: &str, payload: &[u8]) -> Result<BusMessage, MqttError> {
    let data = serde_json::from_slice(payload).map_err(MqttError::PayloadParse)?;
    Ok(BusMessage::new(topic, payload.to_vec(), data))
}
