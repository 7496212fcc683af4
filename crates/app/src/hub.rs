//! The hub — wires the bus, the subscription registry, and the unit host
//! together.
//!
//! Three pumps run in one loop:
//! - subscription announcements from freshly loaded units are recorded in
//!   the registry and forwarded to the bus (idempotently),
//! - publish requests queued by units go out on the bus,
//! - inbound bus messages are routed to every interested unit, in the
//!   registry's stable order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use apiary_domain::message::{BusMessage, PublishRequest, SubscribeEvent};

use crate::host::UnitHost;
use crate::ports::bus::MessageBus;
use crate::ports::engine::UnitEngine;
use crate::subscriptions::SubscriptionRegistry;

pub struct Hub<B, E> {
    bus: B,
    host: Arc<UnitHost<E>>,
    registry: Arc<SubscriptionRegistry>,
}

impl<B: MessageBus, E: UnitEngine> Hub<B, E> {
    pub fn new(bus: B, host: Arc<UnitHost<E>>, registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            bus,
            host,
            registry,
        }
    }

    /// Pump until cancelled or every producer is gone.
    pub async fn run(
        self,
        mut messages: mpsc::Receiver<BusMessage>,
        mut publishes: mpsc::Receiver<PublishRequest>,
        mut subscribes: mpsc::Receiver<SubscribeEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                received = messages.recv() => match received {
                    Some(message) => self.route(&message).await,
                    None => break,
                },
                received = publishes.recv() => match received {
                    Some(request) => self.forward_publish(request).await,
                    None => break,
                },
                received = subscribes.recv() => match received {
                    Some(event) => self.record_subscription(&event),
                    None => break,
                },
            }
        }
        debug!("hub stopped");
    }

    async fn route(&self, message: &BusMessage) {
        let units = self.registry.units_by_topic(message.topic());
        if units.is_empty() {
            trace!(topic = message.topic(), "no unit subscribed, dropping message");
            return;
        }
        for unit in units {
            self.host.dispatch(&unit, message).await;
        }
    }

    async fn forward_publish(&self, request: PublishRequest) {
        if let Err(err) = self
            .bus
            .publish(&request.topic, request.payload.as_bytes())
            .await
        {
            warn!(topic = request.topic, error = %err, "bus publish failed, dropping message");
        }
    }

    fn record_subscription(&self, event: &SubscribeEvent) {
        let bus = self.bus.clone();
        let topic = event.topic.clone();
        self.registry.add(&event.topic, &event.unit, move || {
            // Idempotent on the broker side, so re-announcements are fine.
            tokio::spawn(async move {
                if let Err(err) = bus.subscribe(&topic).await {
                    error!(topic, error = %err, "bus subscribe failed");
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use apiary_domain::error::ApiaryError;
    use apiary_domain::unit::{CallbackSet, UnitManifest};

    use crate::host::{HostApi, HostConfig};
    use crate::ports::engine::{AutomationUnit, LoadedUnit};

    #[derive(Clone, Default)]
    struct FakeBus {
        published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        subscribed: Arc<Mutex<Vec<String>>>,
    }

    impl MessageBus for FakeBus {
        async fn connect(&self) -> Result<(), ApiaryError> {
            Ok(())
        }

        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), ApiaryError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }

        async fn subscribe(&self, topic: &str) -> Result<(), ApiaryError> {
            self.subscribed.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    type UnitLog = Arc<Mutex<Vec<String>>>;

    struct RecordingUnit {
        log: UnitLog,
    }

    #[async_trait]
    impl AutomationUnit for RecordingUnit {
        async fn on_message(
            &mut self,
            topic: &str,
            data: &serde_json::Value,
        ) -> Result<(), ApiaryError> {
            self.log.lock().unwrap().push(format!("{topic}={data}"));
            Ok(())
        }
    }

    struct StaticEngine {
        log: UnitLog,
        topics: Vec<String>,
    }

    #[async_trait]
    impl UnitEngine for Arc<StaticEngine> {
        async fn load(&self, _path: &Path, _api: HostApi) -> Result<LoadedUnit, ApiaryError> {
            Ok(LoadedUnit {
                unit: Box::new(RecordingUnit {
                    log: Arc::clone(&self.log),
                }),
                manifest: UnitManifest {
                    name: "unit".to_string(),
                    description: String::new(),
                    subscribe: self.topics.clone(),
                    handles: CallbackSet::all(),
                },
            })
        }
    }

    struct Fixture {
        bus: FakeBus,
        host: Arc<UnitHost<Arc<StaticEngine>>>,
        log: UnitLog,
        message_tx: mpsc::Sender<BusMessage>,
        publish_tx: mpsc::Sender<PublishRequest>,
        cancel: CancellationToken,
    }

    fn spawn_hub(topics: &[&str]) -> Fixture {
        let engine = Arc::new(StaticEngine {
            log: Arc::new(Mutex::new(Vec::new())),
            topics: topics.iter().map(ToString::to_string).collect(),
        });
        let log = Arc::clone(&engine.log);

        let (message_tx, message_rx) = mpsc::channel(16);
        let (publish_tx, publish_rx) = mpsc::channel(16);
        let (subscribe_tx, subscribe_rx) = mpsc::channel(16);

        let bus = FakeBus::default();
        let host = Arc::new(UnitHost::new(
            engine,
            HostConfig::default(),
            publish_tx.clone(),
            subscribe_tx,
        ));
        let registry = Arc::new(SubscriptionRegistry::new());
        let hub = Hub::new(bus.clone(), Arc::clone(&host), registry);

        let cancel = CancellationToken::new();
        tokio::spawn(hub.run(message_rx, publish_rx, subscribe_rx, cancel.clone()));

        Fixture {
            bus,
            host,
            log,
            message_tx,
            publish_tx,
            cancel,
        }
    }

    // Paused-time sleeps only resume once every other task is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_subscribe_on_the_bus_when_a_unit_announces_interest() {
        let fixture = spawn_hub(&["sensor/temp", "sensor/humidity"]);
        fixture.host.load(Path::new("/units/a.toml")).await.unwrap();
        settle().await;

        let mut subscribed = fixture.bus.subscribed.lock().unwrap().clone();
        subscribed.sort_unstable();
        assert_eq!(subscribed, ["sensor/humidity", "sensor/temp"]);
        fixture.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn should_forward_unit_publishes_to_the_bus() {
        let fixture = spawn_hub(&[]);

        // Units publish through their HostApi; drive the same queue here.
        fixture
            .publish_tx
            .send(PublishRequest {
                topic: "alert/high".to_string(),
                payload: r#"{"temp": 40}"#.to_string(),
            })
            .await
            .unwrap();
        settle().await;

        assert_eq!(
            fixture.bus.published.lock().unwrap().as_slice(),
            [(
                "alert/high".to_string(),
                br#"{"temp": 40}"#.to_vec()
            )]
        );
        fixture.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn should_route_messages_to_every_interested_unit() {
        let fixture = spawn_hub(&["sensor/temp"]);
        fixture.host.load(Path::new("/units/a.toml")).await.unwrap();
        fixture.host.load(Path::new("/units/b.toml")).await.unwrap();
        settle().await;

        let message = BusMessage::new(
            "sensor/temp",
            br#"{"temp":40}"#.to_vec(),
            serde_json::json!({"temp": 40}),
        );
        fixture.message_tx.send(message).await.unwrap();
        settle().await;

        let log = fixture.log.lock().unwrap().clone();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|entry| entry == r#"sensor/temp={"temp":40}"#));
        fixture.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn should_drop_messages_without_subscribers() {
        let fixture = spawn_hub(&["sensor/temp"]);
        fixture.host.load(Path::new("/units/a.toml")).await.unwrap();
        settle().await;

        let message = BusMessage::new("other/topic", b"{}".to_vec(), serde_json::json!({}));
        fixture.message_tx.send(message).await.unwrap();
        settle().await;

        assert!(fixture.log.lock().unwrap().is_empty());
        fixture.cancel.cancel();
    }
}
