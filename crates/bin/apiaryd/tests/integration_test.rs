//! End-to-end smoke tests for the assembled hub.
//!
//! Each test wires the real rules engine, unit host, reconciler, and hub
//! against an in-memory bus — no broker, no network. Unit files live in a
//! temporary folder exactly as they would in production.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use apiary_adapter_rules::RulesEngine;
use apiary_app::host::{HostConfig, UnitHost};
use apiary_app::hub::Hub;
use apiary_app::ports::bus::MessageBus;
use apiary_app::ports::watch::ChangeEvent;
use apiary_app::reconciler::Reconciler;
use apiary_app::subscriptions::SubscriptionRegistry;
use apiary_domain::error::ApiaryError;
use apiary_domain::message::BusMessage;

#[derive(Clone, Default)]
struct InMemoryBus {
    published: Arc<Mutex<Vec<(String, String)>>>,
    subscribed: Arc<Mutex<Vec<String>>>,
}

impl MessageBus for InMemoryBus {
    async fn connect(&self) -> Result<(), ApiaryError> {
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), ApiaryError> {
        self.published.lock().unwrap().push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), ApiaryError> {
        self.subscribed.lock().unwrap().push(topic.to_string());
        Ok(())
    }
}

struct Stack {
    bus: InMemoryBus,
    host: Arc<UnitHost<RulesEngine>>,
    reconciler: Reconciler<RulesEngine>,
    message_tx: mpsc::Sender<BusMessage>,
    cancel: CancellationToken,
    _dir: tempfile::TempDir,
    unit_dir: PathBuf,
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Assemble the full stack around a temporary unit folder.
fn stack() -> Stack {
    let dir = tempfile::tempdir().unwrap();
    let unit_dir = dir.path().to_path_buf();

    let (message_tx, message_rx) = mpsc::channel(64);
    let (publish_tx, publish_rx) = mpsc::channel(64);
    let (subscribe_tx, subscribe_rx) = mpsc::channel(64);

    let bus = InMemoryBus::default();
    let registry = Arc::new(SubscriptionRegistry::new());
    let host = Arc::new(UnitHost::new(
        RulesEngine::new(),
        HostConfig::default(),
        publish_tx,
        subscribe_tx,
    ));
    let reconciler = Reconciler::new(Arc::clone(&host), vec![unit_dir.clone()]);
    let hub = Hub::new(bus.clone(), Arc::clone(&host), Arc::clone(&registry));

    let cancel = CancellationToken::new();
    tokio::spawn(hub.run(message_rx, publish_rx, subscribe_rx, cancel.clone()));

    Stack {
        bus,
        host,
        reconciler,
        message_tx,
        cancel,
        _dir: dir,
        unit_dir,
    }
}

// Paused-time sleeps only resume once every other task is idle, which
// makes them a quiescence barrier for the whole stack.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

const HEAT_ALERT: &str = r#"
    [unit]
    name = "heat-alert"
    subscribe = ["sensor/temp"]

    [[rule]]
    on = "message"
    topic = "sensor/temp"
    when = { field = "temp", gt = 30.0 }

    [[rule.do]]
    publish = { topic = "alert/high", payload = '{"level": "high"}' }
"#;

#[tokio::test(start_paused = true)]
async fn should_alert_exactly_once_for_a_hot_reading() {
    let stack = stack();
    std::fs::write(stack.unit_dir.join("heat-alert.toml"), HEAT_ALERT).unwrap();
    stack.reconciler.sync_all().await;
    settle().await;

    assert_eq!(
        stack.bus.subscribed.lock().unwrap().as_slice(),
        ["sensor/temp"]
    );

    stack
        .message_tx
        .send(BusMessage::new(
            "sensor/temp",
            br#"{"temp": 40}"#.to_vec(),
            serde_json::json!({"temp": 40}),
        ))
        .await
        .unwrap();
    settle().await;

    assert_eq!(
        stack.bus.published.lock().unwrap().as_slice(),
        [(
            "alert/high".to_string(),
            r#"{"level": "high"}"#.to_string()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn should_stay_quiet_for_a_mild_reading() {
    let stack = stack();
    std::fs::write(stack.unit_dir.join("heat-alert.toml"), HEAT_ALERT).unwrap();
    stack.reconciler.sync_all().await;
    settle().await;

    stack
        .message_tx
        .send(BusMessage::new(
            "sensor/temp",
            br#"{"temp": 20}"#.to_vec(),
            serde_json::json!({"temp": 20}),
        ))
        .await
        .unwrap();
    settle().await;

    assert!(stack.bus.published.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn should_apply_a_rewritten_unit_without_restart() {
    let stack = stack();
    let path = stack.unit_dir.join("heat-alert.toml");
    std::fs::write(&path, HEAT_ALERT).unwrap();
    stack.reconciler.sync_all().await;
    settle().await;

    // Lower the threshold and reload, as the watcher would.
    std::fs::write(&path, HEAT_ALERT.replace("30.0", "10.0")).unwrap();
    stack
        .reconciler
        .apply(&ChangeEvent {
            path: path.clone(),
            is_write: true,
        })
        .await;
    settle().await;
    assert!(stack.host.is_loaded(&path));

    stack
        .message_tx
        .send(BusMessage::new(
            "sensor/temp",
            br#"{"temp": 20}"#.to_vec(),
            serde_json::json!({"temp": 20}),
        ))
        .await
        .unwrap();
    settle().await;

    assert_eq!(stack.bus.published.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn should_retire_a_deleted_unit() {
    let stack = stack();
    let path = stack.unit_dir.join("heat-alert.toml");
    std::fs::write(&path, HEAT_ALERT).unwrap();
    stack.reconciler.sync_all().await;
    settle().await;

    std::fs::remove_file(&path).unwrap();
    stack
        .reconciler
        .apply(&ChangeEvent {
            path: path.clone(),
            is_write: false,
        })
        .await;
    assert!(!stack.host.is_loaded(&path));

    stack
        .message_tx
        .send(BusMessage::new(
            "sensor/temp",
            br#"{"temp": 40}"#.to_vec(),
            serde_json::json!({"temp": 40}),
        ))
        .await
        .unwrap();
    settle().await;

    assert!(stack.bus.published.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn should_drive_periodic_units_through_the_hub() {
    let stack = stack();
    std::fs::write(
        stack.unit_dir.join("heartbeat.toml"),
        r#"
        [unit]
        name = "heartbeat"

        [[setup]]
        ticker = { name = "beat", interval_secs = 30 }

        [[rule]]
        on = "ticker"
        name = "beat"

        [[rule.do]]
        publish = { topic = "hub/heartbeat", payload = "ok" }
    "#,
    )
    .unwrap();
    stack.reconciler.sync_all().await;

    tokio::time::sleep(Duration::from_secs(95)).await;
    let published = stack.bus.published.lock().unwrap().clone();
    assert_eq!(published.len(), 3);
    assert!(published
        .iter()
        .all(|(topic, payload)| topic == "hub/heartbeat" && payload == "ok"));
}
