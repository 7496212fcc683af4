//! # apiaryd — apiary daemon
//!
//! Composition root that wires all adapters together and runs the hub.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Construct the MQTT bus, the rules engine, and the enabled transports
//! - Load every unit from the configured folders
//! - Start the watcher/reconciler pair for hot reload
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use apiary_adapter_fswatch::PollWatcher;
use apiary_adapter_mqtt::MqttBus;
use apiary_adapter_ntfy::NtfyNotifier;
use apiary_adapter_rules::RulesEngine;
use apiary_adapter_telegram::TelegramChat;
use apiary_app::host::UnitHost;
use apiary_app::hub::Hub;
use apiary_app::ports::bus::MessageBus;
use apiary_app::reconciler::Reconciler;
use apiary_app::retry::RetryScheduler;
use apiary_app::subscriptions::SubscriptionRegistry;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();

    let cancel = CancellationToken::new();

    let capacity = config.units.channel_capacity.max(1);
    let (message_tx, message_rx) = mpsc::channel(capacity);
    let (publish_tx, publish_rx) = mpsc::channel(capacity);
    let (subscribe_tx, subscribe_rx) = mpsc::channel(capacity);
    let (change_tx, change_rx) = mpsc::channel(capacity);

    // Bus
    let registry = Arc::new(SubscriptionRegistry::new());
    let (bus, pump) = MqttBus::new(&config.mqtt, Arc::clone(&registry), message_tx);
    tokio::spawn(pump.run(cancel.child_token()));

    // Transports
    let retries = RetryScheduler::new(config.retry_config());
    let mut host = UnitHost::new(
        RulesEngine::new(),
        config.host_config(),
        publish_tx,
        subscribe_tx,
    );
    if config.telegram.enabled {
        let (chat, workers) = TelegramChat::new(&config.telegram, Arc::clone(&retries));
        workers.run(cancel.child_token());
        host = host.with_chat_transport(Arc::new(chat));
        info!("telegram transport enabled");
    }
    if config.ntfy.enabled {
        let (notifier, workers) = NtfyNotifier::new(&config.ntfy, Arc::clone(&retries))?;
        workers.run(cancel.child_token());
        host = host.with_notification_transport(Arc::new(notifier));
        info!(server = config.ntfy.server, "ntfy transport enabled");
    }
    let host = Arc::new(host);

    info!(
        host = config.mqtt.broker_host,
        port = config.mqtt.broker_port,
        "waiting for MQTT broker"
    );
    bus.connect().await?;

    // Units
    let folders: Vec<PathBuf> = config.units.folders.iter().map(PathBuf::from).collect();
    let reconciler = Reconciler::new(Arc::clone(&host), folders.clone());
    reconciler.sync_all().await;

    let reconciler_cancel = cancel.child_token();
    tokio::spawn(async move { reconciler.run(change_rx, reconciler_cancel).await });

    let watcher = PollWatcher::new(config.watcher.clone(), folders, change_tx);
    tokio::spawn(watcher.run(cancel.child_token()));

    // Hub
    let hub = Hub::new(bus, Arc::clone(&host), registry);
    let hub_task = tokio::spawn(hub.run(message_rx, publish_rx, subscribe_rx, cancel.child_token()));

    shutdown_signal().await;
    info!("shutting down");
    cancel.cancel();
    host.shutdown();
    let _ = hub_task.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
