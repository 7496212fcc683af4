//! Unit host — lifecycle and per-unit serialization.
//!
//! Each loaded unit gets an actor task that owns its execution context
//! exclusively; every external entry (message delivery, trigger fire) is
//! an [`Invocation`] queued onto the unit's bounded channel. The actor
//! processes them one at a time, so guest code never observes concurrent
//! callbacks.
//!
//! Lifetimes form a cancellation tree: host token → unit token → trigger
//! tokens. Destroying a unit cancels everything below it in one move.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use apiary_domain::error::ApiaryError;
use apiary_domain::message::{BusMessage, PublishRequest, SubscribeEvent};

use crate::ports::engine::{AutomationUnit, UnitEngine};
use crate::ports::transport::{ChatTransport, NotificationTransport};
use crate::vars::SharedVars;

mod actor;
pub mod api;
pub mod triggers;

pub use api::HostApi;
pub use triggers::TriggerSet;

/// One queued entry into a unit's execution context.
#[derive(Debug)]
pub(crate) enum Invocation {
    Message { topic: String, data: serde_json::Value },
    Timer { name: String, data: serde_json::Value },
    Ticker { name: String, data: serde_json::Value },
    Alarm { name: String, data: serde_json::Value },
}

/// Tuning knobs for the unit host.
#[derive(Debug, Clone, Copy)]
pub struct HostConfig {
    /// Capacity of each unit's invocation queue. Producers (dispatch,
    /// triggers) block once a slow unit falls this far behind.
    pub invocation_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            invocation_capacity: 32,
        }
    }
}

impl HostConfig {
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.invocation_capacity == 0 {
            self.invocation_capacity = Self::default().invocation_capacity;
        }
        self
    }
}

struct UnitHandle {
    name: String,
    cancel: CancellationToken,
    invoke_tx: mpsc::Sender<Invocation>,
    triggers: Arc<TriggerSet>,
}

struct StagedUnit {
    handle: UnitHandle,
    unit: Box<dyn AutomationUnit>,
    invoke_rx: mpsc::Receiver<Invocation>,
    topics: Vec<String>,
}

/// Owns every loaded unit and the machinery around them.
pub struct UnitHost<E> {
    engine: E,
    config: HostConfig,
    cancel: CancellationToken,
    units: Mutex<HashMap<PathBuf, UnitHandle>>,
    publish_tx: mpsc::Sender<PublishRequest>,
    subscribe_tx: mpsc::Sender<SubscribeEvent>,
    vars: SharedVars,
    chat: Option<Arc<dyn ChatTransport>>,
    notify: Option<Arc<dyn NotificationTransport>>,
}

impl<E: UnitEngine> UnitHost<E> {
    pub fn new(
        engine: E,
        config: HostConfig,
        publish_tx: mpsc::Sender<PublishRequest>,
        subscribe_tx: mpsc::Sender<SubscribeEvent>,
    ) -> Self {
        Self {
            engine,
            config: config.normalize(),
            cancel: CancellationToken::new(),
            units: Mutex::new(HashMap::new()),
            publish_tx,
            subscribe_tx,
            vars: SharedVars::new(),
            chat: None,
            notify: None,
        }
    }

    #[must_use]
    pub fn with_chat_transport(mut self, chat: Arc<dyn ChatTransport>) -> Self {
        self.chat = Some(chat);
        self
    }

    #[must_use]
    pub fn with_notification_transport(mut self, notify: Arc<dyn NotificationTransport>) -> Self {
        self.notify = Some(notify);
        self
    }

    #[must_use]
    pub fn vars(&self) -> &SharedVars {
        &self.vars
    }

    /// Load the unit source at `path` and register it.
    ///
    /// If a unit is already loaded from `path` this behaves like
    /// [`reload`](Self::reload): the replacement is built first, and only
    /// once it initialised successfully is the old unit destroyed.
    ///
    /// # Errors
    ///
    /// Read, parse, init, and manifest-validation failures abort the load;
    /// nothing is registered and any previously loaded unit at `path`
    /// keeps running untouched.
    pub async fn load(&self, path: &Path) -> Result<(), ApiaryError> {
        let staged = self.stage(path).await?;
        let name = staged.handle.name.clone();
        self.commit(path, staged).await;
        info!(unit = %path.display(), name, "unit loaded");
        Ok(())
    }

    /// Replace the unit loaded from `path` with a freshly initialised one.
    ///
    /// # Errors
    ///
    /// Same contract as [`load`](Self::load): on failure the old unit is
    /// untouched.
    pub async fn reload(&self, path: &Path) -> Result<(), ApiaryError> {
        let staged = self.stage(path).await?;
        let name = staged.handle.name.clone();
        self.commit(path, staged).await;
        info!(unit = %path.display(), name, "unit reloaded");
        Ok(())
    }

    /// Destroy the unit loaded from `path`; returns whether one existed.
    ///
    /// Bus subscriptions recorded for the unit are left in place; stale
    /// deliveries are skipped at dispatch time.
    pub fn unload(&self, path: &Path) -> bool {
        let handle = self
            .units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        match handle {
            Some(handle) => {
                handle.cancel.cancel();
                info!(unit = %path.display(), name = handle.name, "unit unloaded");
                true
            }
            None => false,
        }
    }

    /// Queue a bus message for the unit loaded from `path`.
    ///
    /// Awaiting blocks when the unit's invocation queue is full. Unknown
    /// paths (e.g. a stale subscription after unload) are logged and
    /// skipped.
    pub async fn dispatch(&self, path: &Path, message: &BusMessage) {
        let tx = self
            .units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|handle| handle.invoke_tx.clone());
        let Some(tx) = tx else {
            warn!(unit = %path.display(), topic = message.topic(), "no unit loaded for subscription, skipping delivery");
            return;
        };
        let invocation = Invocation::Message {
            topic: message.topic().to_string(),
            data: message.data().clone(),
        };
        if tx.send(invocation).await.is_err() {
            debug!(unit = %path.display(), "unit is gone, dropping delivery");
        }
    }

    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Live `(timers, tickers, alarms)` counts for the unit at `path`;
    /// `None` when nothing is loaded there.
    #[must_use]
    pub fn trigger_counts(&self, path: &Path) -> Option<(usize, usize, usize)> {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|handle| {
                (
                    handle.triggers.timer_count(),
                    handle.triggers.ticker_count(),
                    handle.triggers.alarm_count(),
                )
            })
    }

    /// Paths of loaded units whose source file sits directly under `dir`.
    #[must_use]
    pub fn loaded_under(&self, dir: &Path) -> Vec<PathBuf> {
        let units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        let mut paths: Vec<PathBuf> = units
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect();
        paths.sort_unstable();
        paths
    }

    /// Destroy every loaded unit and stop all their triggers.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("unit host stopped");
    }

    async fn stage(&self, path: &Path) -> Result<StagedUnit, ApiaryError> {
        let cancel = self.cancel.child_token();
        let (invoke_tx, invoke_rx) = mpsc::channel(self.config.invocation_capacity);
        let triggers = Arc::new(TriggerSet::new(
            path.to_path_buf(),
            cancel.clone(),
            invoke_tx.clone(),
        ));
        let api = HostApi::new(
            path.to_path_buf(),
            self.publish_tx.clone(),
            self.chat.clone(),
            self.notify.clone(),
            Arc::clone(&triggers),
            self.vars.clone(),
        );

        let loaded = match self.engine.load(path, api).await {
            Ok(loaded) => loaded,
            Err(err) => {
                // Kill any triggers created during the failed init.
                cancel.cancel();
                return Err(err);
            }
        };
        if let Err(err) = loaded.manifest.validate() {
            cancel.cancel();
            return Err(err.into());
        }
        triggers.set_handles(loaded.manifest.handles);

        Ok(StagedUnit {
            handle: UnitHandle {
                name: loaded.manifest.name,
                cancel,
                invoke_tx,
                triggers,
            },
            unit: loaded.unit,
            invoke_rx,
            topics: loaded.manifest.subscribe,
        })
    }

    async fn commit(&self, path: &Path, staged: StagedUnit) {
        let previous = self
            .units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), staged.handle);
        if let Some(previous) = previous {
            previous.cancel.cancel();
            debug!(unit = %path.display(), name = previous.name, "previous unit destroyed");
        }

        tokio::spawn(actor::run_unit(
            path.to_path_buf(),
            staged.unit,
            staged.invoke_rx,
            self.unit_cancel(path),
        ));

        for topic in staged.topics {
            let event = SubscribeEvent {
                topic,
                unit: path.to_path_buf(),
            };
            if self.subscribe_tx.send(event).await.is_err() {
                debug!(unit = %path.display(), "subscription pump is gone, dropping announcement");
            }
        }
    }

    fn unit_cancel(&self, path: &Path) -> CancellationToken {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map_or_else(CancellationToken::new, |handle| handle.cancel.clone())
    }
}
