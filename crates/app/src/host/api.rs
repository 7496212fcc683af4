//! The capability handle passed to every unit at load time.
//!
//! Everything a unit can do to the outside world goes through here:
//! publishing, chat and notification pushes, scheduled triggers, and the
//! shared variable store. Calls validate their arguments and log-and-drop
//! on bad input rather than fail the calling unit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use apiary_domain::message::PublishRequest;
use apiary_domain::notification::Notification;
use apiary_domain::schedule::DaySet;

use crate::ports::transport::{ChatTransport, NotificationTransport};
use crate::vars::SharedVars;

use super::triggers::TriggerSet;

/// A unit's handle onto the host. Cheap to clone; all clones refer to the
/// same unit.
#[derive(Clone)]
pub struct HostApi {
    path: Arc<PathBuf>,
    publish_tx: mpsc::Sender<PublishRequest>,
    chat: Option<Arc<dyn ChatTransport>>,
    notify: Option<Arc<dyn NotificationTransport>>,
    triggers: Arc<TriggerSet>,
    vars: SharedVars,
}

impl HostApi {
    pub(crate) fn new(
        path: PathBuf,
        publish_tx: mpsc::Sender<PublishRequest>,
        chat: Option<Arc<dyn ChatTransport>>,
        notify: Option<Arc<dyn NotificationTransport>>,
        triggers: Arc<TriggerSet>,
        vars: SharedVars,
    ) -> Self {
        Self {
            path: Arc::new(path),
            publish_tx,
            chat,
            notify,
            triggers,
            vars,
        }
    }

    /// Source path of the unit this handle belongs to.
    #[must_use]
    pub fn unit_path(&self) -> &Path {
        &self.path
    }

    /// Queue a message for publication on the bus. Awaiting blocks while
    /// the publish queue is full; an empty topic or payload is logged and
    /// dropped.
    pub async fn publish(&self, topic: &str, payload: &str) {
        if topic.is_empty() {
            warn!(unit = %self.path.display(), "publish with empty topic, dropping");
            return;
        }
        if payload.is_empty() {
            warn!(unit = %self.path.display(), topic, "publish with empty payload, dropping");
            return;
        }
        let request = PublishRequest {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        if self.publish_tx.send(request).await.is_err() {
            debug!(unit = %self.path.display(), topic, "publish pump is gone, dropping message");
        }
    }

    /// Queue a chat message. Dropped with a warning when no chat transport
    /// is configured or the text is empty.
    pub async fn send_chat(&self, text: &str) {
        let Some(chat) = &self.chat else {
            warn!(unit = %self.path.display(), "chat transport not configured, dropping message");
            return;
        };
        if text.is_empty() {
            warn!(unit = %self.path.display(), "chat message with empty text, dropping");
            return;
        }
        chat.send_message(text.to_string()).await;
    }

    /// Queue a push notification. Dropped with a warning when no
    /// notification transport is configured or the topic is empty.
    pub async fn push_notify(&self, notification: Notification) {
        let Some(notify) = &self.notify else {
            warn!(unit = %self.path.display(), "notification transport not configured, dropping");
            return;
        };
        if notification.topic.is_empty() {
            warn!(unit = %self.path.display(), "notification with empty topic, dropping");
            return;
        }
        notify.push(notification).await;
    }

    /// Create a one-shot timer owned by this unit. Returns `false` on an
    /// empty name or a duplicate.
    pub fn new_timer(&self, name: &str, delay: Duration, data: serde_json::Value) -> bool {
        if name.is_empty() {
            warn!(unit = %self.path.display(), "timer with empty name, rejecting");
            return false;
        }
        let created = self.triggers.new_timer(name, delay, data);
        if !created {
            warn!(unit = %self.path.display(), name, "timer already exists, rejecting");
        }
        created
    }

    /// Stop a timer by name; `false` when no such timer exists.
    pub fn stop_timer(&self, name: &str) -> bool {
        self.triggers.stop_timer(name)
    }

    /// Create a repeating ticker owned by this unit. Returns `false` on an
    /// empty name or a duplicate.
    pub fn new_ticker(&self, name: &str, interval: Duration, data: serde_json::Value) -> bool {
        if name.is_empty() {
            warn!(unit = %self.path.display(), "ticker with empty name, rejecting");
            return false;
        }
        let created = self.triggers.new_ticker(name, interval, data);
        if !created {
            warn!(unit = %self.path.display(), name, "ticker already exists, rejecting");
        }
        created
    }

    /// Stop a ticker by name; `false` when no such ticker exists.
    pub fn stop_ticker(&self, name: &str) -> bool {
        self.triggers.stop_ticker(name)
    }

    /// Create a weekly alarm owned by this unit. Returns `false` on an
    /// empty name, an out-of-range time of day, or a duplicate.
    pub fn new_alarm(
        &self,
        name: &str,
        days: DaySet,
        hour: u8,
        minute: u8,
        second: u8,
        data: serde_json::Value,
    ) -> bool {
        if name.is_empty() {
            warn!(unit = %self.path.display(), "alarm with empty name, rejecting");
            return false;
        }
        if hour > 23 || minute > 59 || second > 59 {
            warn!(unit = %self.path.display(), name, hour, minute, second, "alarm with invalid time of day, rejecting");
            return false;
        }
        let created = self.triggers.new_alarm(name, days, hour, minute, second, data);
        if !created {
            warn!(unit = %self.path.display(), name, "alarm already exists, rejecting");
        }
        created
    }

    /// Stop an alarm by name; `false` when no such alarm exists.
    pub fn stop_alarm(&self, name: &str) -> bool {
        self.triggers.stop_alarm(name)
    }

    /// The process-wide variable store shared across all units.
    #[must_use]
    pub fn vars(&self) -> &SharedVars {
        &self.vars
    }
}
