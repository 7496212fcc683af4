//! The runtime form of a rule unit.

use async_trait::async_trait;
use tracing::debug;

use apiary_app::host::HostApi;
use apiary_app::ports::engine::AutomationUnit;
use apiary_domain::error::ApiaryError;
use apiary_domain::unit::CallbackKind;

use crate::schema::{CompiledAction, Condition};

pub(crate) struct CompiledRule {
    pub on: CallbackKind,
    pub topic: Option<String>,
    pub name: Option<String>,
    pub when: Option<Condition>,
    pub actions: Vec<CompiledAction>,
}

pub(crate) struct RulesUnit {
    api: HostApi,
    rules: Vec<CompiledRule>,
}

impl RulesUnit {
    pub(crate) fn new(api: HostApi, rules: Vec<CompiledRule>) -> Self {
        Self { api, rules }
    }

    /// Run every rule of `kind` whose filters and condition accept this
    /// fire. `key` is the topic for messages and the trigger name
    /// otherwise.
    async fn fire(&self, kind: CallbackKind, key: &str, data: &serde_json::Value) {
        for rule in &self.rules {
            if rule.on != kind {
                continue;
            }
            let filter = match kind {
                CallbackKind::Message => rule.topic.as_deref(),
                _ => rule.name.as_deref(),
            };
            if filter.is_some_and(|filter| filter != key) {
                continue;
            }
            if rule.when.as_ref().is_some_and(|when| !when.matches(data)) {
                debug!(unit = %self.api.unit_path().display(), %kind, key, "condition not met, skipping rule");
                continue;
            }
            for action in &rule.actions {
                self.apply(action, data).await;
            }
        }
    }

    pub(crate) async fn apply(&self, action: &CompiledAction, data: &serde_json::Value) {
        match action {
            CompiledAction::Publish { topic, payload } => {
                self.api.publish(topic, payload).await;
            }
            CompiledAction::Chat { text } => {
                self.api.send_chat(text).await;
            }
            CompiledAction::Notify(notification) => {
                self.api.push_notify(notification.clone()).await;
            }
            CompiledAction::Timer { name, delay, data } => {
                self.api.new_timer(name, *delay, data.clone());
            }
            CompiledAction::Ticker {
                name,
                interval,
                data,
            } => {
                self.api.new_ticker(name, *interval, data.clone());
            }
            CompiledAction::Alarm {
                name,
                days,
                hour,
                minute,
                second,
                data,
            } => {
                self.api
                    .new_alarm(name, *days, *hour, *minute, *second, data.clone());
            }
            CompiledAction::StopTimer { name } => {
                self.api.stop_timer(name);
            }
            CompiledAction::StopTicker { name } => {
                self.api.stop_ticker(name);
            }
            CompiledAction::StopAlarm { name } => {
                self.api.stop_alarm(name);
            }
            CompiledAction::SetVar { name, value } => {
                self.api.vars().set(name.clone(), value.clone());
            }
            CompiledAction::SaveData { name } => {
                self.api.vars().set(name.clone(), data.clone());
            }
            CompiledAction::DeleteVar { name } => {
                self.api.vars().delete(name);
            }
        }
    }
}

#[async_trait]
impl AutomationUnit for RulesUnit {
    async fn on_message(
        &mut self,
        topic: &str,
        data: &serde_json::Value,
    ) -> Result<(), ApiaryError> {
        self.fire(CallbackKind::Message, topic, data).await;
        Ok(())
    }

    async fn on_timer(&mut self, name: &str, data: &serde_json::Value) -> Result<(), ApiaryError> {
        self.fire(CallbackKind::Timer, name, data).await;
        Ok(())
    }

    async fn on_ticker(&mut self, name: &str, data: &serde_json::Value) -> Result<(), ApiaryError> {
        self.fire(CallbackKind::Ticker, name, data).await;
        Ok(())
    }

    async fn on_alarm(&mut self, name: &str, data: &serde_json::Value) -> Result<(), ApiaryError> {
        self.fire(CallbackKind::Alarm, name, data).await;
        Ok(())
    }
}
