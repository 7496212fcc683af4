//! On-disk schema of rule units.
//!
//! A rule unit is one TOML file:
//!
//! ```toml
//! [unit]
//! name = "heat-alert"
//! description = "publishes an alert when it gets hot"
//! subscribe = ["sensor/temp"]
//!
//! [[setup]]
//! ticker = { name = "poll", interval_secs = 60 }
//!
//! [[rule]]
//! on = "message"
//! topic = "sensor/temp"
//! when = { field = "temp", gt = 30.0 }
//!
//! [[rule.do]]
//! publish = { topic = "alert/high", payload = '{"level": "high"}' }
//! ```
//!
//! `[[setup]]` actions run once while the unit initialises; `[[rule]]`
//! blocks react to messages and trigger fires. Actions are validated at
//! load time so a broken file never replaces a running unit.

use std::time::Duration;

use serde::Deserialize;

use apiary_domain::error::ValidationError;
use apiary_domain::notification::Notification;
use apiary_domain::schedule::DaySet;
use apiary_domain::unit::{CallbackKind, CallbackSet, UnitManifest};

/// Parsed unit file, straight from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitFile {
    pub unit: ManifestSpec,
    #[serde(default)]
    pub setup: Vec<Action>,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subscribe: Vec<String>,
}

impl UnitFile {
    /// Build the manifest the host will trust for routing. The callback
    /// set is derived from what the rules actually react to.
    #[must_use]
    pub fn manifest(&self) -> UnitManifest {
        let mut handles = CallbackSet::default();
        for rule in &self.rules {
            match rule.on {
                TriggerOn::Message => handles.on_message = true,
                TriggerOn::Timer => handles.on_timer = true,
                TriggerOn::Ticker => handles.on_ticker = true,
                TriggerOn::Alarm => handles.on_alarm = true,
            }
        }
        UnitManifest {
            name: self.unit.name.clone(),
            description: self.unit.description.clone(),
            subscribe: self.unit.subscribe.clone(),
            handles,
        }
    }
}

/// What a rule reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOn {
    Message,
    Timer,
    Ticker,
    Alarm,
}

impl From<TriggerOn> for CallbackKind {
    fn from(on: TriggerOn) -> Self {
        match on {
            TriggerOn::Message => Self::Message,
            TriggerOn::Timer => Self::Timer,
            TriggerOn::Ticker => Self::Ticker,
            TriggerOn::Alarm => Self::Alarm,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub on: TriggerOn,
    /// Topic filter for `on = "message"` rules; `None` matches every
    /// subscribed topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Trigger-name filter for timer/ticker/alarm rules; `None` matches
    /// every fire of that kind.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub when: Option<Condition>,
    #[serde(default, rename = "do")]
    pub actions: Vec<Action>,
}

/// A predicate over the decoded payload. All present constraints must
/// hold; a missing field never matches.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Dot-separated path into the payload (`"sensor.temp"`).
    pub field: String,
    #[serde(default)]
    pub eq: Option<serde_json::Value>,
    #[serde(default)]
    pub ne: Option<serde_json::Value>,
    #[serde(default)]
    pub gt: Option<f64>,
    #[serde(default)]
    pub gte: Option<f64>,
    #[serde(default)]
    pub lt: Option<f64>,
    #[serde(default)]
    pub lte: Option<f64>,
}

impl Condition {
    #[must_use]
    pub fn matches(&self, data: &serde_json::Value) -> bool {
        let Some(value) = lookup(data, &self.field) else {
            return false;
        };
        if self.eq.as_ref().is_some_and(|eq| value != eq) {
            return false;
        }
        if self.ne.as_ref().is_some_and(|ne| value == ne) {
            return false;
        }
        if self.gt.is_some() || self.gte.is_some() || self.lt.is_some() || self.lte.is_some() {
            let Some(number) = value.as_f64() else {
                return false;
            };
            if self.gt.is_some_and(|bound| number <= bound)
                || self.gte.is_some_and(|bound| number < bound)
                || self.lt.is_some_and(|bound| number >= bound)
                || self.lte.is_some_and(|bound| number > bound)
            {
                return false;
            }
        }
        true
    }
}

fn lookup<'a>(data: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = data;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// One side effect, as written in the unit file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Action {
    Publish {
        topic: String,
        payload: String,
    },
    Chat {
        text: String,
    },
    Notify {
        topic: String,
        body: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        priority: String,
        #[serde(default)]
        attach: String,
    },
    Timer {
        name: String,
        delay_secs: u64,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    Ticker {
        name: String,
        interval_secs: u64,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    Alarm {
        name: String,
        days: Vec<String>,
        hour: u8,
        #[serde(default)]
        minute: u8,
        #[serde(default)]
        second: u8,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    StopTimer {
        name: String,
    },
    StopTicker {
        name: String,
    },
    StopAlarm {
        name: String,
    },
    SetVar {
        name: String,
        value: serde_json::Value,
    },
    /// Store the payload that fired the rule under a shared-variable name.
    SaveData {
        name: String,
    },
    DeleteVar {
        name: String,
    },
}

/// An action with its arguments validated and normalized.
#[derive(Debug, Clone)]
pub enum CompiledAction {
    Publish { topic: String, payload: String },
    Chat { text: String },
    Notify(Notification),
    Timer { name: String, delay: Duration, data: serde_json::Value },
    Ticker { name: String, interval: Duration, data: serde_json::Value },
    Alarm {
        name: String,
        days: DaySet,
        hour: u8,
        minute: u8,
        second: u8,
        data: serde_json::Value,
    },
    StopTimer { name: String },
    StopTicker { name: String },
    StopAlarm { name: String },
    SetVar { name: String, value: serde_json::Value },
    SaveData { name: String },
    DeleteVar { name: String },
}

/// Validate one action.
///
/// # Errors
///
/// Rejects empty trigger names, zero ticker intervals, unknown day
/// tokens, and out-of-range times of day.
pub fn compile(action: Action) -> Result<CompiledAction, ValidationError> {
    Ok(match action {
        Action::Publish { topic, payload } => CompiledAction::Publish { topic, payload },
        Action::Chat { text } => CompiledAction::Chat { text },
        Action::Notify {
            topic,
            body,
            title,
            priority,
            attach,
        } => CompiledAction::Notify(Notification {
            topic,
            title,
            body,
            priority,
            attach,
        }),
        Action::Timer {
            name,
            delay_secs,
            data,
        } => {
            if name.is_empty() {
                return Err(ValidationError::InvalidTrigger("timer name must not be empty"));
            }
            CompiledAction::Timer {
                name,
                delay: Duration::from_secs(delay_secs),
                data: data.unwrap_or(serde_json::Value::Null),
            }
        }
        Action::Ticker {
            name,
            interval_secs,
            data,
        } => {
            if name.is_empty() {
                return Err(ValidationError::InvalidTrigger("ticker name must not be empty"));
            }
            if interval_secs == 0 {
                return Err(ValidationError::InvalidTrigger("ticker interval must not be zero"));
            }
            CompiledAction::Ticker {
                name,
                interval: Duration::from_secs(interval_secs),
                data: data.unwrap_or(serde_json::Value::Null),
            }
        }
        Action::Alarm {
            name,
            days,
            hour,
            minute,
            second,
            data,
        } => {
            if name.is_empty() {
                return Err(ValidationError::InvalidTrigger("alarm name must not be empty"));
            }
            if hour > 23 || minute > 59 || second > 59 {
                return Err(ValidationError::InvalidTimeOfDay {
                    hour,
                    minute,
                    second,
                });
            }
            CompiledAction::Alarm {
                name,
                days: DaySet::from_tokens(&days)?,
                hour,
                minute,
                second,
                data: data.unwrap_or(serde_json::Value::Null),
            }
        }
        Action::StopTimer { name } => CompiledAction::StopTimer { name },
        Action::StopTicker { name } => CompiledAction::StopTicker { name },
        Action::StopAlarm { name } => CompiledAction::StopAlarm { name },
        Action::SetVar { name, value } => CompiledAction::SetVar { name, value },
        Action::SaveData { name } => CompiledAction::SaveData { name },
        Action::DeleteVar { name } => CompiledAction::DeleteVar { name },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_a_full_unit_file() {
        let toml = r#"
            [unit]
            name = "heat-alert"
            description = "publishes an alert when it gets hot"
            subscribe = ["sensor/temp"]

            [[setup]]
            ticker = { name = "poll", interval_secs = 60 }

            [[rule]]
            on = "message"
            topic = "sensor/temp"
            when = { field = "temp", gt = 30.0 }

            [[rule.do]]
            publish = { topic = "alert/high", payload = '{"level": "high"}' }

            [[rule]]
            on = "ticker"
            name = "poll"

            [[rule.do]]
            chat = { text = "still alive" }
        "#;
        let file: UnitFile = toml::from_str(toml).unwrap();
        assert_eq!(file.unit.name, "heat-alert");
        assert_eq!(file.setup.len(), 1);
        assert_eq!(file.rules.len(), 2);
        assert_eq!(file.rules[0].on, TriggerOn::Message);
        assert_eq!(file.rules[1].name.as_deref(), Some("poll"));
    }

    #[test]
    fn should_derive_handles_from_rules() {
        let toml = r#"
            [unit]
            name = "u"

            [[rule]]
            on = "message"

            [[rule]]
            on = "alarm"
        "#;
        let file: UnitFile = toml::from_str(toml).unwrap();
        let manifest = file.manifest();
        assert!(manifest.handles.on_message);
        assert!(manifest.handles.on_alarm);
        assert!(!manifest.handles.on_timer);
        assert!(!manifest.handles.on_ticker);
    }

    #[test]
    fn should_reject_unknown_fields() {
        let toml = r#"
            [unit]
            name = "u"
            subscribes = ["typo"]
        "#;
        assert!(toml::from_str::<UnitFile>(toml).is_err());
    }

    #[test]
    fn should_match_equality_and_bounds() {
        let condition: Condition =
            toml::from_str(r#"field = "temp"
gt = 30.0"#).unwrap();
        assert!(condition.matches(&serde_json::json!({"temp": 40})));
        assert!(!condition.matches(&serde_json::json!({"temp": 30})));
        assert!(!condition.matches(&serde_json::json!({"temp": "hot"})));
        assert!(!condition.matches(&serde_json::json!({"other": 40})));
    }

    #[test]
    fn should_match_nested_fields_by_dot_path() {
        let condition: Condition = toml::from_str(
            r#"field = "sensor.state"
eq = "open""#,
        )
        .unwrap();
        assert!(condition.matches(&serde_json::json!({"sensor": {"state": "open"}})));
        assert!(!condition.matches(&serde_json::json!({"sensor": {"state": "closed"}})));
    }

    #[test]
    fn should_require_every_constraint_to_hold() {
        let condition: Condition = toml::from_str(
            r#"field = "temp"
gte = 10.0
lte = 20.0"#,
        )
        .unwrap();
        assert!(condition.matches(&serde_json::json!({"temp": 15})));
        assert!(condition.matches(&serde_json::json!({"temp": 10})));
        assert!(!condition.matches(&serde_json::json!({"temp": 25})));
    }

    #[test]
    fn should_compile_an_alarm_with_day_tokens() {
        let action = Action::Alarm {
            name: "wake".to_string(),
            days: vec!["mon".to_string(), "friday".to_string()],
            hour: 7,
            minute: 30,
            second: 0,
            data: None,
        };
        let compiled = compile(action).unwrap();
        let CompiledAction::Alarm { days, hour, .. } = compiled else {
            panic!("expected alarm");
        };
        assert!(days.contains(1));
        assert!(days.contains(5));
        assert!(!days.contains(2));
        assert_eq!(hour, 7);
    }

    #[test]
    fn should_reject_an_alarm_with_bad_time() {
        let action = Action::Alarm {
            name: "wake".to_string(),
            days: vec!["mon".to_string()],
            hour: 24,
            minute: 0,
            second: 0,
            data: None,
        };
        assert!(matches!(
            compile(action),
            Err(ValidationError::InvalidTimeOfDay { .. })
        ));
    }

    #[test]
    fn should_reject_an_alarm_with_unknown_day_token() {
        let action = Action::Alarm {
            name: "wake".to_string(),
            days: vec!["funday".to_string()],
            hour: 7,
            minute: 0,
            second: 0,
            data: None,
        };
        assert!(matches!(
            compile(action),
            Err(ValidationError::UnknownDayToken(_))
        ));
    }

    #[test]
    fn should_reject_a_zero_interval_ticker() {
        let action = Action::Ticker {
            name: "poll".to_string(),
            interval_secs: 0,
            data: None,
        };
        assert!(matches!(
            compile(action),
            Err(ValidationError::InvalidTrigger(_))
        ));
    }
}
