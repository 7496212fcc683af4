//! Unit manifest — what an automation unit declares about itself.
//!
//! The manifest is produced by the unit's own initialisation routine when
//! the engine loads it. The host trusts it for routing (subscribed topics)
//! and for deciding which scheduled-trigger callbacks are resolvable.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Declared identity and interests of one automation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitManifest {
    /// Human-readable unit name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Topics the unit wants inbound messages for, in declaration order.
    #[serde(default)]
    pub subscribe: Vec<String>,
    /// Which event callbacks the unit defines.
    #[serde(default)]
    pub handles: CallbackSet,
}

impl UnitManifest {
    /// Enforce manifest invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when the declared name is
    /// empty or whitespace.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

/// The fixed capability surface a unit may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Message,
    Timer,
    Ticker,
    Alarm,
}

impl std::fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message => f.write_str("on_message"),
            Self::Timer => f.write_str("on_timer"),
            Self::Ticker => f.write_str("on_ticker"),
            Self::Alarm => f.write_str("on_alarm"),
        }
    }
}

/// Which callbacks a unit defines; captured once at load time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSet {
    #[serde(default)]
    pub on_message: bool,
    #[serde(default)]
    pub on_timer: bool,
    #[serde(default)]
    pub on_ticker: bool,
    #[serde(default)]
    pub on_alarm: bool,
}

impl CallbackSet {
    /// A set claiming every callback; used before the manifest is known so
    /// that triggers created during unit initialisation are not rejected.
    #[must_use]
    pub fn all() -> Self {
        Self {
            on_message: true,
            on_timer: true,
            on_ticker: true,
            on_alarm: true,
        }
    }

    /// Whether the given callback is resolvable on this unit.
    #[must_use]
    pub fn supports(self, kind: CallbackKind) -> bool {
        match kind {
            CallbackKind::Message => self.on_message,
            CallbackKind::Timer => self.on_timer,
            CallbackKind::Ticker => self.on_ticker,
            CallbackKind::Alarm => self.on_alarm,
        }
    }
}
