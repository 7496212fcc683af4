//! Process-wide named-variable store shared across all units.
//!
//! Created once at host start and cleared only at process teardown.
//! Semantics are deliberately simple: last writer wins, no versioning.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Concurrency-safe key/value store shared by every loaded unit.
#[derive(Debug, Clone, Default)]
pub struct SharedVars {
    inner: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl SharedVars {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `name`, replacing any previous value.
    pub fn set(&self, name: impl Into<String>, value: serde_json::Value) {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.into(), value);
    }

    /// Fetch a copy of the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Remove the value stored under `name`; returns whether it existed.
    pub fn delete(&self, name: &str) -> bool {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_none_for_unknown_name() {
        let vars = SharedVars::new();
        assert_eq!(vars.get("missing"), None);
    }

    #[test]
    fn should_store_and_fetch_values() {
        let vars = SharedVars::new();
        vars.set("threshold", serde_json::json!(21.5));
        assert_eq!(vars.get("threshold"), Some(serde_json::json!(21.5)));
    }

    #[test]
    fn should_let_the_last_writer_win() {
        let vars = SharedVars::new();
        vars.set("mode", serde_json::json!("day"));
        vars.set("mode", serde_json::json!("night"));
        assert_eq!(vars.get("mode"), Some(serde_json::json!("night")));
    }

    #[test]
    fn should_report_whether_delete_removed_anything() {
        let vars = SharedVars::new();
        vars.set("gone", serde_json::json!(1));
        assert!(vars.delete("gone"));
        assert!(!vars.delete("gone"));
        assert_eq!(vars.get("gone"), None);
    }

    #[test]
    fn should_share_state_between_clones() {
        let vars = SharedVars::new();
        let other = vars.clone();
        other.set("shared", serde_json::json!(true));
        assert_eq!(vars.get("shared"), Some(serde_json::json!(true)));
    }
}
