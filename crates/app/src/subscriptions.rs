//! Subscription registry — maps topics to the units interested in them.
//!
//! Membership is idempotent: recording the same (topic, unit) pairing
//! twice leaves a single entry, but the caller-supplied "newly paired"
//! callback runs on *every* add, so callers must make it safe to repeat
//! (e.g. an idempotent bus subscription).

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Topic → set of unit source paths.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<HashMap<String, BTreeSet<PathBuf>>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `unit` is interested in `topic`.
    ///
    /// `on_newly_paired` runs after the mapping is updated and after the
    /// registry lock is released, so it may re-enter the registry freely.
    pub fn add(&self, topic: &str, unit: &Path, on_newly_paired: impl FnOnce()) {
        {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            inner
                .entry(topic.to_string())
                .or_default()
                .insert(unit.to_path_buf());
        }
        on_newly_paired();
    }

    /// Units interested in `topic`, in a stable (lexicographic) order.
    #[must_use]
    pub fn units_by_topic(&self, topic: &str) -> Vec<PathBuf> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|units| units.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every topic with at least one interested unit, in a stable order.
    #[must_use]
    pub fn all_topics(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut topics: Vec<String> = inner
            .iter()
            .filter(|(_, units)| !units.is_empty())
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort_unstable();
        topics
    }
}
