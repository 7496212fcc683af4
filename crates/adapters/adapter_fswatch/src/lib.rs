//! # apiary-adapter-fswatch
//!
//! Filesystem watcher — polls the unit folders and reports changes.
//!
//! Polling keeps the adapter portable and dependency-free; the folders
//! involved hold a handful of small files, so a scan every couple of
//! seconds is cheap. Two kinds of change are reported:
//! - a watched folder's file set changed (a unit file appeared or
//!   vanished) — `is_write: false`,
//! - a known file's modification time moved — `is_write: true`.
//!
//! The first scan primes the baseline silently so already-present units
//! are not reported as new.

pub mod config;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use apiary_app::ports::watch::ChangeEvent;

pub use config::FsWatchConfig;

/// Default extension of watched files.
pub const WATCH_EXTENSION: &str = "toml";

/// Polls a set of folders for unit-file changes.
pub struct PollWatcher {
    config: FsWatchConfig,
    folders: Vec<PathBuf>,
    extension: String,
    events_tx: mpsc::Sender<ChangeEvent>,
    modified: HashMap<PathBuf, SystemTime>,
    known: HashMap<PathBuf, BTreeSet<PathBuf>>,
}

impl PollWatcher {
    #[must_use]
    pub fn new(
        config: FsWatchConfig,
        folders: Vec<PathBuf>,
        events_tx: mpsc::Sender<ChangeEvent>,
    ) -> Self {
        Self {
            config,
            folders,
            extension: WATCH_EXTENSION.to_string(),
            events_tx,
            modified: HashMap::new(),
            known: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Record the current on-disk state without reporting anything.
    pub fn prime(&mut self) {
        for folder in self.folders.clone() {
            let files = self.list(&folder);
            for file in &files {
                if let Some(modified) = mtime(file) {
                    self.modified.insert(file.clone(), modified);
                }
            }
            self.known.insert(folder, files);
        }
    }

    /// Poll until cancelled. Primes the baseline first.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.prime();
        let interval = self.config.poll_interval();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    if !self.scan().await {
                        break;
                    }
                }
            }
        }
        debug!("filesystem watcher stopped");
    }

    /// One polling pass. Returns `false` once the event channel is gone.
    pub async fn scan(&mut self) -> bool {
        let mut events = Vec::new();

        for folder in self.folders.clone() {
            let current = self.list(&folder);
            let previous = self.known.get(&folder).cloned().unwrap_or_default();

            for appeared in current.difference(&previous) {
                events.push(ChangeEvent {
                    path: appeared.clone(),
                    is_write: false,
                });
                if let Some(modified) = mtime(appeared) {
                    self.modified.insert(appeared.clone(), modified);
                }
            }
            for vanished in previous.difference(&current) {
                events.push(ChangeEvent {
                    path: vanished.clone(),
                    is_write: false,
                });
                self.modified.remove(vanished);
            }
            for file in current.intersection(&previous) {
                let Some(modified) = mtime(file) else {
                    continue;
                };
                if self.modified.insert(file.clone(), modified) != Some(modified) {
                    events.push(ChangeEvent {
                        path: file.clone(),
                        is_write: true,
                    });
                }
            }

            self.known.insert(folder, current);
        }

        for event in events {
            if self.events_tx.send(event).await.is_err() {
                debug!("change-event consumer is gone, stopping watcher");
                return false;
            }
        }
        true
    }

    fn list(&self, folder: &Path) -> BTreeSet<PathBuf> {
        let entries = match std::fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(folder = %folder.display(), error = %err, "failed to read watched folder");
                return BTreeSet::new();
            }
        };
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == self.extension.as_str())
            })
            .collect()
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
}
