//! Hot-reload reconciler — keeps loaded units in sync with the unit
//! folders on disk.
//!
//! The watcher adapter reports *what* changed; this module decides what
//! that means for the host: new file → load, rewritten file → reload,
//! vanished file → unload. A failed load or reload never takes down a
//! running unit, it is logged and the folder stays as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::host::UnitHost;
use crate::ports::engine::UnitEngine;
use crate::ports::watch::ChangeEvent;

/// Default extension of unit source files.
pub const UNIT_EXTENSION: &str = "toml";

/// List the unit source files directly under `dir`, in a stable order.
///
/// # Errors
///
/// Returns the underlying IO error when `dir` cannot be read.
pub fn unit_files_in(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort_unstable();
    Ok(files)
}

/// Applies filesystem changes to the unit host.
pub struct Reconciler<E> {
    host: Arc<UnitHost<E>>,
    folders: Vec<PathBuf>,
    extension: String,
}

impl<E: UnitEngine> Reconciler<E> {
    pub fn new(host: Arc<UnitHost<E>>, folders: Vec<PathBuf>) -> Self {
        Self {
            host,
            folders,
            extension: UNIT_EXTENSION.to_string(),
        }
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Load every unit file currently present in the watched folders.
    ///
    /// Per-file failures are logged and skipped so one broken unit cannot
    /// keep the rest from starting.
    pub async fn sync_all(&self) {
        for dir in &self.folders {
            let files = match unit_files_in(dir, &self.extension) {
                Ok(files) => files,
                Err(err) => {
                    error!(folder = %dir.display(), error = %err, "failed to list unit folder");
                    continue;
                }
            };
            info!(folder = %dir.display(), count = files.len(), "loading unit folder");
            for path in files {
                if let Err(err) = self.host.load(&path).await {
                    error!(unit = %path.display(), error = %err, "failed to load unit");
                }
            }
        }
    }

    /// Apply one observed change.
    pub async fn apply(&self, event: &ChangeEvent) {
        if !event
            .path
            .extension()
            .is_some_and(|ext| ext == self.extension.as_str())
        {
            debug!(path = %event.path.display(), "not a unit file, ignoring change");
            return;
        }

        if event.is_write {
            let result = if self.host.is_loaded(&event.path) {
                self.host.reload(&event.path).await
            } else {
                self.host.load(&event.path).await
            };
            if let Err(err) = result {
                warn!(unit = %event.path.display(), error = %err, "change rejected, keeping previous state");
            }
        } else if event.path.is_file() {
            if let Err(err) = self.host.load(&event.path).await {
                warn!(unit = %event.path.display(), error = %err, "new unit rejected");
            }
        } else if !self.host.unload(&event.path) {
            debug!(unit = %event.path.display(), "vanished file was not loaded, nothing to do");
        }
    }

    /// Drain the watcher's event stream until cancelled.
    pub async fn run(&self, mut events: mpsc::Receiver<ChangeEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Some(event) => event,
                    None => break,
                },
            };
            self.apply(&event).await;
        }
        debug!("reconciler stopped");
    }
}
