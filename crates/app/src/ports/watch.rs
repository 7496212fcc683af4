//! Change-event port — the consumed file-watch primitive.
//!
//! The watcher itself is an adapter; the core only consumes its stream of
//! change events for watched folders and files.

use std::path::PathBuf;

/// One filesystem change observed under a watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path that changed — a watched file, or a watched folder whose
    /// file set changed.
    pub path: PathBuf,
    /// Whether the change was a content write (as opposed to an
    /// appearance/disappearance observed at folder level).
    pub is_write: bool,
}
