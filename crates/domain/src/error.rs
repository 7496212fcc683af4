//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ApiaryError`] via `#[from]` at the port boundary.

use std::path::PathBuf;

/// Base error enum crossing port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum ApiaryError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A unit source could not be read, parsed, or initialised.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A unit callback raised an error while running.
    #[error("unit callback failed")]
    Script(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An outbound transport (bus, chat, notification) failed.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Filesystem access failed.
    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// A unit failed to load; carries the offending source path.
#[derive(Debug, thiserror::Error)]
#[error("failed to load unit from {}", path.display())]
pub struct LoadError {
    /// Absolute path of the unit source file.
    pub path: PathBuf,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl LoadError {
    /// Wrap any error with the path of the unit that failed to load.
    pub fn new(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A unit declared an empty name in its manifest.
    #[error("unit name must not be empty")]
    EmptyName,

    /// A day-of-week mask was zero or had bits above Sunday set.
    #[error("day-of-week mask out of range: {0:#010b}")]
    InvalidDayMask(u8),

    /// A day token could not be parsed.
    #[error("unknown day-of-week token `{0}`")]
    UnknownDayToken(String),

    /// An alarm target time was not a valid time of day.
    #[error("invalid time of day: {hour:02}:{minute:02}:{second:02}")]
    InvalidTimeOfDay { hour: u8, minute: u8, second: u8 },

    /// A scheduled trigger was given an empty name or a zero duration.
    #[error("invalid trigger arguments: {0}")]
    InvalidTrigger(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_load_error_with_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = LoadError::new("/units/a.toml", io);
        assert_eq!(err.to_string(), "failed to load unit from /units/a.toml");
    }

    #[test]
    fn should_convert_validation_error_into_apiary_error() {
        let err: ApiaryError = ValidationError::EmptyName.into();
        assert!(matches!(err, ApiaryError::Validation(_)));
    }

    #[test]
    fn should_keep_source_chain_on_load_error() {
        use std::error::Error;
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ApiaryError = LoadError::new("/units/a.toml", io).into();
        assert!(err.source().is_some());
    }
}
