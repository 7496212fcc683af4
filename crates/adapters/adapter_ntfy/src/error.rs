//! ntfy adapter error types.

use apiary_domain::error::ApiaryError;

/// Errors specific to the ntfy adapter.
#[derive(Debug, thiserror::Error)]
pub enum NtfyError {
    /// The HTTP request itself failed.
    #[error("ntfy request failed")]
    Http(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("ntfy server rejected the request with status {status}")]
    Api { status: u16 },
}

impl NtfyError {
    /// Convert into an [`ApiaryError::Transport`] for propagation across
    /// port boundaries.
    pub fn into_domain(self) -> ApiaryError {
        ApiaryError::Transport(Box::new(self))
    }
}

impl From<NtfyError> for ApiaryError {
    fn from(err: NtfyError) -> Self {
        err.into_domain()
    }
}
