//! Telegram adapter error types.

use apiary_domain::error::ApiaryError;

/// Errors specific to the Telegram adapter.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The HTTP request itself failed.
    #[error("telegram request failed")]
    Http(#[source] reqwest::Error),

    /// The bot API answered with a non-success status.
    #[error("telegram API rejected the request with status {status}: {description}")]
    Api {
        status: u16,
        description: String,
    },
}

impl TelegramError {
    /// Convert into an [`ApiaryError::Transport`] for propagation across
    /// port boundaries.
    pub fn into_domain(self) -> ApiaryError {
        ApiaryError::Transport(Box::new(self))
    }
}

impl From<TelegramError> for ApiaryError {
    fn from(err: TelegramError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_api_error_with_status() {
        let err = TelegramError::Api {
            status: 429,
            description: "Too Many Requests".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "telegram API rejected the request with status 429: Too Many Requests"
        );
    }

    #[test]
    fn should_convert_into_transport_error() {
        let err: ApiaryError = TelegramError::Api {
            status: 400,
            description: String::new(),
        }
        .into();
        assert!(matches!(err, ApiaryError::Transport(_)));
    }
}
