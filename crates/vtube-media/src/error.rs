//! Media gateway error types.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while talking to the media host.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to configure media client: {0}")]
    ConfigError(String),

    #[error("No media URL given")]
    MissingUrl,

    #[error("Cannot derive a public ID from URL: {0}")]
    InvalidUrl(String),

    #[error("Media host rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Media host did not acknowledge deletion: {0}")]
    NotAcknowledged(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MediaError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}
