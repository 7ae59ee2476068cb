//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Message returned for upstream failures whose details stay in the logs.
const GENERIC_FAILURE: &str = "Something went wrong";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// Carries a fixed, user-safe message.
    #[error("{0}")]
    Internal(String),

    #[error("Media error: {0}")]
    Media(#[from] vtube_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] vtube_firestore::FirestoreError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Media(_) | ApiError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Media(_) | ApiError::Store(_) => GENERIC_FAILURE.to_string(),
            _ => self.to_string(),
        }
    }
}

/// Error envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if matches!(self, ApiError::Media(_) | ApiError::Store(_)) {
            error!(error = %self, "Upstream dependency failed");
        }

        let body = ErrorBody {
            status_code: status.as_u16(),
            message: self.public_message(),
            success: false,
            errors: Vec::new(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtube_firestore::FirestoreError;

    #[test]
    fn test_upstream_details_are_hidden() {
        let err = ApiError::from(FirestoreError::ServerError(503, "backend exploded".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Something went wrong");
    }

    #[test]
    fn test_client_errors_keep_message() {
        let err = ApiError::bad_request("Invalid video ID.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Invalid video ID.");
    }
}
