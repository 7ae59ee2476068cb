//! Firestore error types.

use thiserror::Error;

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Errors that can occur during Firestore operations.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP error status from the REST API to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 if body.contains("FAILED_PRECONDITION") => Self::PreconditionFailed(body),
            401 => Self::AuthError(body),
            403 => Self::PermissionDenied(body),
            404 => Self::NotFound(body),
            409 => Self::AlreadyExists(body),
            412 => Self::PreconditionFailed(body),
            429 | 500..=599 => Self::ServerError(status, body),
            _ => Self::RequestFailed(body),
        }
    }

    /// HTTP status this error corresponds to, if it came from a response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::PreconditionFailed(_) => Some(412),
            Self::RequestFailed(_) => Some(400),
            Self::ServerError(status, _) => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True if a write lost an optimistic-concurrency race.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            FirestoreError::from_http_status(404, "missing"),
            FirestoreError::NotFound(_)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(409, "conflict"),
            FirestoreError::AlreadyExists(_)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(503, "unavailable"),
            FirestoreError::ServerError(503, _)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(400, "bad field"),
            FirestoreError::RequestFailed(_)
        ));
    }

    #[test]
    fn test_failed_precondition_body_is_detected() {
        let body = r#"{"error":{"code":400,"status":"FAILED_PRECONDITION"}}"#;
        let err = FirestoreError::from_http_status(400, body);
        assert!(err.is_precondition_failed());
        assert_eq!(err.http_status(), Some(412));
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(FirestoreError::not_found("videos/x").http_status(), Some(404));
        assert_eq!(
            FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
            Some(502)
        );
        assert_eq!(FirestoreError::invalid_document("x").http_status(), None);
    }
}
