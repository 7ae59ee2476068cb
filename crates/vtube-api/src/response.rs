//! Success envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// `{statusCode, data, message, success}` response.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CREATED, data, message)
    }

    pub fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status,
            data,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a, T> {
    status_code: u16,
    data: &'a T,
    message: &'a str,
    success: bool,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            status_code: self.status.as_u16(),
            data: &self.data,
            message: &self.message,
            success: self.status.as_u16() < 400,
        };
        (self.status, Json(body)).into_response()
    }
}
