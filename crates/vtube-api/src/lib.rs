//! Axum HTTP API server for video management.
//!
//! This crate provides:
//! - Video CRUD and publish-toggle endpoints under `/api/v1`
//! - Access-token authentication
//! - Multipart upload staging
//! - Uniform success and error envelopes
//! - Health, readiness and Prometheus metrics endpoints

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
pub mod upload;

pub use auth::{AccessClaims, AuthUser};
pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::create_router;
pub use state::AppState;
