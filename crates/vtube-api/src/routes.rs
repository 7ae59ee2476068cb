//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, patch};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::ApiError;
use crate::handlers::{
    delete_video, get_video, health, list_videos, publish_video, ready, toggle_publish_status,
    update_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_routes = Router::new()
        .route("/videos", get(list_videos).post(publish_video))
        .route(
            "/videos/:video_id",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/videos/:video_id/publish", patch(toggle_publish_status));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    let max_body_size = state.config.max_body_size;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api/v1", video_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors)
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
