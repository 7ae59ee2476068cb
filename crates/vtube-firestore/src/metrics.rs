//! Firestore request metrics.

use metrics::{counter, histogram};

/// Metric name constants.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "vtube_firestore_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vtube_firestore_latency_seconds";

    /// Optimistic-concurrency conflicts by operation.
    pub const CONFLICTS_TOTAL: &str = "vtube_firestore_conflicts_total";
}

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a precondition conflict that forced a re-read.
pub fn record_conflict(operation: &str) {
    counter!(
        names::CONFLICTS_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}
