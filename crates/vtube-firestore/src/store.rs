//! Video repository abstraction.

use async_trait::async_trait;
use vtube_models::{NewVideo, Video, VideoId, VideoPage, VideoPatch, VideoQuery};

use crate::error::FirestoreResult;

/// Persistence for video records.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// One page of videos matching the query, plus the total match count.
    async fn list(&self, query: &VideoQuery) -> FirestoreResult<VideoPage>;

    /// Insert a new record with a fresh ID and timestamps.
    async fn create(&self, video: NewVideo) -> FirestoreResult<Video>;

    async fn get(&self, id: &VideoId) -> FirestoreResult<Option<Video>>;

    /// Apply the supplied fields. Returns `None` when the record is absent.
    async fn update(&self, id: &VideoId, patch: VideoPatch) -> FirestoreResult<Option<Video>>;

    /// Remove a record. Returns `false` when it did not exist.
    async fn delete(&self, id: &VideoId) -> FirestoreResult<bool>;

    /// Flip `is_published`. Returns `None` when the record is absent.
    async fn toggle_publish(&self, id: &VideoId) -> FirestoreResult<Option<Video>>;

    /// Connectivity check used by readiness probes.
    async fn health_check(&self) -> FirestoreResult<()> {
        Ok(())
    }
}
