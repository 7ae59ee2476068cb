//! In-process video store for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use vtube_models::{NewVideo, Video, VideoId, VideoPage, VideoPatch, VideoQuery};

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::VideoStore;

/// `VideoStore` backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryVideoStore {
    videos: RwLock<HashMap<VideoId, Video>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored videos.
    pub async fn len(&self) -> usize {
        self.videos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.videos.read().await.is_empty()
    }

    /// Insert a fully formed record, replacing any with the same ID.
    pub async fn insert(&self, video: Video) {
        self.videos.write().await.insert(video.id.clone(), video);
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn list(&self, query: &VideoQuery) -> FirestoreResult<VideoPage> {
        let videos = self.videos.read().await;
        let mut matches: Vec<Video> = videos
            .values()
            .filter(|v| query.filter.matches(v))
            .cloned()
            .collect();
        matches.sort_by(|a, b| query.sort.compare(a, b));

        Ok(VideoPage::from_sorted(matches, &query.page))
    }

    async fn create(&self, video: NewVideo) -> FirestoreResult<Video> {
        video
            .validate()
            .map_err(|e| FirestoreError::invalid_document(e.to_string()))?;

        let video = video.into_video(VideoId::new(), Utc::now());
        self.videos
            .write()
            .await
            .insert(video.id.clone(), video.clone());
        debug!(video_id = %video.id, "Stored video in memory");
        Ok(video)
    }

    async fn get(&self, id: &VideoId) -> FirestoreResult<Option<Video>> {
        Ok(self.videos.read().await.get(id).cloned())
    }

    async fn update(&self, id: &VideoId, patch: VideoPatch) -> FirestoreResult<Option<Video>> {
        let mut videos = self.videos.write().await;
        Ok(videos.get_mut(id).map(|video| {
            patch.apply(video, Utc::now());
            video.clone()
        }))
    }

    async fn delete(&self, id: &VideoId) -> FirestoreResult<bool> {
        Ok(self.videos.write().await.remove(id).is_some())
    }

    async fn toggle_publish(&self, id: &VideoId) -> FirestoreResult<Option<Video>> {
        let mut videos = self.videos.write().await;
        Ok(videos.get_mut(id).map(|video| {
            video.is_published = !video.is_published;
            video.updated_at = Utc::now();
            video.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtube_models::{PageRequest, SortSpec, VideoFilter};

    fn new_video(title: &str, owner: &str) -> NewVideo {
        NewVideo {
            video_file: format!("https://media.example/{title}.mp4"),
            thumbnail: format!("https://media.example/{title}.jpg"),
            title: title.to_string(),
            description: format!("About {title}"),
            duration: 10.0,
            owner: owner.to_string(),
            is_published: true,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_missing_media() {
        let store = MemoryVideoStore::new();
        let mut video = new_video("a", "u1");
        video.thumbnail.clear();

        let err = store.create(video).await.unwrap_err();
        assert!(matches!(err, FirestoreError::InvalidDocument(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let store = MemoryVideoStore::new();
        for i in 0..7 {
            store.create(new_video(&format!("cats {i}"), "u1")).await.unwrap();
        }
        store.create(new_video("dogs", "u1")).await.unwrap();
        store.create(new_video("cats elsewhere", "u2")).await.unwrap();

        let query = VideoQuery {
            filter: VideoFilter::new(Some("CATS".to_string()), Some("u1".to_string())),
            sort: SortSpec::default(),
            page: PageRequest::new(Some(2), Some(5)),
        };
        let page = store.list(&query).await.unwrap();

        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|v| v.owner == "u1"));
    }

    #[tokio::test]
    async fn test_update_missing_is_none() {
        let store = MemoryVideoStore::new();
        let patch = VideoPatch {
            title: Some("x".to_string()),
            ..Default::default()
        };
        assert!(store.update(&VideoId::new(), patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let store = MemoryVideoStore::new();
        let video = store.create(new_video("a", "u1")).await.unwrap();

        let once = store.toggle_publish(&video.id).await.unwrap().unwrap();
        assert!(!once.is_published);
        let twice = store.toggle_publish(&video.id).await.unwrap().unwrap();
        assert!(twice.is_published);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = MemoryVideoStore::new();
        let video = store.create(new_video("a", "u1")).await.unwrap();

        assert!(store.delete(&video.id).await.unwrap());
        assert!(!store.delete(&video.id).await.unwrap());
        assert!(store.get(&video.id).await.unwrap().is_none());
    }
}
