//! Firestore-backed video repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use vtube_models::{NewVideo, SortDirection, Video, VideoId, VideoPage, VideoPatch, VideoQuery};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_conflict;
use crate::store::VideoStore;
use crate::types::{Direction, Document, Precondition, StructuredQuery, ToFirestoreValue, Value};

/// Collection holding video documents.
pub const VIDEOS_COLLECTION: &str = "videos";

/// Attempts for read-modify-write operations that lose a concurrency race.
const MAX_TOGGLE_ATTEMPTS: usize = 5;

mod fields {
    pub const VIDEO_FILE: &str = "video_file";
    pub const THUMBNAIL: &str = "thumbnail";
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const DURATION: &str = "duration";
    pub const OWNER: &str = "owner";
    pub const IS_PUBLISHED: &str = "is_published";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

/// `VideoStore` over the Firestore REST API.
#[derive(Clone)]
pub struct FirestoreVideoStore {
    client: FirestoreClient,
}

impl FirestoreVideoStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn base_query(owner: Option<&str>) -> StructuredQuery {
        let query = StructuredQuery::collection(VIDEOS_COLLECTION);
        match owner {
            Some(owner) => query.where_eq(fields::OWNER, owner.to_firestore_value()),
            None => query,
        }
    }

    async fn list_indexed(&self, query: &VideoQuery) -> FirestoreResult<VideoPage> {
        let direction = match query.sort.direction {
            SortDirection::Ascending => Direction::Ascending,
            SortDirection::Descending => Direction::Descending,
        };
        let base = Self::base_query(query.filter.owner.as_deref());

        let page_query = base
            .clone()
            .order_by(query.sort.field.document_field(), direction)
            .order_by("__name__", direction)
            .offset(query.page.skip())
            .limit(query.page.limit());

        let (docs, total) = tokio::try_join!(
            self.client.run_query(page_query),
            self.client.run_count_query(base),
        )?;

        let items = docs
            .iter()
            .map(document_to_video)
            .collect::<FirestoreResult<Vec<_>>>()?;
        Ok(VideoPage { items, total })
    }

    /// Text search has no Firestore operator, so matching runs in process.
    async fn list_scanned(&self, query: &VideoQuery) -> FirestoreResult<VideoPage> {
        let docs = self
            .client
            .run_query(Self::base_query(query.filter.owner.as_deref()))
            .await?;
        debug!(scanned = docs.len(), "Scanning videos for text match");

        let mut matches = Vec::new();
        for doc in &docs {
            let video = document_to_video(doc)?;
            if query.filter.matches(&video) {
                matches.push(video);
            }
        }
        matches.sort_by(|a, b| query.sort.compare(a, b));

        Ok(VideoPage::from_sorted(matches, &query.page))
    }
}

#[async_trait]
impl VideoStore for FirestoreVideoStore {
    async fn list(&self, query: &VideoQuery) -> FirestoreResult<VideoPage> {
        if query.filter.text.is_some() {
            self.list_scanned(query).await
        } else {
            self.list_indexed(query).await
        }
    }

    async fn create(&self, video: NewVideo) -> FirestoreResult<Video> {
        video
            .validate()
            .map_err(|e| FirestoreError::invalid_document(e.to_string()))?;

        let video = video.into_video(VideoId::new(), Utc::now());
        let doc = self
            .client
            .create_document(VIDEOS_COLLECTION, video.id.as_str(), video_to_fields(&video))
            .await?;

        info!(video_id = %video.id, owner = %video.owner, "Created video document");
        match doc.fields {
            Some(_) => document_to_video(&doc),
            None => Ok(video),
        }
    }

    async fn get(&self, id: &VideoId) -> FirestoreResult<Option<Video>> {
        self.client
            .get_document(VIDEOS_COLLECTION, id.as_str())
            .await?
            .map(|doc| document_to_video(&doc))
            .transpose()
    }

    async fn update(&self, id: &VideoId, patch: VideoPatch) -> FirestoreResult<Option<Video>> {
        let (fields, mask) = patch_to_fields(&patch, Utc::now());

        self.client
            .update_document(
                VIDEOS_COLLECTION,
                id.as_str(),
                fields,
                &mask,
                Some(&Precondition::exists()),
            )
            .await?
            .map(|doc| document_to_video(&doc))
            .transpose()
    }

    async fn delete(&self, id: &VideoId) -> FirestoreResult<bool> {
        let deleted = self
            .client
            .delete_document(VIDEOS_COLLECTION, id.as_str())
            .await?;
        if deleted {
            info!(video_id = %id, "Deleted video document");
        }
        Ok(deleted)
    }

    async fn toggle_publish(&self, id: &VideoId) -> FirestoreResult<Option<Video>> {
        for attempt in 1..=MAX_TOGGLE_ATTEMPTS {
            let Some(doc) = self
                .client
                .get_document(VIDEOS_COLLECTION, id.as_str())
                .await?
            else {
                return Ok(None);
            };

            let current = document_to_video(&doc)?;
            let precondition = match &doc.update_time {
                Some(ts) => Precondition::updated_at(ts.clone()),
                None => Precondition::exists(),
            };

            let mut update = HashMap::new();
            update.insert(
                fields::IS_PUBLISHED.to_string(),
                (!current.is_published).to_firestore_value(),
            );
            update.insert(fields::UPDATED_AT.to_string(), Utc::now().to_firestore_value());

            match self
                .client
                .update_document(
                    VIDEOS_COLLECTION,
                    id.as_str(),
                    update,
                    &[fields::IS_PUBLISHED, fields::UPDATED_AT],
                    Some(&precondition),
                )
                .await
            {
                Ok(doc) => return doc.map(|d| document_to_video(&d)).transpose(),
                Err(e) if e.is_precondition_failed() => {
                    record_conflict("toggle_publish");
                    warn!(video_id = %id, attempt, "Publish toggle lost a concurrent write, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(FirestoreError::PreconditionFailed(format!(
            "{}/{} changed concurrently {} times",
            VIDEOS_COLLECTION, id, MAX_TOGGLE_ATTEMPTS
        )))
    }

    async fn health_check(&self) -> FirestoreResult<()> {
        self.client
            .run_query(StructuredQuery::collection(VIDEOS_COLLECTION).limit(1))
            .await
            .map(|_| ())
    }
}

// =============================================================================
// Conversion
// =============================================================================

fn video_to_fields(video: &Video) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert(fields::VIDEO_FILE.to_string(), video.video_file.to_firestore_value());
    map.insert(fields::THUMBNAIL.to_string(), video.thumbnail.to_firestore_value());
    map.insert(fields::TITLE.to_string(), video.title.to_firestore_value());
    map.insert(fields::DESCRIPTION.to_string(), video.description.to_firestore_value());
    map.insert(fields::DURATION.to_string(), video.duration.to_firestore_value());
    map.insert(fields::OWNER.to_string(), video.owner.to_firestore_value());
    map.insert(fields::IS_PUBLISHED.to_string(), video.is_published.to_firestore_value());
    map.insert(fields::CREATED_AT.to_string(), video.created_at.to_firestore_value());
    map.insert(fields::UPDATED_AT.to_string(), video.updated_at.to_firestore_value());
    map
}

/// Fields and update mask for a partial update.
fn patch_to_fields(
    patch: &VideoPatch,
    now: DateTime<Utc>,
) -> (HashMap<String, Value>, Vec<&'static str>) {
    let mut map = HashMap::new();
    let mut mask = Vec::new();

    for (field, value) in [
        (fields::TITLE, &patch.title),
        (fields::DESCRIPTION, &patch.description),
        (fields::THUMBNAIL, &patch.thumbnail),
    ] {
        if let Some(value) = value {
            map.insert(field.to_string(), value.to_firestore_value());
            mask.push(field);
        }
    }

    map.insert(fields::UPDATED_AT.to_string(), now.to_firestore_value());
    mask.push(fields::UPDATED_AT);
    (map, mask)
}

fn document_to_video(doc: &Document) -> FirestoreResult<Video> {
    let id = doc
        .id()
        .ok_or_else(|| FirestoreError::invalid_response("video document has no name"))?;

    let required = |field: &str| -> FirestoreResult<String> {
        doc.get::<String>(field).ok_or_else(|| {
            FirestoreError::invalid_response(format!("video {} is missing {}", id, field))
        })
    };
    let timestamp = |field: &str| -> FirestoreResult<DateTime<Utc>> {
        doc.get::<DateTime<Utc>>(field).ok_or_else(|| {
            FirestoreError::invalid_response(format!("video {} has no valid {}", id, field))
        })
    };

    let created_at = timestamp(fields::CREATED_AT)?;
    Ok(Video {
        id: VideoId::from_string(id),
        video_file: required(fields::VIDEO_FILE)?,
        thumbnail: required(fields::THUMBNAIL)?,
        title: doc.get(fields::TITLE).unwrap_or_default(),
        description: doc.get(fields::DESCRIPTION).unwrap_or_default(),
        duration: doc.get(fields::DURATION).unwrap_or(0.0),
        owner: required(fields::OWNER)?,
        is_published: doc.get(fields::IS_PUBLISHED).unwrap_or(false),
        created_at,
        updated_at: doc.get(fields::UPDATED_AT).unwrap_or(created_at),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FirestoreConfig;
    use serde_json::json;
    use std::time::Duration;
    use vtube_models::{PageRequest, SortSpec, VideoFilter, VideoSortField};
    use wiremock::matchers::{body_partial_json, method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOC_PREFIX: &str = "projects/test-project/databases/(default)/documents/videos";

    async fn store(server: &MockServer) -> FirestoreVideoStore {
        let client = FirestoreClient::new(FirestoreConfig {
            project_id: "test-project".to_string(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            emulator_host: Some(server.address().to_string()),
        })
        .await
        .unwrap();
        FirestoreVideoStore::new(client)
    }

    fn video_doc(id: &str, title: &str, published: bool) -> serde_json::Value {
        json!({
            "name": format!("{DOC_PREFIX}/{id}"),
            "fields": {
                "video_file": { "stringValue": format!("https://media.example/{id}.mp4") },
                "thumbnail": { "stringValue": format!("https://media.example/{id}.jpg") },
                "title": { "stringValue": title },
                "description": { "stringValue": "desc" },
                "duration": { "doubleValue": 12.5 },
                "owner": { "stringValue": "u1" },
                "is_published": { "booleanValue": published },
                "created_at": { "timestampValue": "2024-01-01T00:00:00Z" },
                "updated_at": { "timestampValue": "2024-01-02T00:00:00Z" }
            },
            "updateTime": "2024-01-02T00:00:00.000001Z"
        })
    }

    #[test]
    fn test_document_conversion_round_trip() {
        let doc: Document = serde_json::from_value(video_doc("abc", "Hello", true)).unwrap();
        let video = document_to_video(&doc).unwrap();

        assert_eq!(video.id.as_str(), "abc");
        assert_eq!(video.title, "Hello");
        assert_eq!(video.duration, 12.5);
        assert!(video.is_published);

        let fields = video_to_fields(&video);
        assert_eq!(fields.len(), 9);
        assert_eq!(fields["owner"], Value::StringValue("u1".to_string()));
    }

    #[test]
    fn test_document_missing_media_is_invalid() {
        let mut raw = video_doc("abc", "Hello", true);
        raw["fields"].as_object_mut().unwrap().remove("video_file");
        let doc: Document = serde_json::from_value(raw).unwrap();

        assert!(matches!(
            document_to_video(&doc),
            Err(FirestoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_patch_mask_covers_only_supplied_fields() {
        let patch = VideoPatch {
            title: Some("t".to_string()),
            description: None,
            thumbnail: Some("https://media.example/new.jpg".to_string()),
        };
        let (fields, mask) = patch_to_fields(&patch, Utc::now());

        assert_eq!(mask, vec!["title", "thumbnail", "updated_at"]);
        assert!(!fields.contains_key("description"));
    }

    #[tokio::test]
    async fn test_list_without_text_uses_offset_and_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":runQuery$"))
            .and(body_partial_json(json!({
                "structuredQuery": {
                    "offset": 5,
                    "limit": 5,
                    "orderBy": [
                        { "field": { "fieldPath": "title" }, "direction": "ASCENDING" },
                        { "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" }
                    ]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "document": video_doc("a", "A", true) },
                { "document": video_doc("b", "B", true) }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r":runAggregationQuery$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "result": { "aggregateFields": { "total": { "integerValue": "12" } } } }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server).await;
        let query = VideoQuery {
            filter: VideoFilter::default(),
            sort: SortSpec::new(VideoSortField::Title, SortDirection::Ascending),
            page: PageRequest::new(Some(2), Some(5)),
        };
        let page = store.list(&query).await.unwrap();

        assert_eq!(page.total, 12);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_list_with_text_filters_in_process() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":runQuery$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "document": video_doc("a", "Rust tips", true) },
                { "document": video_doc("b", "Cooking", true) },
                { "document": video_doc("c", "more RUST", true) }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r":runAggregationQuery$"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let store = store(&server).await;
        let query = VideoQuery {
            filter: VideoFilter::new(Some("rust".to_string()), None),
            sort: SortSpec::new(VideoSortField::Title, SortDirection::Ascending),
            page: PageRequest::new(Some(1), Some(1)),
        };
        let page = store.list(&query).await.unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Rust tips");
    }

    #[tokio::test]
    async fn test_toggle_retries_after_precondition_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/documents/videos/abc$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(video_doc("abc", "A", true)))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path_regex(r"/documents/videos/abc$"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "status": "FAILED_PRECONDITION" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path_regex(r"/documents/videos/abc$"))
            .and(query_param("updateMask.fieldPaths", "is_published"))
            .respond_with(ResponseTemplate::new(200).set_body_json(video_doc("abc", "A", false)))
            .mount(&server)
            .await;

        let store = store(&server).await;
        let video = store
            .toggle_publish(&VideoId::from_string("abc"))
            .await
            .unwrap()
            .unwrap();
        assert!(!video.is_published);
    }

    #[tokio::test]
    async fn test_toggle_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = store(&server).await;
        assert!(store
            .toggle_publish(&VideoId::from_string("gone"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_missing_document_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(query_param("currentDocument.exists", "true"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server).await;
        let patch = VideoPatch {
            description: Some("d".to_string()),
            ..Default::default()
        };
        assert!(store
            .update(&VideoId::from_string("gone"), patch)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_media_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = store(&server).await;
        let err = store
            .create(NewVideo {
                video_file: String::new(),
                thumbnail: "https://media.example/t.jpg".to_string(),
                title: "t".to_string(),
                description: "d".to_string(),
                duration: 0.0,
                owner: "u1".to_string(),
                is_published: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FirestoreError::InvalidDocument(_)));
    }
}
