//! Video handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use vtube_media::{MediaGateway, ResourceKind, StoredMedia};
use vtube_models::{
    NewVideo, PageRequest, SortSpec, Video, VideoFilter, VideoId, VideoPatch, VideoQuery,
    MAX_LIMIT,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::upload::VideoForm;

// ============================================================================
// Request / response types
// ============================================================================

/// Query parameters for listing videos. Kept as strings so malformed numbers
/// are reported through the error envelope.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

impl ListVideosParams {
    fn into_query(self) -> ApiResult<VideoQuery> {
        let page = parse_number("page", self.page.as_deref(), u32::MAX)?;
        let limit = parse_number("limit", self.limit.as_deref(), MAX_LIMIT)?;

        Ok(VideoQuery {
            filter: VideoFilter::new(self.query, self.user_id),
            sort: SortSpec::from_params(self.sort_by.as_deref(), self.sort_type.as_deref()),
            page: PageRequest::new(page, limit),
        })
    }
}

/// Parse an optional paging parameter in `1..=max`.
fn parse_number(name: &str, value: Option<&str>, max: u32) -> ApiResult<Option<u32>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<u32>() {
        Ok(0) => Err(ApiError::bad_request(format!(
            "{} must be a positive integer.",
            name
        ))),
        Ok(n) if n > max => Err(ApiError::bad_request(format!(
            "{} must not exceed {}.",
            name, max
        ))),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(ApiError::bad_request(format!(
            "{} must be a positive integer.",
            name
        ))),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    pub videos: Vec<Video>,
    pub total_pages: u64,
    pub total_videos: u64,
}

fn parse_video_id(raw: &str) -> ApiResult<VideoId> {
    VideoId::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid video ID."))
}

fn video_not_found() -> ApiError {
    ApiError::not_found("Video not found.")
}

/// Best-effort removal of an object uploaded by a request that then failed.
async fn discard_upload(media: &dyn MediaGateway, uploaded: &StoredMedia, kind: ResourceKind) {
    if let Err(e) = media.remove(Some(&uploaded.url), kind).await {
        warn!(url = %uploaded.url, kind = %kind, "Failed to remove orphaned upload: {}", e);
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List videos with filtering, sorting and pagination.
///
/// GET /api/v1/videos
pub async fn list_videos(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<ListVideosParams>,
) -> ApiResult<ApiResponse<VideoListResponse>> {
    let query = params.into_query()?;
    let page = state.store.list(&query).await?;

    let response = VideoListResponse {
        total_pages: query.page.total_pages(page.total),
        total_videos: page.total,
        videos: page.items,
    };
    Ok(ApiResponse::ok(response, "Videos retrieved successfully"))
}

/// Upload a video with its thumbnail and create the record.
///
/// POST /api/v1/videos
pub async fn publish_video(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<Video>> {
    let form = VideoForm::from_multipart(multipart, &state.config.upload_temp_dir).await?;

    let (Some(title), Some(description)) = (form.text("title"), form.text("description")) else {
        return Err(ApiError::bad_request(
            "Both title and description are required.",
        ));
    };
    let VideoForm {
        video_file,
        thumbnail,
        ..
    } = form;
    let video_file = video_file.ok_or_else(|| ApiError::bad_request("Video file is required."))?;
    let thumbnail =
        thumbnail.ok_or_else(|| ApiError::bad_request("Thumbnail file is required."))?;

    let media = state.media.as_ref();
    let (video_upload, thumbnail_upload) =
        tokio::join!(media.store(video_file), media.store(thumbnail));

    let (video_media, thumbnail_media) = match (video_upload, thumbnail_upload) {
        (Ok(video), Ok(thumb)) => (video, thumb),
        (Err(e), thumb) => {
            error!(owner = %user.id, "Video file upload failed: {}", e);
            if let Ok(thumb) = thumb {
                discard_upload(media, &thumb, ResourceKind::Image).await;
            }
            return Err(ApiError::internal("Error while uploading video file."));
        }
        (Ok(video), Err(e)) => {
            error!(owner = %user.id, "Thumbnail upload failed: {}", e);
            discard_upload(media, &video, ResourceKind::Video).await;
            return Err(ApiError::internal("Error while uploading thumbnail file."));
        }
    };

    let new_video = NewVideo {
        video_file: video_media.url.clone(),
        thumbnail: thumbnail_media.url.clone(),
        title,
        description,
        duration: video_media.duration.unwrap_or(0.0),
        owner: user.id.clone(),
        is_published: state.config.publish_by_default,
    };

    let video = match state.store.create(new_video).await {
        Ok(video) => video,
        Err(e) => {
            error!(owner = %user.id, "Failed to create video record: {}", e);
            tokio::join!(
                discard_upload(media, &video_media, ResourceKind::Video),
                discard_upload(media, &thumbnail_media, ResourceKind::Image),
            );
            return Err(ApiError::internal(
                "Something went wrong while publishing the video.",
            ));
        }
    };

    info!(video_id = %video.id, owner = %video.owner, "Video published");
    Ok(ApiResponse::created(video, "Video published successfully"))
}

/// Get a single video.
///
/// GET /api/v1/videos/:videoId
pub async fn get_video(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<ApiResponse<Video>> {
    let id = parse_video_id(&video_id)?;
    let video = state.store.get(&id).await?.ok_or_else(video_not_found)?;

    Ok(ApiResponse::ok(video, "Video retrieved successfully"))
}

/// Update title/description and replace the thumbnail.
///
/// PATCH /api/v1/videos/:videoId
pub async fn update_video(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(video_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<Video>> {
    let id = parse_video_id(&video_id)?;
    let form = VideoForm::from_multipart(multipart, &state.config.upload_temp_dir).await?;

    let title = form.text("title");
    let description = form.text("description");
    if title.is_none() && description.is_none() {
        return Err(ApiError::bad_request(
            "At least one of title or description is required.",
        ));
    }
    let thumbnail = form
        .thumbnail
        .ok_or_else(|| ApiError::bad_request("Thumbnail file is required."))?;

    let media = state.media.as_ref();
    let uploaded = media.store(thumbnail).await.map_err(|e| {
        error!(video_id = %id, "Thumbnail upload failed: {}", e);
        ApiError::internal("Error while uploading thumbnail file.")
    })?;

    let patch = VideoPatch {
        title,
        description,
        thumbnail: Some(uploaded.url.clone()),
    };

    let updated = match state.store.update(&id, patch).await {
        Ok(updated) => updated,
        Err(e) => {
            discard_upload(media, &uploaded, ResourceKind::Image).await;
            return Err(e.into());
        }
    };

    match updated {
        Some(video) => {
            info!(video_id = %video.id, "Video updated");
            Ok(ApiResponse::ok(video, "Video updated successfully"))
        }
        None => {
            discard_upload(media, &uploaded, ResourceKind::Image).await;
            Err(video_not_found())
        }
    }
}

/// Delete the hosted media, then the record.
///
/// DELETE /api/v1/videos/:videoId
pub async fn delete_video(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    let id = parse_video_id(&video_id)?;
    let video = state.store.get(&id).await?.ok_or_else(video_not_found)?;

    let video_removed = state
        .media
        .remove(Some(&video.video_file), ResourceKind::Video)
        .await;
    let thumbnail_removed = state
        .media
        .remove(Some(&video.thumbnail), ResourceKind::Image)
        .await;

    for (kind, result) in [
        (ResourceKind::Video, &video_removed),
        (ResourceKind::Image, &thumbnail_removed),
    ] {
        if let Err(e) = result {
            error!(video_id = %id, kind = %kind, "Failed to delete media file: {}", e);
        }
    }
    if video_removed.is_err() || thumbnail_removed.is_err() {
        return Err(ApiError::internal("Error deleting files from media storage."));
    }

    match state.store.delete(&id).await {
        Ok(true) => {}
        Ok(false) => return Err(video_not_found()),
        Err(e) => {
            error!(
                video_id = %id,
                "Media removed but the video record could not be deleted: {}", e
            );
            return Err(e.into());
        }
    }

    info!(video_id = %id, "Video deleted");
    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Video deleted successfully",
    ))
}

/// Flip the publish status.
///
/// PATCH /api/v1/videos/:videoId/publish
pub async fn toggle_publish_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<ApiResponse<Video>> {
    let id = parse_video_id(&video_id)?;
    state.store.get(&id).await?.ok_or_else(video_not_found)?;

    let video = state
        .store
        .toggle_publish(&id)
        .await?
        .ok_or_else(video_not_found)?;

    info!(video_id = %video.id, is_published = video.is_published, "Publish status toggled");
    Ok(ApiResponse::ok(video, "Publish status toggled successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtube_models::{SortDirection, VideoSortField};

    #[test]
    fn test_list_params_defaults() {
        let query = ListVideosParams::default().into_query().unwrap();
        assert_eq!(query.page, PageRequest::default());
        assert_eq!(query.sort, SortSpec::default());
        assert_eq!(query.filter, VideoFilter::default());
    }

    #[test]
    fn test_list_params_parsing() {
        let params = ListVideosParams {
            page: Some("2".to_string()),
            limit: Some("100".to_string()),
            query: Some("  cats ".to_string()),
            sort_by: Some("duration".to_string()),
            sort_type: Some("asc".to_string()),
            user_id: Some(String::new()),
        };
        let query = params.into_query().unwrap();

        assert_eq!(query.page.page(), 2);
        assert_eq!(query.page.limit(), 100);
        assert_eq!(query.filter.text.as_deref(), Some("cats"));
        assert_eq!(query.filter.owner, None);
        assert_eq!(
            query.sort,
            SortSpec::new(VideoSortField::Duration, SortDirection::Ascending)
        );
    }

    #[test]
    fn test_list_params_reject_non_numeric_paging() {
        let params = ListVideosParams {
            page: Some("two".to_string()),
            ..Default::default()
        };
        let err = params.into_query().unwrap_err();
        assert_eq!(err.public_message(), "page must be a positive integer.");

        let params = ListVideosParams {
            limit: Some("-5".to_string()),
            ..Default::default()
        };
        assert!(params.into_query().is_err());
    }

    #[test]
    fn test_list_params_reject_out_of_range_paging() {
        let params = ListVideosParams {
            limit: Some("0".to_string()),
            ..Default::default()
        };
        let err = params.into_query().unwrap_err();
        assert_eq!(err.public_message(), "limit must be a positive integer.");

        let params = ListVideosParams {
            page: Some("0".to_string()),
            ..Default::default()
        };
        let err = params.into_query().unwrap_err();
        assert_eq!(err.public_message(), "page must be a positive integer.");

        let params = ListVideosParams {
            limit: Some("200".to_string()),
            ..Default::default()
        };
        let err = params.into_query().unwrap_err();
        assert_eq!(err.public_message(), "limit must not exceed 100.");
    }
}
