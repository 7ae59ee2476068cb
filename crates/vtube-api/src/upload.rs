//! Multipart form staging.
//!
//! Text parts are collected as strings, file parts are streamed into temp
//! files that the media gateway later uploads.

use std::collections::HashMap;
use std::path::Path;

use axum::extract::multipart::{Field, Multipart, MultipartError, MultipartRejection};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use vtube_media::staged::extension_suffix;
use vtube_media::StagedFile;

use crate::error::{ApiError, ApiResult};

/// Multipart field carrying the video file.
pub const VIDEO_FILE_FIELD: &str = "videoFile";
/// Multipart field carrying the thumbnail image.
pub const THUMBNAIL_FIELD: &str = "thumbnail";

/// A parsed video form.
#[derive(Debug, Default)]
pub struct VideoForm {
    fields: HashMap<String, String>,
    pub video_file: Option<StagedFile>,
    pub thumbnail: Option<StagedFile>,
}

impl VideoForm {
    /// Read the whole multipart body, staging files under `dir`.
    pub async fn from_multipart(
        multipart: Result<Multipart, MultipartRejection>,
        dir: &Path,
    ) -> ApiResult<Self> {
        let mut multipart = multipart.map_err(|rejection| {
            ApiError::bad_request(format!("Invalid multipart body: {}", rejection.body_text()))
        })?;
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                VIDEO_FILE_FIELD | THUMBNAIL_FIELD => {
                    let slot = if name == VIDEO_FILE_FIELD {
                        &mut form.video_file
                    } else {
                        &mut form.thumbnail
                    };
                    if slot.is_some() {
                        debug!(field = %name, "Ignoring duplicate file part");
                        continue;
                    }
                    *slot = stage_field(field, dir).await?;
                }
                _ => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.fields.entry(name).or_insert(value);
                }
            }
        }

        Ok(form)
    }

    /// A text field, trimmed; blank values count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Stream a file part to a temp file. Empty parts without a file name are
/// treated as absent.
async fn stage_field(mut field: Field<'_>, dir: &Path) -> ApiResult<Option<StagedFile>> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);

    let (file, path) = tempfile::Builder::new()
        .prefix("vtube-upload-")
        .suffix(&extension_suffix(&file_name))
        .tempfile_in(dir)
        .map_err(staging_error)?
        .into_parts();

    let mut file = tokio::fs::File::from_std(file);
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await.map_err(staging_error)?;
        size += chunk.len() as u64;
    }
    file.flush().await.map_err(staging_error)?;

    if file_name.is_empty() && size == 0 {
        return Ok(None);
    }

    debug!(file_name = %file_name, size, "Staged upload");
    Ok(Some(StagedFile::new(path, file_name, content_type, size)))
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
}

fn staging_error(e: std::io::Error) -> ApiError {
    error!("Failed to stage upload: {}", e);
    ApiError::internal("Error while receiving uploaded file.")
}
