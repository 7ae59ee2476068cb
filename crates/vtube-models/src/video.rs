//! Video document models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Unique identifier for a video document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a client-supplied identifier.
    ///
    /// Accepts any UUID notation and normalizes it to the lowercase
    /// hyphenated form used as the document ID. Returns `None` for
    /// malformed input.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s)
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    /// Wrap an identifier read back from the store.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A published video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: VideoId,
    /// Public URL of the hosted video file
    pub video_file: String,
    /// Public URL of the hosted thumbnail image
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    /// Length in seconds, as reported by the media host at upload time
    pub duration: f64,
    /// User ID of the uploader
    pub owner: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a video that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVideo {
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub owner: String,
    pub is_published: bool,
}

impl NewVideo {
    /// Check the fields every stored video must carry.
    pub fn validate(&self) -> ModelResult<()> {
        if self.video_file.trim().is_empty() {
            return Err(ModelError::MissingField("videoFile"));
        }
        if self.thumbnail.trim().is_empty() {
            return Err(ModelError::MissingField("thumbnail"));
        }
        if self.owner.trim().is_empty() {
            return Err(ModelError::MissingField("owner"));
        }
        Ok(())
    }

    /// Materialize the record with its assigned ID and creation time.
    pub fn into_video(self, id: VideoId, now: DateTime<Utc>) -> Video {
        Video {
            id,
            video_file: self.video_file,
            thumbnail: self.thumbnail,
            title: self.title,
            description: self.description,
            duration: self.duration,
            owner: self.owner,
            is_published: self.is_published,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a video. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl VideoPatch {
    /// Apply the supplied fields and bump `updated_at`.
    pub fn apply(&self, video: &mut Video, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            video.title = title.clone();
        }
        if let Some(description) = &self.description {
            video.description = description.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            video.thumbnail = thumbnail.clone();
        }
        video.updated_at = now;
    }
}
