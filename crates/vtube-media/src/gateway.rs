//! Media gateway abstraction.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MediaResult;
use crate::staged::StagedFile;

/// How the media host should treat a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media object persisted on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    /// Public URL of the object
    pub url: String,
    /// Host-side identifier
    pub public_id: String,
    /// Resource type reported by the host (`image`, `video`, `raw`)
    pub resource_type: String,
    /// Length in seconds, reported for audio/video resources
    pub duration: Option<f64>,
    /// Stored size in bytes
    pub bytes: u64,
}

/// Persists local uploads on a media host and removes them again.
///
/// Implementations make a single attempt per call; callers decide what a
/// failure means for the request.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Upload a staged file. The local file is removed whether or not the
    /// upload succeeds.
    async fn store(&self, file: StagedFile) -> MediaResult<StoredMedia>;

    /// Delete the object behind `remote_url`.
    ///
    /// Fails if the URL is absent or the host does not explicitly
    /// acknowledge the deletion.
    async fn remove(&self, remote_url: Option<&str>, kind: ResourceKind) -> MediaResult<()>;

    /// Connectivity check used by readiness probes.
    async fn health_check(&self) -> MediaResult<()> {
        Ok(())
    }
}
