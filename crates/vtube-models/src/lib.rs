//! Shared data models for the VideoTube backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video documents and their identifiers
//! - Creation and partial-update payloads
//! - List queries (text/owner filter, sorting, offset pagination)

pub mod error;
pub mod query;
pub mod video;

pub use error::{ModelError, ModelResult};
pub use query::{
    PageRequest, SortDirection, SortSpec, VideoFilter, VideoPage, VideoQuery, VideoSortField,
    DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT,
};
pub use video::{NewVideo, Video, VideoId, VideoPatch};
