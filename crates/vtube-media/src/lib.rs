//! Media hosting gateway.
//!
//! This crate provides:
//! - The `MediaGateway` trait used by the API to persist and remove media
//! - A Cloudinary implementation (signed REST upload/destroy)
//! - `StagedFile`, a local temp file handed over to the gateway for upload
//! - Public-ID derivation from hosted media URLs

pub mod cloudinary;
pub mod error;
pub mod gateway;
pub mod staged;

pub use cloudinary::{public_id_from_url, CloudinaryConfig, CloudinaryGateway};
pub use error::{MediaError, MediaResult};
pub use gateway::{MediaGateway, ResourceKind, StoredMedia};
pub use staged::StagedFile;
