//! Firestore REST API client and video repository.
//!
//! This crate provides:
//! - A Firestore REST client with token caching and emulator support
//! - Typed document values and structured/aggregation queries
//! - The `VideoStore` trait with Firestore and in-memory implementations

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod token_cache;
pub mod types;
pub mod video_repo;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use memory::MemoryVideoStore;
pub use store::VideoStore;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use video_repo::{FirestoreVideoStore, VIDEOS_COLLECTION};
