//! Application state.

use std::sync::Arc;

use tracing::info;
use vtube_firestore::{FirestoreClient, FirestoreVideoStore, MemoryVideoStore, VideoStore};
use vtube_media::{CloudinaryGateway, MediaGateway};

use crate::config::{ApiConfig, StoreBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<dyn VideoStore>,
    pub media: Arc<dyn MediaGateway>,
}

impl AppState {
    /// Create application state from configuration and the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn VideoStore> = match config.store_backend {
            StoreBackend::Firestore => {
                let client = FirestoreClient::from_env().await?;
                Arc::new(FirestoreVideoStore::new(client))
            }
            StoreBackend::Memory => {
                info!("Using in-memory video store");
                Arc::new(MemoryVideoStore::new())
            }
        };
        let media: Arc<dyn MediaGateway> = Arc::new(CloudinaryGateway::from_env()?);

        Ok(Self::from_parts(config, store, media))
    }

    /// Assemble state from already constructed collaborators.
    pub fn from_parts(
        config: ApiConfig,
        store: Arc<dyn VideoStore>,
        media: Arc<dyn MediaGateway>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            media,
        }
    }
}
