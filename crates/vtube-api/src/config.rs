//! API configuration.

use std::path::PathBuf;

use anyhow::{bail, Context};

/// Which video store backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Firestore,
    Memory,
}

impl StoreBackend {
    fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => bail!("VIDEO_STORE must be 'firestore' or 'memory', got '{}'", other),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size (multipart uploads included)
    pub max_body_size: usize,
    /// Directory staged uploads are written to
    pub upload_temp_dir: PathBuf,
    /// HS256 secret access tokens are signed with
    pub access_token_secret: String,
    /// `isPublished` value of newly published videos
    pub publish_by_default: bool,
    pub store_backend: StoreBackend,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 100 * 1024 * 1024, // 100MB
            upload_temp_dir: std::env::temp_dir(),
            access_token_secret: String::new(),
            publish_by_default: true,
            store_backend: StoreBackend::default(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let access_token_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .context("ACCESS_TOKEN_SECRET must be set")?;

        let store_backend = match std::env::var("VIDEO_STORE") {
            Ok(value) => StoreBackend::parse(&value)?,
            Err(_) => StoreBackend::default(),
        };

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024),
            upload_temp_dir: std::env::var("UPLOAD_TEMP_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            access_token_secret,
            publish_by_default: env_flag("VIDEO_PUBLISHED_BY_DEFAULT", true),
            store_backend,
            metrics_enabled: env_flag("METRICS_ENABLED", true),
        })
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}
