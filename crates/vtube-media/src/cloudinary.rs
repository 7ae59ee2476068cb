//! Cloudinary implementation of the media gateway.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::gateway::{MediaGateway, ResourceKind, StoredMedia};
use crate::staged::StagedFile;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Parameters never included in the request signature.
const UNSIGNED_PARAMS: &[&str] = &[
    "file",
    "api_key",
    "resource_type",
    "cloud_name",
    "signature_algorithm",
];

// =============================================================================
// Configuration
// =============================================================================

/// Cloudinary credentials and endpoint settings.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder new uploads are placed in
    pub upload_folder: Option<String>,
    /// API base URL (overridable for tests)
    pub api_base: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("upload_folder", &self.upload_folder)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CloudinaryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> MediaResult<Self> {
        fn required(name: &str) -> MediaResult<String> {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| MediaError::config_error(format!("{} not set", name)))
        }

        Ok(Self {
            cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,
            upload_folder: std::env::var("CLOUDINARY_UPLOAD_FOLDER")
                .ok()
                .map(|f| f.trim_matches('/').to_string())
                .filter(|f| !f.is_empty()),
            api_base: std::env::var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            timeout: Duration::from_secs(
                std::env::var("CLOUDINARY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: Option<String>,
    url: Option<String>,
    resource_type: Option<String>,
    duration: Option<f64>,
    bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

// =============================================================================
// Client
// =============================================================================

/// Cloudinary REST client.
#[derive(Clone)]
pub struct CloudinaryGateway {
    http: Client,
    config: CloudinaryConfig,
}

impl CloudinaryGateway {
    /// Create a new gateway from configuration.
    pub fn new(config: CloudinaryConfig) -> MediaResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vtube-media/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MediaResult<Self> {
        Self::new(CloudinaryConfig::from_env()?)
    }

    fn endpoint(&self, resource: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            resource,
            action
        )
    }

    /// Add timestamp, api key and signature to a set of request parameters.
    fn signed(&self, mut params: BTreeMap<&'static str, String>) -> BTreeMap<&'static str, String> {
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = sign_params(&params, &self.config.api_secret);
        params.insert("api_key", self.config.api_key.clone());
        params.insert("signature", signature);
        params.insert("signature_algorithm", "sha256".to_string());
        params
    }

    async fn upload(&self, file: &StagedFile) -> MediaResult<StoredMedia> {
        let source = tokio::fs::File::open(file.path()).await?;

        let mut params = BTreeMap::new();
        if let Some(folder) = &self.config.upload_folder {
            params.insert("folder", folder.clone());
        }

        let form = self
            .signed(params)
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .part(
                "file",
                Part::stream_with_length(source, file.size()).file_name(file.file_name().to_string()),
            );

        let url = self.endpoint("auto", "upload");
        debug!("Uploading {} ({} bytes) to {}", file.file_name(), file.size(), url);

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::rejected(status.as_u16(), response).await);
        }

        let body: UploadResponse = response.json().await?;
        let url = body
            .secure_url
            .or(body.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| MediaError::invalid_response("upload response has no URL"))?;

        Ok(StoredMedia {
            url,
            public_id: body.public_id,
            resource_type: body.resource_type.unwrap_or_else(|| "raw".to_string()),
            duration: body.duration,
            bytes: body.bytes.unwrap_or(file.size()),
        })
    }

    async fn destroy(&self, public_id: &str, kind: ResourceKind) -> MediaResult<()> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());

        let url = self.endpoint(kind.as_str(), "destroy");
        let response = self
            .http
            .post(&url)
            .form(&self.signed(params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::rejected(status.as_u16(), response).await);
        }

        let body: DestroyResponse = response.json().await?;
        if body.result == "ok" {
            Ok(())
        } else {
            Err(MediaError::NotAcknowledged(body.result))
        }
    }

    async fn rejected(status: u16, response: reqwest::Response) -> MediaError {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error.message)
            .unwrap_or(text);
        MediaError::Rejected { status, message }
    }
}

#[async_trait]
impl MediaGateway for CloudinaryGateway {
    async fn store(&self, file: StagedFile) -> MediaResult<StoredMedia> {
        let result = self.upload(&file).await;

        let file_name = file.file_name().to_string();
        if let Err(e) = file.discard() {
            warn!("Failed to remove staged upload {}: {}", file_name, e);
        }

        match &result {
            Ok(media) => {
                counter!("vtube_media_uploads_total", "outcome" => "ok").increment(1);
                info!(
                    public_id = %media.public_id,
                    resource_type = %media.resource_type,
                    "Uploaded {} to media host",
                    file_name
                );
            }
            Err(e) => {
                counter!("vtube_media_uploads_total", "outcome" => "error").increment(1);
                warn!("Upload of {} failed: {}", file_name, e);
            }
        }

        result
    }

    async fn remove(&self, remote_url: Option<&str>, kind: ResourceKind) -> MediaResult<()> {
        let remote_url = remote_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(MediaError::MissingUrl)?;

        let public_id = public_id_from_url(remote_url)
            .ok_or_else(|| MediaError::InvalidUrl(remote_url.to_string()))?;
        let public_id = match &self.config.upload_folder {
            Some(folder) => format!("{}/{}", folder, public_id),
            None => public_id,
        };

        let result = self.destroy(&public_id, kind).await;
        match &result {
            Ok(()) => {
                counter!("vtube_media_deletes_total", "outcome" => "ok").increment(1);
                info!(public_id = %public_id, kind = %kind, "Deleted media object");
            }
            Err(e) => {
                counter!("vtube_media_deletes_total", "outcome" => "error").increment(1);
                warn!(public_id = %public_id, kind = %kind, "Media deletion failed: {}", e);
            }
        }
        result
    }

    async fn health_check(&self) -> MediaResult<()> {
        let url = format!(
            "{}/{}/ping",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::rejected(status.as_u16(), response).await)
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Sign request parameters: sorted `k=v` pairs joined by `&`, followed by
/// the API secret, hashed with SHA-256 (lowercase hex).
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .filter(|(key, value)| !UNSIGNED_PARAMS.contains(key) && !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    Sha256::digest(format!("{}{}", to_sign, api_secret).as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Public ID of a hosted object: the last path segment of its URL with the
/// extension stripped.
pub fn public_id_from_url(remote_url: &str) -> Option<String> {
    let path = match Url::parse(remote_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => remote_url.to_string(),
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    let stem = segment
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(segment);

    if stem.is_empty() {
        return None;
    }

    Some(
        urlencoding::decode(stem)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| stem.to_string()),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_base: &str) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key123".to_string(),
            api_secret: "secret".to_string(),
            upload_folder: None,
            api_base: api_base.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn staged(dir: &std::path::Path, name: &str) -> StagedFile {
        StagedFile::write_in(dir, name, None, b"fake media bytes").unwrap()
    }

    #[test]
    fn test_public_id_from_url() {
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/video/upload/v1712/abc123.mp4"),
            Some("abc123".to_string())
        );
        assert_eq!(
            public_id_from_url("http://res.cloudinary.com/demo/image/upload/v1/my%20thumb.final.png"),
            Some("my thumb.final".to_string())
        );
        assert_eq!(public_id_from_url("abc.jpg"), Some("abc".to_string()));
        assert_eq!(public_id_from_url("noext"), Some("noext".to_string()));
        assert_eq!(public_id_from_url("https://res.cloudinary.com/demo/"), None);
    }

    #[test]
    fn test_signature_ignores_unsigned_params_and_order() {
        let mut a = BTreeMap::new();
        a.insert("timestamp", "1315060510".to_string());
        a.insert("public_id", "sample".to_string());

        let mut b = a.clone();
        b.insert("api_key", "other-key".to_string());
        b.insert("signature_algorithm", "sha256".to_string());

        let sig = sign_params(&a, "abcd");
        assert_eq!(sig, sign_params(&b, "abcd"));
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(sig, sign_params(&a, "other-secret"));
    }

    #[tokio::test]
    async fn test_store_returns_url_and_removes_temp_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/auto/upload"))
            .and(body_string_contains("fake media bytes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "public_id": "abc123",
                "secure_url": "https://res.cloudinary.com/demo/video/upload/v1/abc123.mp4",
                "url": "http://res.cloudinary.com/demo/video/upload/v1/abc123.mp4",
                "resource_type": "video",
                "duration": 42.5,
                "bytes": 16
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = CloudinaryGateway::new(test_config(&server.uri())).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = staged(dir.path(), "clip.mp4");
        let local = file.path().to_path_buf();

        let media = gateway.store(file).await.unwrap();

        assert_eq!(media.url, "https://res.cloudinary.com/demo/video/upload/v1/abc123.mp4");
        assert_eq!(media.duration, Some(42.5));
        assert_eq!(media.resource_type, "video");
        assert!(!local.exists());
    }

    #[tokio::test]
    async fn test_store_failure_still_removes_temp_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/auto/upload"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "Invalid image file" }
            })))
            .mount(&server)
            .await;

        let gateway = CloudinaryGateway::new(test_config(&server.uri())).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = staged(dir.path(), "thumb.png");
        let local = file.path().to_path_buf();

        let err = gateway.store(file).await.unwrap_err();

        match err {
            MediaError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid image file");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!local.exists());
    }

    #[tokio::test]
    async fn test_remove_requires_explicit_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/video/destroy"))
            .and(body_string_contains("public_id=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "ok" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "not found" })),
            )
            .mount(&server)
            .await;

        let gateway = CloudinaryGateway::new(test_config(&server.uri())).unwrap();

        gateway
            .remove(
                Some("https://res.cloudinary.com/demo/video/upload/v1/abc123.mp4"),
                ResourceKind::Video,
            )
            .await
            .unwrap();

        let err = gateway
            .remove(
                Some("https://res.cloudinary.com/demo/image/upload/v1/gone.png"),
                ResourceKind::Image,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NotAcknowledged(ref r) if r == "not found"));
    }

    #[tokio::test]
    async fn test_remove_without_url_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gateway = CloudinaryGateway::new(test_config(&server.uri())).unwrap();
        assert!(matches!(
            gateway.remove(None, ResourceKind::Image).await,
            Err(MediaError::MissingUrl)
        ));
        assert!(matches!(
            gateway.remove(Some("  "), ResourceKind::Image).await,
            Err(MediaError::MissingUrl)
        ));
    }

    #[tokio::test]
    async fn test_remove_prefixes_upload_folder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .and(body_string_contains("public_id=videotube%2Fthumb1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.upload_folder = Some("videotube".to_string());
        let gateway = CloudinaryGateway::new(config).unwrap();

        gateway
            .remove(
                Some("https://res.cloudinary.com/demo/image/upload/v1/videotube/thumb1.jpg"),
                ResourceKind::Image,
            )
            .await
            .unwrap();
    }

    #[test]
    #[serial]
    fn test_config_from_env_requires_credentials() {
        std::env::remove_var("CLOUDINARY_CLOUD_NAME");
        std::env::set_var("CLOUDINARY_API_KEY", "k");
        std::env::set_var("CLOUDINARY_API_SECRET", "s");
        assert!(CloudinaryConfig::from_env().is_err());

        std::env::set_var("CLOUDINARY_CLOUD_NAME", "demo");
        std::env::set_var("CLOUDINARY_UPLOAD_FOLDER", "/videos/");
        let config = CloudinaryConfig::from_env().unwrap();
        assert_eq!(config.upload_folder.as_deref(), Some("videos"));
        assert_eq!(config.api_base, DEFAULT_API_BASE);

        std::env::remove_var("CLOUDINARY_UPLOAD_FOLDER");
    }
}
