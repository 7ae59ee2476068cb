//! Access-token authentication.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie the access token may be sent in.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    #[serde(rename = "_id")]
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Expiration
    pub exp: i64,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl From<AccessClaims> for AuthUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            username: claims.username,
        }
    }
}

/// Verify an HS256 access token.
pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessClaims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Access token rejected: {}", e);
        ApiError::unauthorized("Invalid access token")
    })?;

    if data.claims.id.trim().is_empty() {
        return Err(ApiError::unauthorized("Invalid access token"));
    }
    Ok(data.claims)
}

/// Token from `Authorization: Bearer` or the access-token cookie.
fn extract_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Axum extractor for the authenticated user.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            extract_token(parts).ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

        let claims = verify_access_token(&token, &state.config.access_token_secret)?;
        Ok(AuthUser::from(claims))
    }
}
