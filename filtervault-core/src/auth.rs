//! Auth wire types and login blob decoding.
//!
//! The browser-based login flow hands the user a base64-encoded JSON
//! bundle containing a fresh token pair. [`decode_login_blob`] turns that
//! into an [`AuthData`], validating that both tokens are actually present
//! before anything is persisted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::credentials::{Credentials, Secret};
use crate::error::ApiClientError;

/// Token pair plus user identity, as delivered by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthData {
    pub tokens: TokenPair,

    #[serde(default)]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: AccessTokenDetails,
    pub refresh: RefreshTokenDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenDetails {
    pub token: String,

    /// Token scheme, normally "Bearer".
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,

    /// Unix timestamp (seconds).
    #[serde(default)]
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenDetails {
    pub token: String,

    /// Unix timestamp (seconds).
    #[serde(default)]
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: String,

    #[serde(default, rename = "isAdmin")]
    pub is_admin: Option<bool>,
}

impl AuthData {
    /// Fold this auth payload into a credential snapshot, carrying over
    /// user identity fields the payload does not mention.
    pub fn apply_to(&self, previous: &Credentials) -> Credentials {
        Credentials {
            access_token: Secret::new(self.tokens.access.token.clone()),
            access_token_expiry: self.tokens.access.expires_at,
            refresh_token: Secret::new(self.tokens.refresh.token.clone()),
            refresh_token_expiry: self.tokens.refresh.expires_at,
            user_id: self
                .user
                .as_ref()
                .map(|u| u.id.clone())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| previous.user_id.clone()),
            is_admin: self
                .user
                .as_ref()
                .and_then(|u| u.is_admin)
                .unwrap_or(previous.is_admin),
        }
    }
}

/// Response payload of `GET /auth/test`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestAuthResponse {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub user: Option<UserInfo>,

    /// Unix timestamp (seconds) of the current access token's expiry.
    #[serde(default, rename = "tokenExpiry")]
    pub token_expiry: i64,
}

impl TestAuthResponse {
    /// Whether the server considers the session live.
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }
}

/// Decode and validate a base64-encoded login bundle.
///
/// Fails with [`ApiClientError::InvalidLogin`] when the blob is not
/// base64, not the expected JSON shape, or is missing either token. No
/// credential state is touched here; callers persist only after this
/// succeeds.
pub fn decode_login_blob(encoded: &str) -> Result<AuthData, ApiClientError> {
    let raw = BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiClientError::InvalidLogin {
            message: format!("auth data is not valid base64: {e}"),
        })?;

    let auth: AuthData =
        serde_json::from_slice(&raw).map_err(|e| ApiClientError::InvalidLogin {
            message: format!("auth data is not valid JSON: {e}"),
        })?;

    if auth.tokens.access.token.is_empty() || auth.tokens.refresh.token.is_empty() {
        return Err(ApiClientError::InvalidLogin {
            message: "auth data is missing access or refresh token".to_string(),
        });
    }

    Ok(auth)
}
