//! Error taxonomy for the filtervault API client.
//!
//! Errors are split so callers can tell "server unreachable" from "server
//! responded but the payload was wrong" from "the session is no longer
//! authenticated". The UI surfaces `message` fields directly, so every
//! variant renders as a human sentence without internals.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::StoreError;

/// Machine-readable error codes produced by the server.
///
/// Mirrors the server's error taxonomy; codes the client does not know
/// about are preserved verbatim in [`ErrorCode::Unknown`] rather than
/// being coerced, since the retry policy must never act on a guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// 401: the access token is missing or expired; a refresh may recover.
    AuthRequired,
    /// 401: the refresh token itself was rejected; the session is dead.
    AuthRefreshError,
    /// 401: the presented token was malformed.
    AuthInvalidToken,
    /// 403: endpoint requires an administrator.
    AuthAdminOnly,
    /// 403: authenticated but not allowed.
    AuthForbidden,
    /// 400: request body failed validation.
    ValidationError,
    /// 429: request budget exhausted.
    RateLimitExceeded,
    /// 500: server-side database failure.
    DatabaseError,
    /// 500: unclassified server failure.
    InternalError,
    /// 404: no such route.
    RouteNotFound,
    /// Any code this client does not recognize.
    Unknown(String),
}

impl ErrorCode {
    /// Parse a wire code string.
    pub fn parse(code: &str) -> Self {
        match code {
            "AUTH_REQUIRED" => Self::AuthRequired,
            "AUTH_REFRESH_ERROR" => Self::AuthRefreshError,
            "AUTH_INVALID_TOKEN" => Self::AuthInvalidToken,
            "AUTH_ADMIN_ONLY" => Self::AuthAdminOnly,
            "AUTH_FORBIDDEN" => Self::AuthForbidden,
            "VALIDATION_ERROR" => Self::ValidationError,
            "RATE_LIMIT_EXCEEDED" => Self::RateLimitExceeded,
            "DATABASE_ERROR" => Self::DatabaseError,
            "INTERNAL_ERROR" => Self::InternalError,
            "ROUTE_NOT_FOUND" => Self::RouteNotFound,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire representation of this code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::AuthRefreshError => "AUTH_REFRESH_ERROR",
            Self::AuthInvalidToken => "AUTH_INVALID_TOKEN",
            Self::AuthAdminOnly => "AUTH_ADMIN_ONLY",
            Self::AuthForbidden => "AUTH_FORBIDDEN",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::RouteNotFound => "ROUTE_NOT_FOUND",
            Self::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `error` object the server returns on any non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable description.
    pub message: String,

    /// Machine-readable code from the server taxonomy.
    #[serde(default)]
    pub code: Option<String>,

    /// HTTP status mirror.
    #[serde(default)]
    pub status: Option<u16>,

    /// Optional structured details (validation field errors etc.).
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// The parsed error code, `Unknown("")` when absent.
    pub fn error_code(&self) -> ErrorCode {
        self.code
            .as_deref()
            .map(ErrorCode::parse)
            .unwrap_or_else(|| ErrorCode::Unknown(String::new()))
    }
}

/// Wire envelope: `{ "error": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

impl ApiErrorResponse {
    /// Parse an error body, or `None` if the payload is not the expected
    /// shape (callers then fall back to a generic status message).
    pub fn parse(bytes: &[u8]) -> Option<ApiErrorBody> {
        serde_json::from_slice::<ApiErrorResponse>(bytes)
            .ok()
            .map(|r| r.error)
    }
}

/// Errors surfaced by [`ApiClient`](crate::client::ApiClient).
#[derive(Debug, Error)]
pub enum ApiClientError {
    /// DNS, connect, or timeout failure. Always names the endpoint.
    #[error("request failed: {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server responded but the payload did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialize {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// A 401 that was not resolved by a successful refresh and retry.
    #[error("authentication failed ({code}): {message}")]
    Authentication { code: ErrorCode, message: String },

    /// Rate limiting persisted past the bounded retry budget.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Any other non-2xx response.
    #[error("{message} (status {status})")]
    Api {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },

    /// The login blob was malformed or failed server validation.
    #[error("login failed: {message}")]
    InvalidLogin { message: String },

    /// Operation attempted after the client was closed.
    #[error("client is closed")]
    Closed,

    /// Credential persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Client construction failed (bad base URL, transport setup).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Request body could not be encoded.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ApiClientError {
    /// Build the error for a non-2xx response, falling back to a generic
    /// message when the error body itself does not parse.
    pub(crate) fn from_response(status: u16, body: &[u8]) -> Self {
        match ApiErrorResponse::parse(body) {
            Some(error) => Self::Api {
                status,
                code: Some(error.error_code()),
                message: error.message,
            },
            None => Self::Api {
                status,
                code: None,
                message: format!("request failed with status {status}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        for code in [
            "AUTH_REQUIRED",
            "AUTH_REFRESH_ERROR",
            "RATE_LIMIT_EXCEEDED",
            "ROUTE_NOT_FOUND",
        ] {
            assert_eq!(ErrorCode::parse(code).as_str(), code);
        }
    }

    #[test]
    fn test_unknown_code_preserved() {
        let code = ErrorCode::parse("AUTH_SOMETHING_NEW");
        assert_eq!(code, ErrorCode::Unknown("AUTH_SOMETHING_NEW".to_string()));
        assert_eq!(code.as_str(), "AUTH_SOMETHING_NEW");
    }

    #[test]
    fn test_error_body_parse() {
        let body = br#"{"error":{"message":"nope","code":"AUTH_REQUIRED","status":401}}"#;
        let parsed = ApiErrorResponse::parse(body).unwrap();
        assert_eq!(parsed.message, "nope");
        assert_eq!(parsed.error_code(), ErrorCode::AuthRequired);
    }

    #[test]
    fn test_from_response_falls_back_on_garbage() {
        let err = ApiClientError::from_response(502, b"<html>bad gateway</html>");
        match err {
            ApiClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 502);
                assert!(code.is_none());
                assert!(message.contains("502"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
