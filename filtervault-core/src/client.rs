//! The authenticated HTTP client.
//!
//! [`ApiClient`] wraps a reqwest transport, attaches bearer auth from an
//! injected [`TokenStore`], and runs the refresh/retry policy:
//!
//! - 401 `AUTH_REQUIRED` triggers one refresh and one re-send of the
//!   original request; a failed retry propagates without looping.
//! - 401 `AUTH_REFRESH_ERROR` is fatal: all credentials are cleared.
//! - Other 401 codes surface as authentication errors without touching
//!   stored credentials; only a confirmed invalid-refresh signal destroys
//!   a session.
//! - 429 waits `Retry-After + 1` seconds (exponential backoff when the
//!   header is absent) for at most [`MAX_RATE_LIMIT_ATTEMPTS`] attempts.
//!
//! Refreshes are serialized behind a single `tokio::sync::Mutex`; the
//! validity re-check after acquisition collapses concurrent 401s into one
//! network round-trip. Dropping any in-flight future releases the lock,
//! so cancellation cannot wedge the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{AuthData, TestAuthResponse, decode_login_blob};
use crate::compress::{gunzip, maybe_compress};
use crate::credentials::{Credentials, EXPIRY_BUFFER_MINUTES, TokenStore};
use crate::error::{ApiClientError, ApiErrorResponse, ErrorCode};
use crate::models::ApiResponse;
use crate::routes;

/// Transport timeout for every request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Total attempts allowed against a rate-limited endpoint.
const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Seconds added on top of the server's `Retry-After`.
const RETRY_AFTER_BUFFER_SECS: u64 = 1;

/// Outcome of one low-level send.
///
/// The refresh/retry orchestration is a state machine over this type
/// rather than over caught errors, so retry decisions never depend on
/// error identity.
enum SendOutcome {
    /// 2xx with (decompressed) body bytes.
    Success(Vec<u8>),
    /// 401 AUTH_REQUIRED: a refresh may recover this request.
    AuthRequired { message: String },
    /// 401 AUTH_REFRESH_ERROR: the refresh token is confirmed dead.
    RefreshRejected { message: String },
    /// 401 with any other code: surfaced as-is, credentials untouched.
    OtherAuth { code: ErrorCode, message: String },
    /// 429 with the server's `Retry-After`, when present.
    RateLimited { retry_after: Option<u64> },
    /// Any other non-2xx.
    Failed { status: u16, body: Vec<u8> },
}

struct RequestBody {
    bytes: Vec<u8>,
    gzipped: bool,
}

impl RequestBody {
    fn prepare(raw: Vec<u8>) -> Result<Self, ApiClientError> {
        let (bytes, gzipped) = maybe_compress(raw).map_err(|e| ApiClientError::Internal {
            message: format!("failed to compress request body: {e}"),
        })?;
        Ok(Self { bytes, gzipped })
    }
}

/// Authenticated HTTP client for the template database.
///
/// One instance per session; cheap to share behind an `Arc`. All public
/// operations are async and cancel-safe, and all of them fail with
/// [`ApiClientError::Closed`] after [`close`](ApiClient::close).
pub struct ApiClient<S: TokenStore> {
    base_url: String,
    http: reqwest::Client,
    store: S,
    /// Current bearer token, kept in sync with the store.
    bearer: RwLock<Option<String>>,
    /// Serializes refresh exchanges; permit count 1.
    refresh_lock: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl<S: TokenStore> ApiClient<S> {
    /// Create a client for the given backend base URL.
    ///
    /// If the store already holds a valid access token the bearer header
    /// is primed immediately; otherwise requests go out unauthenticated
    /// until [`login`](ApiClient::login) or a refresh succeeds.
    pub async fn new(base_url: impl Into<String>, store: S) -> Result<Self, ApiClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ApiClientError::Config {
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;

        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiClientError::Config {
                message: format!("failed to build HTTP transport: {e}"),
            })?;

        let client = Self {
            base_url,
            http,
            store,
            bearer: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };

        let creds = client.store.load().await?;
        if creds.has_valid_access_token(Utc::now()) {
            client.set_bearer(creds.access_token.expose());
            debug!("primed bearer header from stored credentials");
        }

        Ok(client)
    }

    /// Whether the last authentication check succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    /// Shut the client down. Terminal: every later call fails with
    /// [`ApiClientError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!("api client closed");
    }

    /// Decide on startup whether the session can proceed without a fresh
    /// login.
    ///
    /// Tries the stored access token against `/auth/test`, then falls back
    /// to one refresh. Any failure, including unexpected ones, resolves to
    /// cleared credentials and `false` rather than ambiguous state.
    pub async fn initialize(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        match self.try_initialize().await {
            Ok(true) => {
                self.initialized.store(true, Ordering::SeqCst);
                debug!("client initialized");
                true
            }
            Ok(false) => {
                debug!("all authentication attempts failed");
                let _ = self.clear_credentials().await;
                false
            }
            Err(e) => {
                warn!("initialization failed: {e}");
                let _ = self.clear_credentials().await;
                false
            }
        }
    }

    async fn try_initialize(&self) -> Result<bool, ApiClientError> {
        let creds = self.store.load().await?;
        if creds.has_valid_access_token(Utc::now()) {
            debug!("valid access token found, testing authentication");
            self.set_bearer(creds.access_token.expose());
            if self.test_auth().await {
                return Ok(true);
            }
            debug!("access token failed validation");
        }

        // Reload: the test-auth round-trip may have rotated or cleared state.
        let creds = self.store.load().await?;
        if creds.has_valid_refresh_token(Utc::now()) {
            debug!("attempting refresh during initialization");
            match self.refresh_token().await {
                Ok(refreshed) => return Ok(refreshed),
                Err(e) => {
                    debug!("refresh during initialization failed: {e}");
                    return Ok(false);
                }
            }
        }

        Ok(false)
    }

    /// Accept a base64-encoded auth bundle from the browser login flow.
    ///
    /// The blob is validated before anything is persisted, so a malformed
    /// login leaves a working session untouched. A blob that parses but
    /// fails server validation rolls back completely.
    pub async fn login(&self, encoded_auth_data: &str) -> Result<(), ApiClientError> {
        self.ensure_open()?;

        let auth = decode_login_blob(encoded_auth_data)?;

        let previous = self.store.load().await?;
        let next = auth.apply_to(&previous);
        self.store.save(&next).await?;
        self.set_bearer(next.access_token.expose());

        if !self.test_auth().await {
            // No half-authenticated state: tokens were persisted, so roll back.
            self.clear_credentials().await?;
            return Err(ApiClientError::InvalidLogin {
                message: "failed to validate authentication with server".to_string(),
            });
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!("login completed");
        Ok(())
    }

    /// GET `endpoint`, deserializing the JSON response into `T`.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiClientError> {
        self.request(Method::GET, endpoint, None).await
    }

    /// POST a JSON body to `endpoint`.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiClientError> {
        self.request(Method::POST, endpoint, Some(encode_body(body)?))
            .await
    }

    /// PUT a JSON body to `endpoint`.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiClientError> {
        self.request(Method::PUT, endpoint, Some(encode_body(body)?))
            .await
    }

    /// PATCH a JSON body to `endpoint`.
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiClientError> {
        self.request(Method::PATCH, endpoint, Some(encode_body(body)?))
            .await
    }

    /// DELETE `endpoint`.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiClientError> {
        self.request(Method::DELETE, endpoint, None).await
    }

    /// Refresh proactively when the access token is inside the expiry
    /// buffer, so it cannot lapse between being fetched and being used.
    pub async fn ensure_fresh(&self) -> Result<(), ApiClientError> {
        self.ensure_open()?;

        let creds = self.store.load().await?;
        let now = Utc::now();
        let buffer = Duration::minutes(EXPIRY_BUFFER_MINUTES);

        if creds.has_valid_access_token(now) && !creds.access_token_expires_within(now, buffer) {
            return Ok(());
        }
        if creds.has_valid_refresh_token(now) {
            self.refresh_token().await?;
        }
        Ok(())
    }

    /// Exchange the refresh token for a new token pair.
    ///
    /// Returns `Ok(false)` when no valid refresh token exists or the
    /// failure is transient (credentials kept). A confirmed
    /// `AUTH_REFRESH_ERROR` clears all credentials and surfaces as a fatal
    /// [`ApiClientError::Authentication`].
    pub async fn refresh_token(&self) -> Result<bool, ApiClientError> {
        self.ensure_open()?;

        let creds = self.store.load().await?;
        if !creds.has_valid_refresh_token(Utc::now()) {
            debug!("no valid refresh token available");
            return Ok(false);
        }

        // Guard dropped on every exit path, including cancellation.
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while this one waited.
        let creds = self.store.load().await?;
        let now = Utc::now();
        let buffer = Duration::minutes(EXPIRY_BUFFER_MINUTES);
        if creds.has_valid_access_token(now) && !creds.access_token_expires_within(now, buffer) {
            debug!("token already refreshed by concurrent caller");
            return Ok(true);
        }
        if !creds.has_valid_refresh_token(now) {
            debug!("refresh token no longer valid after acquiring lock");
            return Ok(false);
        }

        // The exchange itself must not carry a possibly-expired bearer.
        let previous_bearer = self.bearer.write().take();

        let body = serde_json::to_vec(&serde_json::json!({
            "refresh_token": creds.refresh_token.expose(),
        }))
        .map_err(|e| ApiClientError::Internal {
            message: format!("failed to encode refresh request: {e}"),
        })?;
        let body = RequestBody {
            bytes: body,
            gzipped: false,
        };

        let endpoint = routes::auth::refresh();
        let mut attempts = 0u32;

        loop {
            debug!("sending refresh token request");
            let outcome = match self
                .send_once(Method::POST, &endpoint, Some(&body), false)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Transient transport failure: we do not yet know the
                    // refresh token is bad, so keep credentials.
                    warn!("token refresh failed: {e}");
                    *self.bearer.write() = previous_bearer;
                    return Ok(false);
                }
            };

            match outcome {
                SendOutcome::Success(bytes) => {
                    let parsed: ApiResponse<AuthData> = match serde_json::from_slice(&bytes) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            warn!("refresh response did not parse: {e}");
                            *self.bearer.write() = previous_bearer;
                            return Ok(false);
                        }
                    };

                    let next = parsed.data.apply_to(&creds);
                    self.store.save(&next).await?;
                    self.set_bearer(next.access_token.expose());
                    info!("token refresh completed");
                    return Ok(true);
                }
                SendOutcome::RateLimited { retry_after } => {
                    attempts += 1;
                    if attempts >= MAX_RATE_LIMIT_ATTEMPTS {
                        *self.bearer.write() = previous_bearer;
                        return Err(ApiClientError::RateLimited {
                            message: format!(
                                "{endpoint}: still rate limited after {attempts} attempts"
                            ),
                        });
                    }
                    rate_limit_wait(retry_after, attempts).await;
                }
                SendOutcome::RefreshRejected { message } => {
                    // The server confirmed the refresh token is dead.
                    warn!("refresh token rejected: {message}");
                    self.clear_credentials().await?;
                    return Err(ApiClientError::Authentication {
                        code: ErrorCode::AuthRefreshError,
                        message,
                    });
                }
                SendOutcome::AuthRequired { message }
                | SendOutcome::OtherAuth { message, .. } => {
                    warn!("refresh failed: {message}");
                    *self.bearer.write() = previous_bearer;
                    return Ok(false);
                }
                SendOutcome::Failed { status, .. } => {
                    warn!("refresh failed with status {status}");
                    *self.bearer.write() = previous_bearer;
                    return Ok(false);
                }
            }
        }
    }

    /// Hit `/auth/test` and cache the reported user identity.
    ///
    /// Failures of any kind resolve to `false`; callers act on nothing
    /// beyond the boolean.
    async fn test_auth(&self) -> bool {
        match self
            .get::<ApiResponse<TestAuthResponse>>(&routes::auth::test())
            .await
        {
            Ok(response) => {
                if let Some(user) = &response.data.user {
                    // The write-back holds the refresh lock so it cannot
                    // overwrite a concurrently rotated token pair with the
                    // snapshot it loaded.
                    let _guard = self.refresh_lock.lock().await;
                    match self.store.load().await {
                        Ok(mut creds) => {
                            creds.user_id = user.id.clone();
                            creds.is_admin = user.is_admin.unwrap_or(false);
                            if let Err(e) = self.store.save(&creds).await {
                                warn!("failed to cache user identity: {e}");
                            }
                        }
                        Err(e) => warn!("failed to cache user identity: {e}"),
                    }
                    debug!("updated user info for {}", user.id);
                }
                response.data.is_connected()
            }
            Err(e) => {
                debug!("auth test failed: {e}");
                false
            }
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ApiClientError> {
        self.ensure_open()?;

        let body = match body {
            Some(raw) => Some(RequestBody::prepare(raw)?),
            None => None,
        };

        let mut rate_attempts = 0u32;

        loop {
            let outcome = self
                .send_once(method.clone(), endpoint, body.as_ref(), true)
                .await?;

            match outcome {
                SendOutcome::Success(bytes) => return deserialize_payload(endpoint, &bytes),

                SendOutcome::RateLimited { retry_after } => {
                    rate_attempts += 1;
                    if rate_attempts >= MAX_RATE_LIMIT_ATTEMPTS {
                        return Err(ApiClientError::RateLimited {
                            message: format!(
                                "{endpoint}: still rate limited after {rate_attempts} attempts"
                            ),
                        });
                    }
                    rate_limit_wait(retry_after, rate_attempts).await;
                }

                SendOutcome::AuthRequired { message } => {
                    debug!("received AUTH_REQUIRED for {endpoint}, attempting refresh");
                    if self.refresh_token().await? {
                        // One retry with the rotated token; whatever it
                        // returns is final.
                        let outcome = self
                            .send_once(method.clone(), endpoint, body.as_ref(), true)
                            .await?;
                        return resolve_outcome(endpoint, outcome);
                    }
                    return Err(ApiClientError::Authentication {
                        code: ErrorCode::AuthRequired,
                        message,
                    });
                }

                SendOutcome::RefreshRejected { message } => {
                    debug!("received AUTH_REFRESH_ERROR for {endpoint}, clearing all tokens");
                    self.clear_credentials().await?;
                    return Err(ApiClientError::Authentication {
                        code: ErrorCode::AuthRefreshError,
                        message,
                    });
                }

                SendOutcome::OtherAuth { code, message } => {
                    // Unrecognized 401 codes never clear credentials; a
                    // transient server hiccup must not destroy a session.
                    debug!("received unexpected auth error {code} for {endpoint}");
                    return Err(ApiClientError::Authentication { code, message });
                }

                SendOutcome::Failed { status, body } => {
                    return Err(ApiClientError::from_response(status, &body));
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&RequestBody>,
        with_bearer: bool,
    ) -> Result<SendOutcome, ApiClientError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.http.request(method, &url);

        if with_bearer {
            if let Some(token) = self.bearer.read().clone() {
                request = request.bearer_auth(token);
            }
        }

        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json");
            if body.gzipped {
                request = request.header(CONTENT_ENCODING, "gzip");
            }
            request = request.body(body.bytes.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiClientError::Transport {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("gzip"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiClientError::Transport {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        let body = if gzipped {
            gunzip(&bytes).map_err(|e| ApiClientError::Deserialize {
                endpoint: endpoint.to_string(),
                source: serde_json::Error::io(e),
            })?
        } else {
            bytes.to_vec()
        };

        debug!("received response with status {status} from {endpoint}");

        if status.is_success() {
            return Ok(SendOutcome::Success(body));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(SendOutcome::RateLimited { retry_after });
        }

        if status == StatusCode::UNAUTHORIZED {
            let (code, message) = match ApiErrorResponse::parse(&body) {
                Some(error) => (error.error_code(), error.message),
                None => (
                    ErrorCode::Unknown(String::new()),
                    format!("request failed with status {status}"),
                ),
            };

            return Ok(match code {
                ErrorCode::AuthRequired => SendOutcome::AuthRequired { message },
                ErrorCode::AuthRefreshError => SendOutcome::RefreshRejected { message },
                other => SendOutcome::OtherAuth {
                    code: other,
                    message,
                },
            });
        }

        Ok(SendOutcome::Failed {
            status: status.as_u16(),
            body,
        })
    }

    async fn clear_credentials(&self) -> Result<(), ApiClientError> {
        debug!("clearing all tokens");
        self.store.clear().await?;
        *self.bearer.write() = None;
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_bearer(&self, token: &str) {
        *self.bearer.write() = Some(token.to_string());
    }

    fn ensure_open(&self) -> Result<(), ApiClientError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ApiClientError::Closed)
        } else {
            Ok(())
        }
    }

    /// The backend base URL this client talks to, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The credential snapshot currently backing this client.
    pub async fn credentials(&self) -> Result<Credentials, ApiClientError> {
        Ok(self.store.load().await?)
    }

    /// Drop the current session locally.
    pub async fn logout(&self) -> Result<(), ApiClientError> {
        self.ensure_open()?;
        self.clear_credentials().await
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, ApiClientError> {
    serde_json::to_vec(body).map_err(|e| ApiClientError::Internal {
        message: format!("failed to serialize request body: {e}"),
    })
}

fn deserialize_payload<T: DeserializeOwned>(
    endpoint: &str,
    bytes: &[u8],
) -> Result<T, ApiClientError> {
    serde_json::from_slice(bytes).map_err(|e| ApiClientError::Deserialize {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

/// Map a terminal send outcome into the caller's result. Used for the
/// single post-refresh retry, where every outcome is final.
fn resolve_outcome<T: DeserializeOwned>(
    endpoint: &str,
    outcome: SendOutcome,
) -> Result<T, ApiClientError> {
    match outcome {
        SendOutcome::Success(bytes) => deserialize_payload(endpoint, &bytes),
        SendOutcome::AuthRequired { message } => Err(ApiClientError::Authentication {
            code: ErrorCode::AuthRequired,
            message,
        }),
        SendOutcome::RefreshRejected { message } => Err(ApiClientError::Authentication {
            code: ErrorCode::AuthRefreshError,
            message,
        }),
        SendOutcome::OtherAuth { code, message } => {
            Err(ApiClientError::Authentication { code, message })
        }
        SendOutcome::RateLimited { .. } => Err(ApiClientError::RateLimited {
            message: format!("{endpoint}: rate limited on retry"),
        }),
        SendOutcome::Failed { status, body } => Err(ApiClientError::from_response(status, &body)),
    }
}

/// Sleep out a rate-limit window.
///
/// Honors `Retry-After + 1`; falls back to exponential backoff (1, 2, 4s)
/// when the server does not say. Cancel-safe: it is a plain sleep.
async fn rate_limit_wait(retry_after: Option<u64>, attempt: u32) {
    let seconds = match retry_after {
        Some(seconds) => seconds + RETRY_AFTER_BUFFER_SECS,
        None => 1u64 << (attempt - 1).min(8),
    };
    debug!("rate limit hit, waiting {seconds}s before retry");
    tokio::time::sleep(StdDuration::from_secs(seconds)).await;
}
