//! Credential model and token storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A token wrapper that redacts itself in logs and debug output
//! - [`Credentials`] - The access/refresh token pair with expiries and user identity
//! - [`TokenStore`] - Trait for credential persistence backends
//! - [`MemoryTokenStore`] - In-memory implementation for testing and embedding
//! - [`FileTokenStore`] - JSON-file-backed implementation
//!
//! The client never reaches into a global settings object; it is handed a
//! [`TokenStore`] at construction and every credential read or write goes
//! through that seam.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// How long before expiry an access token is considered due for a
/// proactive refresh.
pub const EXPIRY_BUFFER_MINUTES: i64 = 5;

/// A token value that refuses to print itself.
///
/// Credential snapshots flow through tracing calls and debug dumps;
/// both `Debug` and `Display` render `[REDACTED]`, and the raw token is
/// reachable only through [`expose`](Secret::expose).
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw token.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token, for handing to the transport. Never log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no token is held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// The full credential state for one session.
///
/// Expiries are absolute unix timestamps (seconds). A token is valid only
/// while `now < expiry`; `now == expiry` counts as expired.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer access token for ordinary requests.
    pub access_token: Secret,

    /// Unix timestamp (seconds) at which the access token expires.
    pub access_token_expiry: i64,

    /// Long-lived token exchanged for new access tokens.
    pub refresh_token: Secret,

    /// Unix timestamp (seconds) at which the refresh token expires.
    pub refresh_token_expiry: i64,

    /// Server-side user identifier, populated on login and auth checks.
    pub user_id: String,

    /// Whether the server reports this user as an administrator.
    pub is_admin: bool,
}

impl Credentials {
    /// Whether the access token can still authenticate requests at `now`.
    pub fn has_valid_access_token(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now.timestamp() < self.access_token_expiry
    }

    /// Whether the refresh token can still be exchanged at `now`.
    pub fn has_valid_refresh_token(&self, now: DateTime<Utc>) -> bool {
        !self.refresh_token.is_empty() && now.timestamp() < self.refresh_token_expiry
    }

    /// Whether the access token expires within `buffer` of `now`.
    ///
    /// Used for proactive refresh so a token does not lapse between being
    /// fetched and being used.
    pub fn access_token_expires_within(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.access_token_expiry < (now + buffer).timestamp()
    }

    /// Reset every field to its empty/zero state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Error type for token store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend could not be read or written.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored credential data did not parse.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Abstraction over credential persistence.
///
/// `load` returns the current snapshot (empty defaults when nothing is
/// stored), `save` replaces it wholesale, `clear` resets it. Writes are
/// simple key-value replacement; no cross-call transaction is needed.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the current credential snapshot.
    async fn load(&self) -> Result<Credentials, StoreError>;

    /// Persist a new credential snapshot, replacing any previous one.
    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;

    /// Reset all stored credential fields.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory token store for testing and embedding.
///
/// Not persistent; state is lost when the process exits. Interior
/// mutability via `RwLock`, safe to share across tasks.
#[derive(Default)]
pub struct MemoryTokenStore {
    data: RwLock<Credentials>,
}

impl MemoryTokenStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing credentials.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            data: RwLock::new(credentials),
        }
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Credentials, StoreError> {
        Ok(self.data.read().clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        *self.data.write() = credentials.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.data.write().clear();
        Ok(())
    }
}

/// File-based token store holding a single JSON document.
///
/// The file is created with mode 0600 on unix since it carries live
/// session tokens.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store backed by the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_file(&self) -> Result<Credentials, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Credentials::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, credentials: &Credentials) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Credentials, StoreError> {
        self.read_file()
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        self.write_file(credentials)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.write_file(&Credentials::default())
    }
}
