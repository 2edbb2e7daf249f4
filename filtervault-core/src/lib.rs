//! # Filtervault Core
//!
//! Client library for the filtervault item-filter template database.
//!
//! This crate provides:
//! - An authenticated HTTP client with bearer-token lifecycle management,
//!   serialized token refresh, transparent 401 retry, and rate-limit
//!   backoff
//! - A credential model with validity predicates and pluggable storage
//! - Wire models and route builders for the template API
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filtervault_core::{ApiClient, FileTokenStore, routes, models};
//!
//! async fn list_my_templates() -> Result<(), filtervault_core::ApiClientError> {
//!     let store = FileTokenStore::new("/path/to/tokens.json");
//!     let client = ApiClient::new("https://api.example.com", store).await?;
//!
//!     if client.initialize().await {
//!         let templates: models::ApiResponse<Vec<models::Template>> = client
//!             .get(&routes::templates::mine(routes::types::ITEM_FILTER_LIBRARY))
//!             .await?;
//!         println!("{} templates", templates.data.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod compress;
pub mod credentials;
pub mod error;
pub mod models;
pub mod routes;

// Re-export commonly used types at crate root
pub use auth::{AuthData, TestAuthResponse, decode_login_blob};

pub use client::ApiClient;

pub use credentials::{
    Credentials,
    FileTokenStore,
    MemoryTokenStore,
    Secret,
    StoreError,
    TokenStore,
};

pub use error::{ApiClientError, ApiErrorBody, ApiErrorResponse, ErrorCode};
