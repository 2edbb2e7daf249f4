//! Integration tests for session startup and the login flow.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use filtervault_core::{
    ApiClient, ApiClientError, Credentials, MemoryTokenStore, Secret,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn valid_credentials() -> Credentials {
    let now = Utc::now().timestamp();
    Credentials {
        access_token: Secret::new("access-token"),
        access_token_expiry: now + 3600,
        refresh_token: Secret::new("refresh-token"),
        refresh_token_expiry: now + 86_400,
        user_id: "user-1".to_string(),
        is_admin: false,
    }
}

fn login_blob(access: &str, refresh: &str) -> String {
    let now = Utc::now().timestamp();
    let json = serde_json::json!({
        "tokens": {
            "access": { "token": access, "type": "Bearer", "expires_at": now + 3600 },
            "refresh": { "token": refresh, "expires_at": now + 86_400 }
        },
        "user": { "id": "user-9" }
    });
    BASE64.encode(serde_json::to_vec(&json).unwrap())
}

fn test_auth_body(user_id: &str, is_admin: bool) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "status": "connected",
            "user": { "id": user_id, "isAdmin": is_admin },
            "tokenExpiry": Utc::now().timestamp() + 3600
        }
    })
}

fn refresh_success_body(access: &str, refresh: &str) -> serde_json::Value {
    let now = Utc::now().timestamp();
    serde_json::json!({
        "data": {
            "tokens": {
                "access": { "token": access, "type": "Bearer", "expires_at": now + 3600 },
                "refresh": { "token": refresh, "expires_at": now + 86_400 }
            },
            "user": { "id": "user-1" }
        }
    })
}

#[tokio::test]
async fn test_initialize_with_valid_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .and(header("authorization", "Bearer access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_auth_body("user-1", true)))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_credentials(valid_credentials());
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    assert!(client.initialize().await);
    assert!(client.is_initialized());

    // User identity from the server is cached into the store.
    let creds = client.credentials().await.unwrap();
    assert_eq!(creds.user_id, "user-1");
    assert!(creds.is_admin);
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_auth_body("user-1", false)))
        .expect(2)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::with_credentials(valid_credentials());
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    assert!(client.initialize().await);
    assert!(client.initialize().await);

    // Exactly one validation call per initialize, nothing else.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_initialize_falls_back_to_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_success_body("new-token", "new-refresh")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut creds = valid_credentials();
    creds.access_token_expiry = Utc::now().timestamp() - 60; // expired
    let store = MemoryTokenStore::with_credentials(creds);
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    assert!(client.initialize().await);
    assert!(client.is_initialized());
    assert_eq!(
        client.credentials().await.unwrap().access_token.expose(),
        "new-token"
    );
}

#[tokio::test]
async fn test_initialize_without_tokens_clears_and_fails() {
    let server = MockServer::start().await;

    let store = MemoryTokenStore::new();
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    assert!(!client.initialize().await);
    assert!(!client.is_initialized());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_identity_writeback_keeps_concurrently_rotated_tokens() {
    let server = MockServer::start().await;

    // The auth check is slow enough that a refresh lands while its
    // identity write-back is still pending.
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(test_auth_body("user-1", true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_success_body("new-token", "new-refresh")),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Access token still usable but inside the refresh buffer, so the
    // explicit refresh actually exchanges tokens.
    let mut creds = valid_credentials();
    creds.access_token_expiry = Utc::now().timestamp() + 120;
    let store = MemoryTokenStore::with_credentials(creds);
    let client = Arc::new(ApiClient::new(server.uri(), store).await.unwrap());

    let initializing = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.initialize().await })
    };
    let refreshing = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.refresh_token().await })
    };

    assert!(initializing.await.unwrap());
    assert!(refreshing.await.unwrap().unwrap());

    // The rotated pair survives the write-back, and the identity landed.
    let creds = client.credentials().await.unwrap();
    assert_eq!(creds.access_token.expose(), "new-token");
    assert_eq!(creds.refresh_token.expose(), "new-refresh");
    assert_eq!(creds.user_id, "user-1");
    assert!(creds.is_admin);
}

#[tokio::test]
async fn test_login_happy_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_auth_body("user-9", false)))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    client
        .login(&login_blob("fresh-access", "fresh-refresh"))
        .await
        .unwrap();

    assert!(client.is_initialized());
    let creds = client.credentials().await.unwrap();
    assert_eq!(creds.access_token.expose(), "fresh-access");
    assert_eq!(creds.refresh_token.expose(), "fresh-refresh");
    assert_eq!(creds.user_id, "user-9");
}

#[tokio::test]
async fn test_login_with_missing_refresh_token_keeps_old_session() {
    let server = MockServer::start().await;

    let blob = BASE64.encode(
        serde_json::to_vec(&serde_json::json!({
            "tokens": {
                "access": { "token": "fresh-access", "expires_at": Utc::now().timestamp() + 3600 },
                "refresh": { "token": "", "expires_at": 0 }
            }
        }))
        .unwrap(),
    );

    let store = MemoryTokenStore::with_credentials(valid_credentials());
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    let err = client.login(&blob).await.unwrap_err();
    assert!(matches!(err, ApiClientError::InvalidLogin { .. }));

    // Validation happens before commit: the old session survives.
    let creds = client.credentials().await.unwrap();
    assert_eq!(creds.access_token.expose(), "access-token");
    assert_eq!(creds.refresh_token.expose(), "refresh-token");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_login_garbage_blob_rejected() {
    let server = MockServer::start().await;

    let store = MemoryTokenStore::new();
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    let err = client.login("definitely not base64 !!!").await.unwrap_err();
    assert!(matches!(err, ApiClientError::InvalidLogin { .. }));
}

#[tokio::test]
async fn test_login_rolls_back_when_server_validation_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "bad token", "code": "AUTH_INVALID_TOKEN", "status": 401 }
        })))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let client = ApiClient::new(server.uri(), store).await.unwrap();

    let err = client
        .login(&login_blob("fresh-access", "fresh-refresh"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiClientError::InvalidLogin { .. }));
    assert!(!client.is_initialized());

    // Tokens were persisted mid-login, so the failure must roll back.
    let creds = client.credentials().await.unwrap();
    assert!(creds.access_token.is_empty());
    assert!(creds.refresh_token.is_empty());
}
