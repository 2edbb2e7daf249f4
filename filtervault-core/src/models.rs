//! Wire models for the template database API.
//!
//! Responses arrive with snake_case field names inside a `{ "data": ... }`
//! envelope; request bodies go out camelCase. Both conventions are pinned
//! with explicit serde attributes so the in-memory names stay idiomatic.

use serde::{Deserialize, Deserializer, Serialize};

/// Success envelope: `{ "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// A template as listed by `my` and `public` endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub template_id: String,

    #[serde(default)]
    pub type_id: String,

    /// Owner's external identity.
    #[serde(default)]
    pub discord_id: String,

    pub name: String,

    #[serde(default)]
    pub is_public: bool,

    #[serde(default)]
    pub is_active: bool,

    #[serde(default)]
    pub version: i32,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub creator_name: Option<String>,

    /// Some backends serialize this count as a string.
    #[serde(default, deserialize_with = "int_or_string")]
    pub version_count: i32,

    #[serde(default)]
    pub updated_at: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub latest_version: i32,
}

/// A template fetched individually, with content attached.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDetailed {
    pub template_id: String,

    #[serde(default)]
    pub type_id: String,

    #[serde(default)]
    pub discord_id: String,

    pub name: String,

    #[serde(default)]
    pub is_public: bool,

    #[serde(default)]
    pub version: i32,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub creator_name: Option<String>,

    #[serde(default)]
    pub latest_version: Option<TemplateVersion>,

    #[serde(default)]
    pub versions: Vec<TemplateVersion>,
}

/// One stored revision of a template.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateVersion {
    pub version_number: i32,

    #[serde(default)]
    pub content: serde_json::Value,

    /// Unix timestamp (seconds).
    #[serde(default)]
    pub created_at: i64,
}

/// A template category the backend serves (e.g. item filters).
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateType {
    pub type_id: String,

    #[serde(default)]
    pub name: String,
}

/// Paginated public template listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicTemplateList {
    #[serde(default)]
    pub data: Vec<Template>,

    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub current_page: i32,

    #[serde(default)]
    pub items_per_page: i32,

    #[serde(default)]
    pub total_items: i32,

    #[serde(default)]
    pub has_next_page: bool,

    #[serde(default)]
    pub has_previous_page: bool,

    #[serde(default)]
    pub last_page: i32,
}

/// Body for `POST /templates/{type}/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub name: String,
    pub content: serde_json::Value,
    pub is_public: bool,
}

/// Body for `PUT /templates/{type}/template/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    pub name: String,
    pub content: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_notes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// Body for `PUT /users/{id}/admin`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdminRequest {
    pub is_admin: bool,
}

fn int_or_string<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i32),
        Str(String),
    }

    Ok(match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(n) => n,
        IntOrString::Str(s) => s.parse().unwrap_or(0),
    })
}
