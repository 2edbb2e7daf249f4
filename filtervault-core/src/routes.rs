//! Route builders for the template database API.
//!
//! Endpoints are relative paths joined to the client's base URL. Builders
//! that take identifiers format them in place; query parameters are
//! appended here rather than at call sites so the shapes stay consistent.

/// Authentication endpoints.
pub mod auth {
    /// Browser login entry point (opened out-of-band).
    pub fn login() -> String {
        "/auth/discord/login".to_string()
    }

    /// Refresh token exchange.
    pub fn refresh() -> String {
        "/auth/refresh".to_string()
    }

    /// Lightweight session validity check.
    pub fn test() -> String {
        "/auth/test".to_string()
    }
}

/// Health endpoints.
pub mod health {
    pub fn ping() -> String {
        "/health/ping".to_string()
    }
}

/// Template CRUD endpoints, all scoped by template type.
pub mod templates {
    /// List the template types the backend serves.
    pub fn types() -> String {
        "/templates/types".to_string()
    }

    pub fn create(type_id: &str) -> String {
        format!("/templates/{type_id}/create")
    }

    /// Templates owned by the current user.
    pub fn mine(type_id: &str) -> String {
        format!("/templates/{type_id}/my")
    }

    pub fn public_list(type_id: &str, page: u32, limit: u32) -> String {
        format!("/templates/{type_id}/public?page={page}&limit={limit}")
    }

    pub fn get(type_id: &str, template_id: &str, include_all_versions: bool) -> String {
        let suffix = if include_all_versions {
            "?includeAllVersions=true"
        } else {
            ""
        };
        format!("/templates/{type_id}/template/{template_id}{suffix}")
    }

    pub fn update(type_id: &str, template_id: &str) -> String {
        format!("/templates/{type_id}/template/{template_id}")
    }

    pub fn delete(type_id: &str, template_id: &str) -> String {
        format!("/templates/{type_id}/template/{template_id}")
    }
}

/// User administration endpoints.
pub mod users {
    pub fn get(user_id: &str) -> String {
        format!("/users/{user_id}")
    }

    pub fn set_admin(user_id: &str) -> String {
        format!("/users/{user_id}/admin")
    }
}

/// Well-known template type identifiers.
pub mod types {
    pub const ITEM_FILTER_LIBRARY: &str = "itemfilterlibrary";
    pub const WHERES_MY_CRAFT_AT: &str = "wheresmycraftat";
}
