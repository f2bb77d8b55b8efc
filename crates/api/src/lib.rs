//! Shared API types, webhook crypto, and SQL builders for tablier.
//!
//! This crate is the single source of truth for all API request/response
//! types and for the webhook/claims wire formats. It contains no HTTP calls
//! and no DB access — those live in the server.

use serde::{Deserialize, Serialize};

pub mod claims;
pub mod crypto;
pub mod db;
pub mod webhook;

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Role within an organization (restaurant).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Admin,
    Member,
}

impl OrgRole {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Parse a role string as delivered by the identity provider.
    ///
    /// Newer tokens carry `org:admin` / `org:member`; older webhook payloads
    /// used bare `admin` / `basic_member`.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "org:admin" | "admin" => Self::Admin,
            _ => Self::Member,
        }
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Validate and normalize a restaurant or dish name. Returns the trimmed name.
pub fn validate_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim().to_string();
    if trimmed.is_empty() || trimmed.len() > 100 {
        return Err(ServiceError::BadRequest(
            "name must be 1-100 characters".into(),
        ));
    }
    Ok(trimmed)
}

/// Validate a hex color like `#D69E2E`.
pub fn validate_color(color: &str) -> Result<String, ServiceError> {
    let c = color.trim();
    let valid = c.len() == 7
        && c.starts_with('#')
        && c[1..].bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(ServiceError::BadRequest(
            "color must be a #rrggbb hex value".into(),
        ));
    }
    Ok(c.to_ascii_uppercase())
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Restaurant settings returned by `GET /api/v1/restaurant/settings`.
///
/// Field names are camelCase on the wire — the dashboard frontend predates
/// this backend and its shapes are frozen.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSettingsResponse {
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub google_link: Option<String>,
    pub tripadvisor_link: Option<String>,
    pub enabled_languages: Vec<String>,
}

/// Returned by `PUT /api/v1/restaurant/settings`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsResponse {
    pub message: String,
    pub logo_url: Option<String>,
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Restaurant-wide aggregates for admins (`GET /api/v1/dashboard/stats`).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsResponse {
    pub member_count: i64,
    pub server_count: i64,
    pub dish_count: i64,
}

/// Per-caller stats for non-admin staff (`GET /api/v1/dashboard/stats`).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatsResponse {
    pub name: String,
    pub avatar_url: Option<String>,
    pub restaurant_name: String,
    pub dish_count: i64,
}

// ─── Menu ────────────────────────────────────────────────────────────────────

/// Request body for `POST /api/v1/dishes`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDishRequest {
    pub name: String,
    pub category: String,
}

/// A single menu item.
#[derive(Debug, Serialize, Deserialize)]
pub struct DishResponse {
    pub id: String,
    pub name: String,
    pub category: String,
}

/// Returned by `GET /api/v1/dishes`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListDishesResponse {
    pub dishes: Vec<DishResponse>,
}

// ─── Staff ───────────────────────────────────────────────────────────────────

/// A staff (server) profile.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffResponse {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Returned by `GET /api/v1/servers`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListStaffResponse {
    pub servers: Vec<StaffResponse>,
}

// ─── Me ──────────────────────────────────────────────────────────────────────

/// Claims echo + local user mirror, returned by `GET /api/v1/me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub org_id: Option<String>,
    pub org_role: Option<String>,
}

// ─── Misc ────────────────────────────────────────────────────────────────────

/// Generic success response for operations that don't return data.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Liveness response for `GET /api/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code; the server converts this into
/// an Axum response.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Unavailable(m)
            | Self::Internal(m) => m,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}
