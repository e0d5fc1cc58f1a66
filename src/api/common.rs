//! Common API utilities and shared types

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::{ListParams, ModerationStatus};
use crate::services::ModerationAction;

// ============================================================================
// Pagination
// ============================================================================

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for public listings
pub fn default_per_page() -> u32 {
    12
}

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// Pagination plus a free-text search, the most common listing query
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl SearchQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

// ============================================================================
// Moderation
// ============================================================================

/// Admin listing of a moderated entity
#[derive(Debug, Deserialize)]
pub struct ModerationListQuery {
    pub status: Option<ModerationStatus>,
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl ModerationListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// `{ "action": "approve" | "reject" | "ban" | "unban", "note"?: "..." }`
#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub action: ModerationAction,
    pub note: Option<String>,
}

// ============================================================================
// Success envelope
// ============================================================================

/// `{ "ok": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiResult<T> = Result<Json<ApiOk<T>>, ApiError>;

pub fn ok<T: Serialize>(data: T) -> Json<ApiOk<T>> {
    Json(ApiOk {
        ok: true,
        data: Some(data),
    })
}

/// `{ "ok": true }` for mutations with nothing to return
pub fn ok_empty() -> Json<ApiOk<()>> {
    Json(ApiOk { ok: true, data: None })
}
