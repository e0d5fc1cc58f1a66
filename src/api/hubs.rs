//! Zhub API endpoints
//!
//! Public: `/hubs`, `/hubs/{slug}`, `/hub-categories`.
//! Admin: `/admin/hubs`, `/admin/hub-categories`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, ok, ok_empty, ApiOk, ApiResult};
use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::models::{Hub, HubCategory, HubCategoryInput, HubFilter, HubInput, HubStatus, ListParams, PagedResult};

#[derive(Debug, Deserialize)]
pub struct HubListQuery {
    /// Category slug
    pub category: Option<String>,
    pub search: Option<String>,
    /// Admin listing only
    pub status: Option<HubStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl HubListQuery {
    fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Deserialize)]
pub struct HubStatusRequest {
    pub status: HubStatus,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/hubs", get(list_hubs))
        .route("/hubs/{slug}", get(get_hub))
        .route("/hub-categories", get(list_categories))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/hubs", get(admin_list_hubs).post(create_hub))
        .route("/hubs/{id}", get(admin_get_hub).put(update_hub).delete(delete_hub))
        .route("/hubs/{id}/status", put(set_hub_status))
        .route("/hub-categories", get(list_categories).post(create_category))
        .route(
            "/hub-categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

// ============================================================================
// Public
// ============================================================================

async fn list_hubs(
    State(state): State<AppState>,
    Query(query): Query<HubListQuery>,
) -> ApiResult<PagedResult<Hub>> {
    let params = query.params();
    Ok(ok(state
        .hub_service
        .list_public(query.category, query.search, &params)
        .await?))
}

async fn get_hub(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Hub> {
    Ok(ok(state.hub_service.get_public(&slug).await?))
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<HubCategory>> {
    Ok(ok(state.hub_service.list_categories().await?))
}

// ============================================================================
// Admin: hubs
// ============================================================================

async fn admin_list_hubs(
    State(state): State<AppState>,
    Query(query): Query<HubListQuery>,
) -> ApiResult<PagedResult<Hub>> {
    let params = query.params();
    let filter = HubFilter {
        category_slug: query.category,
        search: query.search,
        status: query.status,
    };
    Ok(ok(state.hub_service.list_all(&filter, &params).await?))
}

async fn admin_get_hub(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Hub> {
    Ok(ok(state.hub_service.get_by_id(id).await?))
}

async fn create_hub(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<HubInput>,
) -> Result<(StatusCode, Json<ApiOk<Hub>>), ApiError> {
    let hub = state.hub_service.create_hub(input).await?;
    Ok((StatusCode::CREATED, ok(hub)))
}

async fn update_hub(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<HubInput>,
) -> ApiResult<Hub> {
    Ok(ok(state.hub_service.update_hub(id, input).await?))
}

async fn set_hub_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<HubStatusRequest>,
) -> ApiResult<Hub> {
    Ok(ok(state.hub_service.set_status(id, body.status).await?))
}

async fn delete_hub(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.hub_service.delete_hub(id).await?;
    Ok(ok_empty())
}

// ============================================================================
// Admin: categories
// ============================================================================

async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<HubCategory> {
    Ok(ok(state.hub_service.get_category(id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<HubCategoryInput>,
) -> Result<(StatusCode, Json<ApiOk<HubCategory>>), ApiError> {
    let category = state.hub_service.create_category(input).await?;
    Ok((StatusCode::CREATED, ok(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<HubCategoryInput>,
) -> ApiResult<HubCategory> {
    Ok(ok(state.hub_service.update_category(id, input).await?))
}

async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.hub_service.delete_category(id).await?;
    Ok(ok_empty())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{register, test_server};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_hub_directory() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;

        let category: Value = server
            .post("/api/v1/admin/hub-categories")
            .authorization_bearer(&admin)
            .json(&json!({ "name": "Pendidikan" }))
            .await
            .json();
        let category_id = category["data"]["id"].as_i64().unwrap();
        assert_eq!(category["data"]["slug"], "pendidikan");

        let hub: Value = server
            .post("/api/v1/admin/hubs")
            .authorization_bearer(&admin)
            .json(&json!({
                "category_id": category_id,
                "name": "Kelas Koding Gratis",
                "link": "https://example.com/koding"
            }))
            .await
            .json();
        let hub_id = hub["data"]["id"].as_i64().unwrap();
        assert_eq!(hub["data"]["status"], "draft");

        server.get("/api/v1/hubs/kelas-koding-gratis").await.assert_status_not_found();

        server
            .put(&format!("/api/v1/admin/hubs/{}/status", hub_id))
            .authorization_bearer(&admin)
            .json(&json!({ "status": "active" }))
            .await
            .assert_status_ok();

        let listed: Value = server.get("/api/v1/hubs?category=pendidikan").await.json();
        assert_eq!(listed["data"]["total"], 1);
        assert_eq!(listed["data"]["items"][0]["category_name"], "Pendidikan");

        // a category in use cannot be removed
        let refused = server
            .delete(&format!("/api/v1/admin/hub-categories/{}", category_id))
            .authorization_bearer(&admin)
            .await;
        refused.assert_status(axum::http::StatusCode::CONFLICT);

        server
            .delete(&format!("/api/v1/admin/hubs/{}", hub_id))
            .authorization_bearer(&admin)
            .await
            .assert_status_ok();
        server
            .delete(&format!("/api/v1/admin/hub-categories/{}", category_id))
            .authorization_bearer(&admin)
            .await
            .assert_status_ok();

        let categories: Value = server.get("/api/v1/hub-categories").await.json();
        assert!(categories["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hub_with_unknown_category() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;

        let response = server
            .post("/api/v1/admin/hubs")
            .authorization_bearer(&admin)
            .json(&json!({ "category_id": 999, "name": "Yatim Piatu" }))
            .await;
        response.assert_status_bad_request();
    }
}
