//! Talent API endpoints
//!
//! Public directory, the owner's own profile, and admin moderation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{ok, ok_empty, ApiOk, ApiResult, ModerationListQuery, ModerationRequest};
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{ListParams, PagedResult, Talent, TalentFilter, TalentInput};
use crate::services::TalentDetail;

#[derive(Debug, Deserialize)]
pub struct TalentListQuery {
    pub search: Option<String>,
    pub profession: Option<String>,
    #[serde(default = "crate::api::common::default_page")]
    pub page: u32,
    #[serde(default = "crate::api::common::default_per_page")]
    pub per_page: u32,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_talents))
        .route("/{slug}", get(get_talent))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_talent))
        .route("/me", get(my_talent).put(update_my_talent))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list))
        .route("/{id}", get(admin_get).delete(admin_delete))
        .route("/{id}/moderate", post(admin_moderate))
}

/// GET /api/v1/talents
async fn list_talents(
    State(state): State<AppState>,
    Query(query): Query<TalentListQuery>,
) -> ApiResult<PagedResult<Talent>> {
    let params = ListParams::new(query.page, query.per_page);
    let page = state
        .talent_service
        .list_public(query.search, query.profession, &params)
        .await?;
    Ok(ok(page))
}

/// GET /api/v1/talents/{slug}
async fn get_talent(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<TalentDetail> {
    Ok(ok(state.talent_service.get_public(&slug).await?))
}

/// POST /api/v1/talents
async fn register_talent(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(input): ApiJson<TalentInput>,
) -> Result<(StatusCode, Json<ApiOk<Talent>>), ApiError> {
    let talent = state.talent_service.register(&user, input).await?;
    Ok((StatusCode::CREATED, ok(talent)))
}

/// GET /api/v1/talents/me
///
/// `data` is null when the user has not registered a profile.
async fn my_talent(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Option<Talent>> {
    Ok(ok(state.talent_service.my_talent(&user).await?))
}

/// PUT /api/v1/talents/me
async fn update_my_talent(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(input): ApiJson<TalentInput>,
) -> ApiResult<Talent> {
    Ok(ok(state.talent_service.update_mine(&user, input).await?))
}

/// GET /api/v1/admin/talents
async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<ModerationListQuery>,
) -> ApiResult<PagedResult<Talent>> {
    let filter = TalentFilter {
        search: query.search.clone(),
        profession: None,
        status: query.status,
    };
    Ok(ok(state.talent_service.list_all(&filter, &query.params()).await?))
}

/// GET /api/v1/admin/talents/{id}
async fn admin_get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Talent> {
    Ok(ok(state.talent_service.get_by_id(id).await?))
}

/// POST /api/v1/admin/talents/{id}/moderate
async fn admin_moderate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<ModerationRequest>,
) -> ApiResult<Talent> {
    Ok(ok(state.talent_service.moderate(id, body.action, body.note).await?))
}

/// DELETE /api/v1/admin/talents/{id}
async fn admin_delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.talent_service.delete(id).await?;
    Ok(ok_empty())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{register, test_server};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_talent_lifecycle() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let user = register(&server, "penari").await;

        let created = server
            .post("/api/v1/talents")
            .authorization_bearer(&user)
            .json(&json!({ "name": "Dewi Lestari", "profession": "Penari" }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let talent: Value = created.json();
        assert_eq!(talent["data"]["status"], "pending");
        assert_eq!(talent["data"]["slug"], "dewi-lestari");
        let id = talent["data"]["id"].as_i64().unwrap();

        // pending profiles are not public
        server.get("/api/v1/talents/dewi-lestari").await.assert_status_not_found();

        let second = server
            .post("/api/v1/talents")
            .authorization_bearer(&user)
            .json(&json!({ "name": "Lagi", "profession": "Penari" }))
            .await;
        second.assert_status(axum::http::StatusCode::CONFLICT);

        server
            .post(&format!("/api/v1/admin/talents/{}/moderate", id))
            .authorization_bearer(&admin)
            .json(&json!({ "action": "approve" }))
            .await
            .assert_status_ok();

        let public: Value = server.get("/api/v1/talents/dewi-lestari").await.json();
        assert_eq!(public["data"]["talent"]["name"], "Dewi Lestari");

        let listed: Value = server.get("/api/v1/talents?profession=Penari").await.json();
        assert_eq!(listed["data"]["total"], 1);
    }

    #[tokio::test]
    async fn test_talent_named_me_gets_distinct_slug() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let user = register(&server, "seniman").await;

        let talent: Value = server
            .post("/api/v1/talents")
            .authorization_bearer(&user)
            .json(&json!({ "name": "Me", "profession": "Musisi" }))
            .await
            .json();
        assert_eq!(talent["data"]["slug"], "me-2");
        let id = talent["data"]["id"].as_i64().unwrap();

        server
            .post(&format!("/api/v1/admin/talents/{}/moderate", id))
            .authorization_bearer(&admin)
            .json(&json!({ "action": "approve" }))
            .await
            .assert_status_ok();

        let public: Value = server.get("/api/v1/talents/me-2").await.json();
        assert_eq!(public["data"]["talent"]["name"], "Me");
    }

    #[tokio::test]
    async fn test_admin_routes_reject_plain_users() {
        let (server, _state, _scratch) = test_server().await;
        let _admin = register(&server, "admin").await;
        let user = register(&server, "biasa").await;

        let response = server.get("/api/v1/admin/talents").authorization_bearer(&user).await;
        response.assert_status_forbidden();
        assert_eq!(response.json::<Value>()["code"], "FORBIDDEN");

        server.get("/api/v1/admin/talents").await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_bad_moderation_transition() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let user = register(&server, "pelukis").await;

        let talent: Value = server
            .post("/api/v1/talents")
            .authorization_bearer(&user)
            .json(&json!({ "name": "Bayu", "profession": "Pelukis" }))
            .await
            .json();
        let id = talent["data"]["id"].as_i64().unwrap();

        let response = server
            .post(&format!("/api/v1/admin/talents/{}/moderate", id))
            .authorization_bearer(&admin)
            .json(&json!({ "action": "unban" }))
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
    }
}
