//! Admin API endpoints
//!
//! User management and the dashboard counters. Moderation of talents,
//! communities, products and articles lives with those resources.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, ok, ApiResult};
use crate::api::middleware::{ApiJson, AppState, AuthenticatedUser};
use crate::models::{DashboardStats, ListParams, PagedResult, User, UserFilter, UserRole, UserStatus};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

/// Mounted at `/admin`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/{id}/role", put(set_role))
        .route("/users/{id}/ban", post(ban_user))
        .route("/users/{id}/unban", post(unban_user))
}

async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    Ok(ok(state.dashboard_service.stats().await?))
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<PagedResult<User>> {
    let params = ListParams::new(query.page, query.per_page);
    let filter = UserFilter {
        search: query.search,
        role: query.role,
        status: query.status,
    };
    Ok(ok(state.user_service.list_users(&filter, &params).await?))
}

async fn set_role(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<SetRoleRequest>,
) -> ApiResult<User> {
    Ok(ok(state.user_service.set_role(&admin, id, body.role).await?))
}

/// Banning also revokes the user's sessions
async fn ban_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<User> {
    Ok(ok(state.user_service.ban_user(&admin, id).await?))
}

async fn unban_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<User> {
    Ok(ok(state.user_service.unban_user(&admin, id).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{register, test_server};
    use serde_json::{json, Value};

    async fn user_id(server: &axum_test::TestServer, token: &str) -> i64 {
        let me: Value = server.get("/api/v1/auth/me").authorization_bearer(token).await.json();
        me["data"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_ban_revokes_access() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let user = register(&server, "warga").await;
        let id = user_id(&server, &user).await;

        server
            .post(&format!("/api/v1/admin/users/{}/ban", id))
            .authorization_bearer(&admin)
            .await
            .assert_status_ok();

        server.get("/api/v1/auth/me").authorization_bearer(&user).await.assert_status_unauthorized();

        let login = server
            .post("/api/v1/auth/login")
            .json(&json!({ "username_or_email": "warga", "password": "rahasia123" }))
            .await;
        login.assert_status_forbidden();
        assert_eq!(login.json::<Value>()["code"], "USER_BANNED");

        let banned: Value = server
            .get("/api/v1/admin/users?status=banned")
            .authorization_bearer(&admin)
            .await
            .json();
        assert_eq!(banned["data"]["total"], 1);
        assert_eq!(banned["data"]["items"][0]["username"], "warga");
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_self() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let id = user_id(&server, &admin).await;

        server
            .put(&format!("/api/v1/admin/users/{}/role", id))
            .authorization_bearer(&admin)
            .json(&json!({ "role": "user" }))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_promoted_user_reaches_dashboard() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let user = register(&server, "calon_admin").await;
        let id = user_id(&server, &user).await;

        server
            .get("/api/v1/admin/dashboard")
            .authorization_bearer(&user)
            .await
            .assert_status_forbidden();

        server
            .put(&format!("/api/v1/admin/users/{}/role", id))
            .authorization_bearer(&admin)
            .json(&json!({ "role": "admin" }))
            .await
            .assert_status_ok();

        server
            .post("/api/v1/talents")
            .authorization_bearer(&user)
            .json(&json!({ "name": "Calon Admin", "profession": "Fotografer" }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
        server
            .post("/api/v1/articles")
            .authorization_bearer(&admin)
            .json(&json!({ "title": "Agenda Pekan Ini", "content": "isi", "channel": "gerak", "publish": true }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let stats: Value = server
            .get("/api/v1/admin/dashboard")
            .authorization_bearer(&user)
            .await
            .json();
        assert_eq!(stats["data"]["users"], 2);
        assert_eq!(stats["data"]["pending_talents"], 1);
        assert_eq!(stats["data"]["pending_communities"], 0);
        assert_eq!(stats["data"]["published_articles"]["gerak"], 1);
        assert_eq!(stats["data"]["published_articles"]["detak"], 0);
        assert_eq!(stats["data"]["active_hubs"], 0);
    }
}
