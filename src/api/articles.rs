//! Article API endpoints
//!
//! Public:
//! - GET /api/v1/articles - Published articles (channel, community, search)
//! - GET /api/v1/articles/latest - Newest article per channel
//! - GET /api/v1/articles/{slug} - Published article, counts a view
//!
//! Authors (authenticated):
//! - POST /api/v1/articles - Create
//! - GET /api/v1/me/articles - Own articles in any status
//! - GET|PUT|DELETE /api/v1/me/articles/{id}
//! - POST /api/v1/me/articles/{id}/publish, /unpublish
//!
//! Admin:
//! - GET /api/v1/admin/articles - Every article (channel, status, search)
//! - POST /api/v1/admin/articles/{id}/ban, /unban

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, ok, ok_empty, ApiOk, ApiResult, PaginationQuery};
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{
    Article, ArticleChannel, ArticleFilter, ArticleStatus, CreateArticleInput, ListParams, PagedResult,
    UpdateArticleInput,
};
use crate::services::{ArticleQuery, LatestArticles};

/// Query parameters for the public listing
#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    pub channel: Option<ArticleChannel>,
    /// Community slug
    pub community: Option<String>,
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Query parameters for the admin listing
#[derive(Debug, Deserialize)]
pub struct AdminArticleQuery {
    pub channel: Option<ArticleChannel>,
    pub status: Option<ArticleStatus>,
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles))
        .route("/latest", get(latest_articles))
        .route("/{slug}", get(get_article))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/", post(create_article))
}

/// Mounted at `/me/articles`
pub fn author_router() -> Router<AppState> {
    Router::new()
        .route("/", get(my_articles))
        .route(
            "/{id}",
            get(get_own_article).put(update_article).delete(delete_article),
        )
        .route("/{id}/publish", post(publish_article))
        .route("/{id}/unpublish", post(unpublish_article))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list))
        .route("/{id}/ban", post(admin_ban))
        .route("/{id}/unban", post(admin_unban))
}

async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticleListQuery>,
) -> ApiResult<PagedResult<Article>> {
    let params = ListParams::new(query.page, query.per_page);
    let filter = ArticleQuery {
        channel: query.channel,
        community: query.community,
        search: query.search,
    };
    Ok(ok(state.article_service.list_public(&filter, &params).await?))
}

async fn latest_articles(State(state): State<AppState>) -> ApiResult<LatestArticles> {
    Ok(ok(state.article_service.latest_per_channel().await?))
}

async fn get_article(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Article> {
    Ok(ok(state.article_service.get_public(&slug).await?))
}

async fn create_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(input): ApiJson<CreateArticleInput>,
) -> Result<(StatusCode, Json<ApiOk<Article>>), ApiError> {
    let article = state.article_service.create(&user, input).await?;
    Ok((StatusCode::CREATED, ok(article)))
}

async fn my_articles(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> ApiResult<PagedResult<Article>> {
    Ok(ok(state.article_service.my_articles(&user, &query.params()).await?))
}

async fn get_own_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    Ok(ok(state.article_service.get_for_edit(&user, id).await?))
}

async fn update_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<UpdateArticleInput>,
) -> ApiResult<Article> {
    Ok(ok(state.article_service.update(&user, id, input).await?))
}

async fn delete_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.article_service.delete(&user, id).await?;
    Ok(ok_empty())
}

async fn publish_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    Ok(ok(state.article_service.publish(&user, id).await?))
}

async fn unpublish_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    Ok(ok(state.article_service.unpublish(&user, id).await?))
}

async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<AdminArticleQuery>,
) -> ApiResult<PagedResult<Article>> {
    let params = ListParams::new(query.page, query.per_page);
    let filter = ArticleFilter {
        channel: query.channel,
        status: query.status,
        search: query.search,
        ..Default::default()
    };
    Ok(ok(state.article_service.list_all(&filter, &params).await?))
}

async fn admin_ban(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    Ok(ok(state.article_service.ban(&admin, id).await?))
}

async fn admin_unban(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Article> {
    Ok(ok(state.article_service.unban(&admin, id).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{register, test_server};
    use serde_json::{json, Value};

    async fn create(server: &axum_test::TestServer, token: &str, body: Value) -> axum_test::TestResponse {
        server.post("/api/v1/articles").authorization_bearer(token).json(&body).await
    }

    #[tokio::test]
    async fn test_channel_rules_over_http() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let user = register(&server, "penulis").await;

        let gerak = json!({ "title": "Agenda Bulan Ini", "content": "isi", "channel": "gerak" });
        create(&server, &user, gerak.clone()).await.assert_status_forbidden();
        create(&server, &admin, gerak).await.assert_status(axum::http::StatusCode::CREATED);

        let dampak = json!({ "title": "Aksi Bersih Kali", "content": "isi", "channel": "dampak" });
        create(&server, &user, dampak).await.assert_status_forbidden();

        let detak = json!({ "title": "Opini Pemuda", "content": "**tebal**", "channel": "detak", "publish": true });
        let created: Value = create(&server, &user, detak).await.json();
        assert_eq!(created["data"]["status"], "published");
        assert_eq!(created["data"]["content_html"], "<p><strong>tebal</strong></p>\n");
    }

    #[tokio::test]
    async fn test_publish_flow_and_views() {
        let (server, _state, _scratch) = test_server().await;
        let _admin = register(&server, "admin").await;
        let user = register(&server, "penulis").await;

        let draft: Value = create(
            &server,
            &user,
            json!({ "title": "Catatan Kecil", "content": "halo", "channel": "detak" }),
        )
        .await
        .json();
        let id = draft["data"]["id"].as_i64().unwrap();
        assert_eq!(draft["data"]["status"], "draft");

        server.get("/api/v1/articles/catatan-kecil").await.assert_status_not_found();

        server
            .post(&format!("/api/v1/me/articles/{}/publish", id))
            .authorization_bearer(&user)
            .await
            .assert_status_ok();

        let listed: Value = server.get("/api/v1/articles?channel=detak").await.json();
        assert_eq!(listed["data"]["total"], 1);

        server.get("/api/v1/articles/catatan-kecil").await.assert_status_ok();
        let mine: Value = server
            .get(&format!("/api/v1/me/articles/{}", id))
            .authorization_bearer(&user)
            .await
            .json();
        assert_eq!(mine["data"]["view_count"], 1);
    }

    #[tokio::test]
    async fn test_title_matching_static_route_stays_reachable() {
        let (server, _state, _scratch) = test_server().await;
        let _admin = register(&server, "admin").await;
        let user = register(&server, "penulis").await;

        let created: Value = create(
            &server,
            &user,
            json!({ "title": "Latest", "content": "isi", "channel": "detak", "publish": true }),
        )
        .await
        .json();
        assert_eq!(created["data"]["slug"], "latest-2");

        let fetched: Value = server.get("/api/v1/articles/latest-2").await.json();
        assert_eq!(fetched["data"]["title"], "Latest");

        // the latest-per-channel listing keeps its path
        let latest: Value = server.get("/api/v1/articles/latest").await.json();
        assert_eq!(latest["data"]["detak"]["slug"], "latest-2");

        let explicit = create(
            &server,
            &user,
            json!({ "title": "Lain", "slug": "latest", "content": "isi", "channel": "detak" }),
        )
        .await;
        explicit.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_ban_blocks_author_edits() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;
        let user = register(&server, "penulis").await;

        let article: Value = create(
            &server,
            &user,
            json!({ "title": "Tulisan Bermasalah", "content": "x", "channel": "detak", "publish": true }),
        )
        .await
        .json();
        let id = article["data"]["id"].as_i64().unwrap();

        server
            .post(&format!("/api/v1/admin/articles/{}/ban", id))
            .authorization_bearer(&admin)
            .await
            .assert_status_ok();

        server
            .put(&format!("/api/v1/me/articles/{}", id))
            .authorization_bearer(&user)
            .json(&json!({ "title": "Tulisan Diperbaiki", "content": "y" }))
            .await
            .assert_status_forbidden();

        server.get("/api/v1/articles/tulisan-bermasalah").await.assert_status_not_found();

        let banned: Value = server
            .get("/api/v1/admin/articles?status=banned")
            .authorization_bearer(&admin)
            .await
            .json();
        assert_eq!(banned["data"]["total"], 1);
    }

    #[tokio::test]
    async fn test_other_users_cannot_touch_article() {
        let (server, _state, _scratch) = test_server().await;
        let _admin = register(&server, "admin").await;
        let author = register(&server, "penulis").await;
        let other = register(&server, "iseng").await;

        let article: Value = create(
            &server,
            &author,
            json!({ "title": "Milik Sendiri", "content": "x", "channel": "detak" }),
        )
        .await
        .json();
        let id = article["data"]["id"].as_i64().unwrap();

        server
            .delete(&format!("/api/v1/me/articles/{}", id))
            .authorization_bearer(&other)
            .await
            .assert_status_forbidden();
    }
}
