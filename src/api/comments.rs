//! Comment API endpoints
//!
//! - GET /api/v1/articles/{slug}/comments - Comments of a published article
//! - POST /api/v1/articles/{slug}/comments - Add a comment (authenticated)
//! - DELETE /api/v1/comments/{id} - Commenter, article author or admin

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::common::{ok, ok_empty, ApiOk, ApiResult};
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Comment, CreateCommentInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/articles/{slug}/comments", get(get_comments))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles/{slug}/comments", post(create_comment))
        .route("/comments/{id}", delete(delete_comment))
}

async fn get_comments(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Vec<Comment>> {
    Ok(ok(state.comment_service.list(&slug).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
    ApiJson(input): ApiJson<CreateCommentInput>,
) -> Result<(StatusCode, Json<ApiOk<Comment>>), ApiError> {
    let comment = state.comment_service.create(&user, &slug, input).await?;
    Ok((StatusCode::CREATED, ok(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.comment_service.delete(&user, id).await?;
    Ok(ok_empty())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{register, test_server};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_comment_thread() {
        let (server, _state, _scratch) = test_server().await;
        let _admin = register(&server, "admin").await;
        let author = register(&server, "penulis").await;
        let reader = register(&server, "pembaca").await;
        let stranger = register(&server, "lewat").await;

        server
            .post("/api/v1/articles")
            .authorization_bearer(&author)
            .json(&json!({ "title": "Ruang Diskusi", "content": "mari", "channel": "detak", "publish": true }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        server
            .post("/api/v1/articles/ruang-diskusi/comments")
            .json(&json!({ "content": "tanpa login" }))
            .await
            .assert_status_unauthorized();

        let created: Value = server
            .post("/api/v1/articles/ruang-diskusi/comments")
            .authorization_bearer(&reader)
            .json(&json!({ "content": "Setuju!" }))
            .await
            .json();
        let id = created["data"]["id"].as_i64().unwrap();

        let empty = server
            .post("/api/v1/articles/ruang-diskusi/comments")
            .authorization_bearer(&reader)
            .json(&json!({ "content": "" }))
            .await;
        empty.assert_status_bad_request();

        let listed: Value = server.get("/api/v1/articles/ruang-diskusi/comments").await.json();
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
        assert_eq!(listed["data"][0]["content"], "Setuju!");

        server
            .delete(&format!("/api/v1/comments/{}", id))
            .authorization_bearer(&stranger)
            .await
            .assert_status_forbidden();

        // the article's author may moderate their own thread
        server
            .delete(&format!("/api/v1/comments/{}", id))
            .authorization_bearer(&author)
            .await
            .assert_status_ok();

        let listed: Value = server.get("/api/v1/articles/ruang-diskusi/comments").await.json();
        assert!(listed["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comments_of_missing_article() {
        let (server, _state, _scratch) = test_server().await;
        server
            .get("/api/v1/articles/tidak-ada/comments")
            .await
            .assert_status_not_found();
    }
}
