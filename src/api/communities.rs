//! Community API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::{ok, ok_empty, ApiOk, ApiResult, ModerationListQuery, ModerationRequest, SearchQuery};
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Community, CommunityFilter, CommunityInput, PagedResult};
use crate::services::CommunityDetail;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_communities))
        .route("/{slug}", get(get_community))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_community))
        .route("/me", get(my_community).put(update_my_community))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list))
        .route("/{id}", get(admin_get).delete(admin_delete))
        .route("/{id}/moderate", post(admin_moderate))
}

async fn list_communities(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<PagedResult<Community>> {
    let params = query.params();
    Ok(ok(state.community_service.list_public(query.search, &params).await?))
}

async fn get_community(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<CommunityDetail> {
    Ok(ok(state.community_service.get_public(&slug).await?))
}

async fn register_community(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(input): ApiJson<CommunityInput>,
) -> Result<(StatusCode, Json<ApiOk<Community>>), ApiError> {
    let community = state.community_service.register(&user, input).await?;
    Ok((StatusCode::CREATED, ok(community)))
}

async fn my_community(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Option<Community>> {
    Ok(ok(state.community_service.my_community(&user).await?))
}

async fn update_my_community(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(input): ApiJson<CommunityInput>,
) -> ApiResult<Community> {
    Ok(ok(state.community_service.update_mine(&user, input).await?))
}

async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<ModerationListQuery>,
) -> ApiResult<PagedResult<Community>> {
    let filter = CommunityFilter {
        search: query.search.clone(),
        status: query.status,
    };
    Ok(ok(state.community_service.list_all(&filter, &query.params()).await?))
}

async fn admin_get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Community> {
    Ok(ok(state.community_service.get_by_id(id).await?))
}

async fn admin_moderate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<ModerationRequest>,
) -> ApiResult<Community> {
    Ok(ok(state.community_service.moderate(id, body.action, body.note).await?))
}

async fn admin_delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.community_service.delete(id).await?;
    Ok(ok_empty())
}
