//! Product API endpoints
//!
//! Products belong to a talent. Owners manage them under `/me/products`,
//! admins moderate them under `/admin/products`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, ok, ok_empty, ApiOk, ApiResult, ModerationListQuery, ModerationRequest};
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{ListParams, PagedResult, Product, ProductFilter, ProductInput};

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub search: Option<String>,
    /// Talent slug
    pub talent: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{slug}", get(get_product))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/", post(create_product))
}

/// Mounted at `/me/products`
pub fn owner_router() -> Router<AppState> {
    Router::new()
        .route("/", get(my_products))
        .route("/{id}", axum::routing::put(update_product).delete(delete_product))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list))
        .route("/{id}", get(admin_get).put(update_product).delete(delete_product))
        .route("/{id}/moderate", post(admin_moderate))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<PagedResult<Product>> {
    let params = ListParams::new(query.page, query.per_page);
    Ok(ok(state
        .product_service
        .list_public(query.search, query.talent, &params)
        .await?))
}

async fn get_product(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Product> {
    Ok(ok(state.product_service.get_public(&slug).await?))
}

async fn create_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<ApiOk<Product>>), ApiError> {
    let product = state.product_service.create(&user, input).await?;
    Ok((StatusCode::CREATED, ok(product)))
}

async fn my_products(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Vec<Product>> {
    Ok(ok(state.product_service.my_products(&user).await?))
}

async fn update_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<Product> {
    Ok(ok(state.product_service.update(&user, id, input).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.product_service.delete(&user, id).await?;
    Ok(ok_empty())
}

async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<ModerationListQuery>,
) -> ApiResult<PagedResult<Product>> {
    let filter = ProductFilter {
        search: query.search.clone(),
        status: query.status,
        ..Default::default()
    };
    Ok(ok(state.product_service.list_all(&filter, &query.params()).await?))
}

async fn admin_get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Product> {
    Ok(ok(state.product_service.get_by_id(id).await?))
}

/// Products carry no review note; `note` is ignored
async fn admin_moderate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<ModerationRequest>,
) -> ApiResult<Product> {
    Ok(ok(state.product_service.moderate(id, body.action).await?))
}
