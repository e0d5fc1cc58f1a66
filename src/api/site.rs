//! Site content API endpoints
//!
//! Public reads of the AppData groups, partners, social links and legal
//! pages; admin writes under `/admin`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::common::{ok, ok_empty, ApiOk, ApiResult};
use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::models::{
    AboutContent, AppData, Branding, ContactInfo, HeroContent, LegalPage, LegalPageInput, OrderItem, Partner,
    PartnerInput, SiteInfo, SocialMedia, SocialMediaInput,
};

/// Mounted at `/site`
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_app_data))
        .route("/partners", get(list_partners))
        .route("/socials", get(list_socials))
        .route("/legal", get(list_legal_pages))
        .route("/legal/{slug}", get(get_legal_page))
}

/// Mounted at `/admin`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/site/site", put(update_site))
        .route("/site/hero", put(update_hero))
        .route("/site/about", put(update_about))
        .route("/site/branding", put(update_branding))
        .route("/site/contact", put(update_contact))
        .route("/partners", get(list_partners).post(create_partner))
        .route("/partners/order", put(reorder_partners))
        .route("/partners/{id}", put(update_partner).delete(delete_partner))
        .route("/socials", get(list_socials).post(create_social))
        .route("/socials/order", put(reorder_socials))
        .route("/socials/{id}", put(update_social).delete(delete_social))
        .route("/legal", get(list_legal_pages).post(create_legal_page))
        .route("/legal/{id}", put(update_legal_page).delete(delete_legal_page))
}

type Created<T> = Result<(StatusCode, Json<ApiOk<T>>), ApiError>;

// ============================================================================
// AppData
// ============================================================================

async fn get_app_data(State(state): State<AppState>) -> ApiResult<AppData> {
    Ok(ok(state.site_service.get_app_data().await?))
}

async fn update_site(State(state): State<AppState>, ApiJson(body): ApiJson<SiteInfo>) -> ApiResult<AppData> {
    Ok(ok(state.site_service.update_site(body).await?))
}

async fn update_hero(State(state): State<AppState>, ApiJson(body): ApiJson<HeroContent>) -> ApiResult<AppData> {
    Ok(ok(state.site_service.update_hero(body).await?))
}

async fn update_about(State(state): State<AppState>, ApiJson(body): ApiJson<AboutContent>) -> ApiResult<AppData> {
    Ok(ok(state.site_service.update_about(body).await?))
}

async fn update_branding(State(state): State<AppState>, ApiJson(body): ApiJson<Branding>) -> ApiResult<AppData> {
    Ok(ok(state.site_service.update_branding(body).await?))
}

async fn update_contact(State(state): State<AppState>, ApiJson(body): ApiJson<ContactInfo>) -> ApiResult<AppData> {
    Ok(ok(state.site_service.update_contact(body).await?))
}

// ============================================================================
// Partners
// ============================================================================

async fn list_partners(State(state): State<AppState>) -> ApiResult<Vec<Partner>> {
    Ok(ok(state.site_service.list_partners().await?))
}

async fn create_partner(State(state): State<AppState>, ApiJson(input): ApiJson<PartnerInput>) -> Created<Partner> {
    let partner = state.site_service.create_partner(input).await?;
    Ok((StatusCode::CREATED, ok(partner)))
}

async fn update_partner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<PartnerInput>,
) -> ApiResult<Partner> {
    Ok(ok(state.site_service.update_partner(id, input).await?))
}

async fn delete_partner(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.site_service.delete_partner(id).await?;
    Ok(ok_empty())
}

async fn reorder_partners(
    State(state): State<AppState>,
    ApiJson(order): ApiJson<Vec<OrderItem>>,
) -> ApiResult<Vec<Partner>> {
    Ok(ok(state.site_service.reorder_partners(&order).await?))
}

// ============================================================================
// Social media
// ============================================================================

async fn list_socials(State(state): State<AppState>) -> ApiResult<Vec<SocialMedia>> {
    Ok(ok(state.site_service.list_socials().await?))
}

async fn create_social(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SocialMediaInput>,
) -> Created<SocialMedia> {
    let social = state.site_service.create_social(input).await?;
    Ok((StatusCode::CREATED, ok(social)))
}

async fn update_social(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<SocialMediaInput>,
) -> ApiResult<SocialMedia> {
    Ok(ok(state.site_service.update_social(id, input).await?))
}

async fn delete_social(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.site_service.delete_social(id).await?;
    Ok(ok_empty())
}

async fn reorder_socials(
    State(state): State<AppState>,
    ApiJson(order): ApiJson<Vec<OrderItem>>,
) -> ApiResult<Vec<SocialMedia>> {
    Ok(ok(state.site_service.reorder_socials(&order).await?))
}

// ============================================================================
// Legal pages
// ============================================================================

async fn list_legal_pages(State(state): State<AppState>) -> ApiResult<Vec<LegalPage>> {
    Ok(ok(state.site_service.list_legal_pages().await?))
}

async fn get_legal_page(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<LegalPage> {
    Ok(ok(state.site_service.get_legal_page(&slug).await?))
}

async fn create_legal_page(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LegalPageInput>,
) -> Created<LegalPage> {
    let page = state.site_service.create_legal_page(input).await?;
    Ok((StatusCode::CREATED, ok(page)))
}

async fn update_legal_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<LegalPageInput>,
) -> ApiResult<LegalPage> {
    Ok(ok(state.site_service.update_legal_page(id, input).await?))
}

async fn delete_legal_page(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.site_service.delete_legal_page(id).await?;
    Ok(ok_empty())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{register, test_server};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_app_data_defaults_and_update() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;

        let before: Value = server.get("/api/v1/site").await.json();
        assert!(before["data"]["site"]["name"].is_string());

        let hero = json!({
            "title": "Bergerak Bersama",
            "subtitle": "Ruang kolaborasi pemuda",
            "image": "",
            "cta_label": "Gabung",
            "cta_link": "/komunitas"
        });
        server
            .put("/api/v1/admin/site/hero")
            .authorization_bearer(&admin)
            .json(&hero)
            .await
            .assert_status_ok();

        let after: Value = server.get("/api/v1/site").await.json();
        assert_eq!(after["data"]["hero"]["title"], "Bergerak Bersama");
        assert_eq!(after["data"]["hero"]["cta_link"], "/komunitas");
    }

    #[tokio::test]
    async fn test_partner_ordering() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;

        let mut ids = Vec::new();
        for name in ["Pemkot", "Kampus", "Koperasi"] {
            let partner: Value = server
                .post("/api/v1/admin/partners")
                .authorization_bearer(&admin)
                .json(&json!({ "name": name }))
                .await
                .json();
            ids.push(partner["data"]["id"].as_i64().unwrap());
        }

        let order: Vec<Value> = ids
            .iter()
            .rev()
            .enumerate()
            .map(|(i, id)| json!({ "id": id, "sort_order": i }))
            .collect();
        server
            .put("/api/v1/admin/partners/order")
            .authorization_bearer(&admin)
            .json(&order)
            .await
            .assert_status_ok();

        let listed: Value = server.get("/api/v1/site/partners").await.json();
        let names: Vec<&str> = listed["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Koperasi", "Kampus", "Pemkot"]);
    }

    #[tokio::test]
    async fn test_legal_page_rendered() {
        let (server, _state, _scratch) = test_server().await;
        let admin = register(&server, "admin").await;

        server
            .post("/api/v1/admin/legal")
            .authorization_bearer(&admin)
            .json(&json!({ "title": "Kebijakan Privasi", "content": "# Privasi\n\nData aman." }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let page: Value = server.get("/api/v1/site/legal/kebijakan-privasi").await.json();
        assert!(page["data"]["content_html"].as_str().unwrap().contains("<h1>Privasi</h1>"));

        server.get("/api/v1/site/legal/tidak-ada").await.assert_status_not_found();
    }
}
