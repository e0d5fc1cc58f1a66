//! Public HTML pages rendered through the theme engine
//!
//! Reads only; every write goes through the JSON API. A missing record
//! renders `404.html` with status 404, other failures render `error.html`.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::common::{default_page, default_per_page};
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{ArticleChannel, ListParams};
use crate::services::{ArticleQuery, MarkdownRenderer, ServiceError};
use crate::theme::PageVars;

/// Items on the home page strips
const HOME_STRIP: u32 = 6;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub search: Option<String>,
    pub profession: Option<String>,
    /// Zhub category slug
    pub category: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

impl PageQuery {
    fn params(&self) -> ListParams {
        ListParams::new(self.page, default_per_page())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/gerak", get(gerak))
        .route("/detak", get(detak))
        .route("/dampak", get(dampak))
        .route("/artikel/{slug}", get(article))
        .route("/talenta", get(talents))
        .route("/talenta/{slug}", get(talent))
        .route("/komunitas", get(communities))
        .route("/komunitas/{slug}", get(community))
        .route("/produk", get(products))
        .route("/zhub", get(zhub))
        .route("/legal/{slug}", get(legal))
        .fallback(not_found)
}

/// What a handler hands back for rendering
struct Page {
    template: &'static str,
    context: TeraContext,
}

impl Page {
    fn new(template: &'static str) -> Self {
        Self {
            template,
            context: TeraContext::new(),
        }
    }

    fn with<T: serde::Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        self.context.insert(key, value);
        self
    }
}

type PageResult = Result<Page, ServiceError>;

/// Shared layout data. Falls back to defaults so a broken site table never
/// takes the public pages down.
async fn page_vars(state: &AppState, user: Option<&AuthenticatedUser>, uri: &Uri) -> PageVars {
    let app = state.site_service.get_app_data().await.unwrap_or_else(|e| {
        tracing::warn!("Failed to load app data for page: {}", e);
        Default::default()
    });
    let socials = state.site_service.list_socials().await.unwrap_or_else(|e| {
        tracing::warn!("Failed to load social links for page: {}", e);
        Vec::new()
    });
    PageVars::new(app, socials, uri.path()).with_user(user.map(|u| &u.0))
}

async fn respond(state: AppState, user: Option<AuthenticatedUser>, uri: Uri, result: PageResult) -> Response {
    let vars = page_vars(&state, user.as_ref(), &uri).await;

    let (status, page) = match result {
        Ok(page) => (StatusCode::OK, page),
        Err(ServiceError::NotFound(what)) => (
            StatusCode::NOT_FOUND,
            Page::new("404.html").with("message", &format!("{} tidak ditemukan.", what)),
        ),
        Err(e) => {
            tracing::error!(path = %uri.path(), "Page failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Page::new("error.html"))
        }
    };

    let html = state.theme.render_with_fallback(page.template, &page.context, &vars);
    (status, Html(html)).into_response()
}

async fn not_found(State(state): State<AppState>, user: Option<AuthenticatedUser>, uri: Uri) -> Response {
    let vars = page_vars(&state, user.as_ref(), &uri).await;
    let html = state.theme.render_with_fallback("404.html", &TeraContext::new(), &vars);
    (StatusCode::NOT_FOUND, Html(html)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn home(State(state): State<AppState>, user: Option<AuthenticatedUser>, uri: Uri) -> Response {
    let result = build_home(&state).await;
    respond(state, user, uri, result).await
}

async fn build_home(state: &AppState) -> PageResult {
    let strip = ListParams::new(1, HOME_STRIP);
    let app = state.site_service.get_app_data().await?;
    let latest = state.article_service.latest_per_channel().await?;
    let talents = state.talent_service.list_public(None, None, &strip).await?;
    let communities = state.community_service.list_public(None, &strip).await?;
    let partners = state.site_service.list_partners().await?;
    let about_html = MarkdownRenderer::new().render(&app.about.body);

    Ok(Page::new("index.html")
        .with("latest", &latest)
        .with("talents", &talents.items)
        .with("communities", &communities.items)
        .with("partners", &partners)
        .with("about_html", &about_html))
}

async fn gerak(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = build_channel(&state, ArticleChannel::Gerak, query).await;
    respond(state, user, uri, result).await
}

async fn detak(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = build_channel(&state, ArticleChannel::Detak, query).await;
    respond(state, user, uri, result).await
}

async fn dampak(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = build_channel(&state, ArticleChannel::Dampak, query).await;
    respond(state, user, uri, result).await
}

async fn build_channel(state: &AppState, channel: ArticleChannel, query: PageQuery) -> PageResult {
    let params = query.params();
    let filter = ArticleQuery {
        channel: Some(channel),
        community: None,
        search: query.search.clone(),
    };
    let articles = state.article_service.list_public(&filter, &params).await?;

    Ok(Page::new("articles.html")
        .with("channel", &channel)
        .with("channel_title", channel.title())
        .with("articles", &articles)
        .with("search", &query.search))
}

async fn article(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    let result = async {
        let article = state.article_service.get_public(&slug).await?;
        let comments = state.comment_service.list(&slug).await?;
        Ok::<_, ServiceError>(Page::new("article.html")
            .with("article", &article)
            .with("comments", &comments))
    }
    .await;
    respond(state, user, uri, result).await
}

async fn talents(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = async {
        let talents = state
            .talent_service
            .list_public(query.search.clone(), query.profession.clone(), &query.params())
            .await?;
        Ok::<_, ServiceError>(Page::new("talents.html")
            .with("talents", &talents)
            .with("search", &query.search)
            .with("profession", &query.profession))
    }
    .await;
    respond(state, user, uri, result).await
}

async fn talent(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    let result = async {
        let detail = state.talent_service.get_public(&slug).await?;
        Ok::<_, ServiceError>(Page::new("talent.html")
            .with("talent", &detail.talent)
            .with("products", &detail.products))
    }
    .await;
    respond(state, user, uri, result).await
}

async fn communities(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = async {
        let communities = state
            .community_service
            .list_public(query.search.clone(), &query.params())
            .await?;
        Ok::<_, ServiceError>(Page::new("communities.html")
            .with("communities", &communities)
            .with("search", &query.search))
    }
    .await;
    respond(state, user, uri, result).await
}

async fn community(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    let result = async {
        let detail = state.community_service.get_public(&slug).await?;
        Ok::<_, ServiceError>(Page::new("community.html")
            .with("community", &detail.community)
            .with("articles", &detail.articles))
    }
    .await;
    respond(state, user, uri, result).await
}

async fn products(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = async {
        let products = state
            .product_service
            .list_public(query.search.clone(), None, &query.params())
            .await?;
        Ok::<_, ServiceError>(Page::new("products.html")
            .with("products", &products)
            .with("search", &query.search))
    }
    .await;
    respond(state, user, uri, result).await
}

async fn zhub(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    let result = async {
        let categories = state.hub_service.list_categories().await?;
        let hubs = state
            .hub_service
            .list_public(query.category.clone(), query.search.clone(), &query.params())
            .await?;
        Ok::<_, ServiceError>(Page::new("zhub.html")
            .with("categories", &categories)
            .with("hubs", &hubs)
            .with("category", &query.category)
            .with("search", &query.search))
    }
    .await;
    respond(state, user, uri, result).await
}

async fn legal(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    let result = async {
        let page = state.site_service.get_legal_page(&slug).await?;
        Ok::<_, ServiceError>(Page::new("legal.html").with("page", &page))
    }
    .await;
    respond(state, user, uri, result).await
}
