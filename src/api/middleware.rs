//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The `{ ok, error, code }` error envelope
//! - Session authentication and admin authorization

use axum::{
    extract::{
        rejection::JsonRejection, ConnectInfo, FromRequest, FromRequestParts, OptionalFromRequestParts, Request,
        State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use validator::ValidationErrors;

use crate::cache::{create_cache, Cache};
use crate::config::Config;
use crate::db::repositories::{
    SqlxAppDataRepository, SqlxArticleRepository, SqlxCommentRepository, SqlxCommunityRepository,
    SqlxHubCategoryRepository, SqlxHubRepository, SqlxLegalPageRepository, SqlxPartnerRepository,
    SqlxPasswordResetRepository, SqlxProductRepository, SqlxSessionRepository, SqlxSocialMediaRepository,
    SqlxTalentRepository, SqlxUserRepository,
};
use crate::db::DbPool;
use crate::models::User;
use crate::services::{
    ArticleService, AuthSettings, CaptchaService, CommentService, CommunityService, DashboardService,
    EmailService, HubService, LoginRateLimiter, MarkdownRenderer, ProductService, ServiceError,
    SiteContentService, TalentService, UploadError, UploadService, UserService, UserServiceError,
};
use crate::theme::ThemeEngine;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub cache: Arc<Cache>,
    pub user_service: Arc<UserService>,
    pub talent_service: Arc<TalentService>,
    pub community_service: Arc<CommunityService>,
    pub article_service: Arc<ArticleService>,
    pub comment_service: Arc<CommentService>,
    pub product_service: Arc<ProductService>,
    pub hub_service: Arc<HubService>,
    pub site_service: Arc<SiteContentService>,
    pub dashboard_service: Arc<DashboardService>,
    pub upload_service: Arc<UploadService>,
    pub captcha_service: Arc<CaptchaService>,
    pub theme: Arc<ThemeEngine>,
}

impl AppState {
    /// Wire repositories and services on top of a migrated pool
    pub fn build(pool: DbPool, config: Config) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);
        let markdown = MarkdownRenderer::new();

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let talent_repo = SqlxTalentRepository::boxed(pool.clone());
        let community_repo = SqlxCommunityRepository::boxed(pool.clone());
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let product_repo = SqlxProductRepository::boxed(pool.clone());
        let hub_repo = SqlxHubRepository::boxed(pool.clone());

        let captcha_service = Arc::new(CaptchaService::new(config.captcha.clone()));
        let email_service = Arc::new(EmailService::new(config.mail.clone()));

        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            captcha_service.clone(),
            email_service,
            Arc::new(LoginRateLimiter::new()),
            AuthSettings::from_config(&config),
        ));
        let talent_service = Arc::new(TalentService::new(talent_repo.clone(), product_repo.clone(), cache.clone()));
        let community_service = Arc::new(CommunityService::new(
            community_repo.clone(),
            article_repo.clone(),
            cache.clone(),
        ));
        let article_service = Arc::new(ArticleService::new(
            article_repo.clone(),
            community_repo.clone(),
            cache.clone(),
            markdown.clone(),
        ));
        let comment_service = Arc::new(CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            article_repo.clone(),
            cache.clone(),
        ));
        let product_service = Arc::new(ProductService::new(product_repo.clone(), talent_repo.clone(), cache.clone()));
        let hub_service = Arc::new(HubService::new(
            SqlxHubCategoryRepository::boxed(pool.clone()),
            hub_repo.clone(),
            cache.clone(),
        ));
        let site_service = Arc::new(SiteContentService::new(
            SqlxAppDataRepository::boxed(pool.clone()),
            SqlxPartnerRepository::boxed(pool.clone()),
            SqlxSocialMediaRepository::boxed(pool.clone()),
            SqlxLegalPageRepository::boxed(pool.clone()),
            cache.clone(),
            markdown,
        ));
        let dashboard_service = Arc::new(DashboardService::new(
            user_repo,
            talent_repo,
            community_repo,
            product_repo,
            article_repo,
            hub_repo,
        ));
        let upload_service = Arc::new(UploadService::new(config.upload.clone()));
        let theme = Arc::new(ThemeEngine::new(&config.theme.path, &config.theme.active)?);

        Ok(Self {
            pool,
            config: Arc::new(config),
            cache,
            user_service,
            talent_service,
            community_service,
            article_service,
            comment_service,
            product_service,
            hub_service,
            site_service,
            dashboard_service,
            upload_service,
            captcha_service,
            theme,
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// `Option<AuthenticatedUser>` for routes behind [`optional_auth`]
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}

/// JSON body extractor whose rejection uses the error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

// ============================================================================
// Error envelope
// ============================================================================

/// Error returned by every API handler
#[derive(Debug)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    error: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMIT", message)
    }

    /// The cause is logged; clients only see a generic message
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn invalid_fields(errors: &ValidationErrors) -> Self {
        Self::with_details("VALIDATION_ERROR", "Invalid input", field_details(errors))
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "USER_BANNED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{ field: [message, ...] }`
fn field_details(errors: &ValidationErrors) -> serde_json::Value {
    let fields = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), serde_json::json!(messages))
        })
        .collect();
    serde_json::Value::Object(fields)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: &self.message,
            code: &self.code,
            details: self.details.as_ref(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            ServiceError::Validation(msg) => ApiError::validation_error(msg),
            ServiceError::InvalidFields(errors) => ApiError::invalid_fields(&errors),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Internal(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::UserBanned => ApiError::new("USER_BANNED", err.to_string()),
            UserServiceError::RateLimited => ApiError::with_details(
                "RATE_LIMIT",
                err.to_string(),
                serde_json::json!({ "retry_after": 900 }),
            ),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::InvalidFields(errors) => ApiError::invalid_fields(&errors),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound => ApiError::not_found(err.to_string()),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        if err.is_client_error() {
            ApiError::validation_error(err.to_string())
        } else {
            ApiError::internal_error(err)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Session token from `Authorization: Bearer` or the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header
        .split(';')
        .filter_map(|c| c.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// Client address used for rate limiting.
///
/// Forwarding headers are honoured only when `trust_proxy` is set; the
/// right-most `X-Forwarded-For` hop is the one our proxy appended, so
/// client-supplied entries to its left are ignored. Otherwise the TCP
/// peer address is used.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> Option<IpAddr> {
    if !trust_proxy {
        return peer;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.rsplit(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .and_then(|ip| ip.trim().parse().ok())
        })
        .or(peer)
}

/// Client address extractor, see [`client_ip`]
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(client_ip(&parts.headers, peer, state.config.server.trust_proxy)))
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Attach the user when a valid session is present, never reject
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        if let Ok(Some(user)) = state.user_service.validate_session(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}
