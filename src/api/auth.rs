//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Register (first user becomes admin)
//! - POST /api/v1/auth/login - Login, sets the session cookie
//! - POST /api/v1/auth/logout - Logout, clears the session cookie
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update name and avatar
//! - PUT /api/v1/auth/password - Change password
//! - POST /api/v1/auth/forgot-password - Email a reset link
//! - POST /api/v1/auth/reset-password - Consume a reset token
//! - GET /api/v1/auth/captcha - Public CAPTCHA settings for the login forms

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{ok, ok_empty, ApiResult};
use crate::api::middleware::{
    extract_session_token, ApiError, ApiJson, AppState, AuthenticatedUser, ClientIp, SESSION_COOKIE,
};
use crate::models::{Session, UpdateProfileInput, User};
use crate::services::user::{ChangePasswordInput, ForgotPasswordInput, ResetPasswordInput};
use crate::services::{LoginInput, RegisterInput};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CaptchaSettings {
    pub enabled: bool,
    pub site_key: String,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/captcha", get(captcha_settings))
}

fn session_cookie(session: &Session, days: i64) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.id,
        days * 24 * 60 * 60
    );
    HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)
}

fn authenticated(
    state: &AppState,
    status: StatusCode,
    user: User,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&session, state.user_service.session_days())?,
    );

    Ok((
        status,
        headers,
        ok(AuthResponse {
            user,
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = state.user_service.register(body, ip).await?;
    authenticated(&state, StatusCode::CREATED, user, session)
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = state.user_service.login(body, ip).await?;
    authenticated(&state, StatusCode::OK, user, session)
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let clear_cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear_cookie).map_err(ApiError::internal_error)?,
    );

    Ok((response_headers, ok_empty()))
}

/// GET /api/v1/auth/me
async fn get_current_user(AuthenticatedUser(user): AuthenticatedUser) -> ApiResult<User> {
    Ok(ok(user))
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> ApiResult<User> {
    let input = UpdateProfileInput {
        name: body.name,
        avatar: body.avatar,
    };
    Ok(ok(state.user_service.update_profile(&user, input).await?))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<ChangePasswordInput>,
) -> ApiResult<()> {
    state.user_service.change_password(&user, body).await?;
    Ok(ok_empty())
}

/// POST /api/v1/auth/forgot-password
///
/// Answers ok whether or not the email is registered.
async fn forgot_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<ForgotPasswordInput>,
) -> ApiResult<()> {
    state.user_service.forgot_password(body, ip).await?;
    Ok(ok_empty())
}

/// POST /api/v1/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordInput>,
) -> ApiResult<()> {
    state.user_service.reset_password(body).await?;
    Ok(ok_empty())
}

/// GET /api/v1/auth/captcha
async fn captcha_settings(State(state): State<AppState>) -> ApiResult<CaptchaSettings> {
    Ok(ok(CaptchaSettings {
        enabled: state.captcha_service.is_enabled(),
        site_key: state.captcha_service.site_key().to_string(),
    }))
}
