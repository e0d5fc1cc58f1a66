//! User service
//!
//! Registration (first user becomes admin), login with rate limiting and
//! CAPTCHA, session validation, password reset by email, profile changes and
//! the admin-side user management.

use crate::config::Config;
use crate::db::repositories::{PasswordResetRepository, SessionRepository, UserRepository};
use crate::models::{
    validate_username, ListParams, PagedResult, PasswordReset, Session, UpdateProfileInput, User,
    UserFilter, UserRole, UserStatus,
};
use crate::services::captcha::{CaptchaError, CaptchaService};
use crate::services::email::{password_reset_email, EmailService};
use crate::services::password::{generate_token, hash_password, hash_token, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Wrong credentials. The message never says which part was wrong.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Your account has been banned. Please contact the administrator.")]
    UserBanned,

    #[error("Too many login attempts, please try again later")]
    RateLimited,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input")]
    InvalidFields(ValidationErrors),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationErrors> for UserServiceError {
    fn from(errors: ValidationErrors) -> Self {
        UserServiceError::InvalidFields(errors)
    }
}

impl From<CaptchaError> for UserServiceError {
    fn from(error: CaptchaError) -> Self {
        match error {
            CaptchaError::Unavailable(msg) => {
                UserServiceError::InternalError(anyhow::anyhow!("CAPTCHA service unavailable: {}", msg))
            }
            other => UserServiceError::ValidationError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 100))]
    pub name: Option<String>,
    pub captcha_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub username_or_email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub captcha_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordInput {
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    pub captcha_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordInput {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Knobs the user service reads from configuration
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_days: i64,
    pub reset_token_minutes: i64,
    /// Public origin used to build reset links
    pub base_url: String,
    pub site_name: String,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_days: config.auth.session_days,
            reset_token_minutes: config.auth.reset_token_minutes,
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
            site_name: config.mail.from_name.clone(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Service for users, sessions and password resets
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    captcha: Arc<CaptchaService>,
    email: Arc<EmailService>,
    rate_limiter: Arc<LoginRateLimiter>,
    settings: AuthSettings,
}

impl UserService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        captcha: Arc<CaptchaService>,
        email: Arc<EmailService>,
        rate_limiter: Arc<LoginRateLimiter>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
            captcha,
            email,
            rate_limiter,
            settings,
        }
    }

    pub fn session_days(&self) -> i64 {
        self.settings.session_days
    }

    pub fn rate_limiter(&self) -> &Arc<LoginRateLimiter> {
        &self.rate_limiter
    }

    /// Register a new account and log it in.
    ///
    /// The very first account becomes admin.
    pub async fn register(
        &self,
        input: RegisterInput,
        remote_ip: Option<IpAddr>,
    ) -> Result<(User, Session), UserServiceError> {
        input.validate()?;
        self.verify_captcha(input.captcha_token.as_deref(), remote_ip).await?;

        let email = input.email.trim().to_lowercase();

        if self.user_repo.get_by_username(&input.username).await?.is_some() {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }
        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(UserServiceError::UserExists(format!("Email '{}' is already registered", email)));
        }

        let role = if self.user_repo.count().await? == 0 {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(input.username, email, password_hash, role);
        user.name = input.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let created = self.user_repo.create(&user).await.context("Failed to create user")?;
        tracing::info!(user_id = created.id, role = %created.role, "User registered");

        let session = self.create_session(created.id).await?;
        Ok((created, session))
    }

    /// Check credentials and open a session.
    pub async fn login(
        &self,
        input: LoginInput,
        remote_ip: Option<IpAddr>,
    ) -> Result<(User, Session), UserServiceError> {
        if let Some(ip) = remote_ip {
            if self.rate_limiter.is_ip_limited(ip).await {
                tracing::warn!(%ip, "Login rate limited by IP");
                return Err(UserServiceError::RateLimited);
            }
            self.rate_limiter.record_ip_request(ip).await;
        }

        input.validate()?;
        self.verify_captcha(input.captcha_token.as_deref(), remote_ip).await?;

        let identifier = input.username_or_email.trim();
        if self.rate_limiter.is_username_limited(identifier).await {
            tracing::warn!(identifier, "Login rate limited by username");
            return Err(UserServiceError::RateLimited);
        }

        let user = match self.find_user_by_username_or_email(identifier).await? {
            Some(user) if verify_password(&input.password, &user.password_hash)? => user,
            _ => {
                self.rate_limiter.record_failed_attempt(identifier).await;
                return Err(UserServiceError::AuthenticationError(
                    "Invalid username or password".to_string(),
                ));
            }
        };

        if user.is_banned() {
            return Err(UserServiceError::UserBanned);
        }

        self.rate_limiter.clear_username_attempts(identifier).await;
        let session = self.create_session(user.id).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, session))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a session token, if the session is live and the user
    /// is not banned.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self.session_repo.get_by_id(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo.delete(token).await?;
            return Ok(None);
        }

        match self.user_repo.get_by_id(session.user_id).await? {
            Some(user) if !user.is_banned() => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await?)
    }

    pub async fn update_profile(
        &self,
        user: &User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        input.validate()?;

        let name = input.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let mut updated = user.clone();
        updated.name = name;
        updated.avatar = input.avatar.filter(|a| !a.trim().is_empty());
        Ok(self.user_repo.update(&updated).await?)
    }

    pub async fn change_password(
        &self,
        user: &User,
        input: ChangePasswordInput,
    ) -> Result<(), UserServiceError> {
        input.validate()?;

        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(UserServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }

        let hash = hash_password(&input.new_password)?;
        self.user_repo.update_password(user.id, &hash).await?;
        Ok(())
    }

    /// Start a password reset.
    ///
    /// Always succeeds for a well-formed request so callers cannot probe
    /// which emails are registered.
    pub async fn forgot_password(
        &self,
        input: ForgotPasswordInput,
        remote_ip: Option<IpAddr>,
    ) -> Result<(), UserServiceError> {
        input.validate()?;
        self.verify_captcha(input.captcha_token.as_deref(), remote_ip).await?;

        let Some(user) = self.user_repo.get_by_email(input.email.trim()).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };
        if user.is_banned() {
            return Ok(());
        }

        let token = self.issue_reset_token(user.id).await?;
        let link = format!("{}/reset-password?token={}", self.settings.base_url, token);
        let email = password_reset_email(
            &user.email,
            &self.settings.site_name,
            &link,
            self.settings.reset_token_minutes,
        );

        if let Err(e) = self.email.send(&email).await {
            tracing::error!("Failed to send password reset email: {:#}", e);
        }
        Ok(())
    }

    /// Consume a reset token and set a new password. All sessions of the
    /// user are revoked.
    pub async fn reset_password(&self, input: ResetPasswordInput) -> Result<(), UserServiceError> {
        input.validate()?;

        let invalid = || UserServiceError::ValidationError("Reset link is invalid or has expired".to_string());

        let reset = self
            .reset_repo
            .get_by_token_hash(&hash_token(input.token.trim()))
            .await?
            .ok_or_else(invalid)?;

        if reset.is_expired() {
            self.reset_repo.delete_by_user(reset.user_id).await?;
            return Err(invalid());
        }

        let hash = hash_password(&input.password)?;
        self.user_repo.update_password(reset.user_id, &hash).await?;
        self.reset_repo.delete_by_user(reset.user_id).await?;
        let revoked = self.session_repo.delete_by_user(reset.user_id).await?;

        tracing::info!(user_id = reset.user_id, revoked, "Password reset completed");
        Ok(())
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let (items, total) = self.user_repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn set_role(&self, actor: &User, id: i64, role: UserRole) -> Result<User, UserServiceError> {
        if actor.id == id && role != UserRole::Admin {
            return Err(UserServiceError::Forbidden("You cannot demote yourself".to_string()));
        }

        let mut user = self.user_repo.get_by_id(id).await?.ok_or(UserServiceError::NotFound)?;
        user.role = role;
        let updated = self.user_repo.update(&user).await?;
        tracing::info!(admin_id = actor.id, user_id = id, %role, "User role changed");
        Ok(updated)
    }

    /// Ban a user and revoke every session they hold
    pub async fn ban_user(&self, actor: &User, id: i64) -> Result<User, UserServiceError> {
        if actor.id == id {
            return Err(UserServiceError::Forbidden("You cannot ban yourself".to_string()));
        }

        let updated = self.set_status(id, UserStatus::Banned).await?;
        self.session_repo.delete_by_user(id).await?;
        tracing::info!(admin_id = actor.id, user_id = id, "User banned");
        Ok(updated)
    }

    pub async fn unban_user(&self, actor: &User, id: i64) -> Result<User, UserServiceError> {
        let updated = self.set_status(id, UserStatus::Active).await?;
        tracing::info!(admin_id = actor.id, user_id = id, "User unbanned");
        Ok(updated)
    }

    /// Purge expired sessions and reset tokens
    pub async fn cleanup_expired(&self) -> Result<(u64, u64), UserServiceError> {
        let sessions = self.session_repo.delete_expired().await?;
        let resets = self.reset_repo.delete_expired().await?;
        Ok((sessions, resets))
    }

    async fn set_status(&self, id: i64, status: UserStatus) -> Result<User, UserServiceError> {
        let mut user = self.user_repo.get_by_id(id).await?.ok_or(UserServiceError::NotFound)?;
        user.status = status;
        Ok(self.user_repo.update(&user).await?)
    }

    async fn verify_captcha(&self, token: Option<&str>, remote_ip: Option<IpAddr>) -> Result<(), UserServiceError> {
        let ip = remote_ip.map(|ip| ip.to_string());
        self.captcha.verify(token, ip.as_deref()).await?;
        Ok(())
    }

    async fn find_user_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, UserServiceError> {
        let user = if identifier.contains('@') {
            self.user_repo.get_by_email(identifier).await?
        } else {
            self.user_repo.get_by_username(&identifier.to_lowercase()).await?
        };
        Ok(user)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            user_id,
            expires_at: now + Duration::days(self.settings.session_days),
            created_at: now,
        };
        Ok(self.session_repo.create(&session).await.context("Failed to create session")?)
    }

    /// Replace any outstanding reset token with a fresh one; returns the raw token
    async fn issue_reset_token(&self, user_id: i64) -> Result<String, UserServiceError> {
        self.reset_repo.delete_by_user(user_id).await?;

        let token = generate_token();
        let now = Utc::now();
        let reset = PasswordReset {
            id: 0,
            user_id,
            token_hash: hash_token(&token),
            expires_at: now + Duration::minutes(self.settings.reset_token_minutes),
            created_at: now,
        };
        self.reset_repo.create(&reset).await?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptchaConfig, MailConfig};
    use crate::db::migrated_test_pool;
    use crate::db::repositories::{SqlxPasswordResetRepository, SqlxSessionRepository, SqlxUserRepository};

    struct Fixture {
        service: UserService,
        resets: Arc<dyn PasswordResetRepository>,
        sessions: Arc<dyn SessionRepository>,
    }

    async fn fixture() -> Fixture {
        let pool = migrated_test_pool().await;
        let resets = SqlxPasswordResetRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(
            SqlxUserRepository::boxed(pool),
            sessions.clone(),
            resets.clone(),
            Arc::new(CaptchaService::new(CaptchaConfig::default())),
            Arc::new(EmailService::new(MailConfig::default())),
            Arc::new(LoginRateLimiter::new()),
            AuthSettings::default(),
        );
        Fixture {
            service,
            resets,
            sessions,
        }
    }

    fn register_input(username: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "kata_sandi_123".to_string(),
            name: None,
            captcha_token: None,
        }
    }

    fn login_input(identifier: &str, password: &str) -> LoginInput {
        LoginInput {
            username_or_email: identifier.to_string(),
            password: password.to_string(),
            captcha_token: None,
        }
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let f = fixture().await;
        let (first, _) = f.service.register(register_input("pertama"), None).await.unwrap();
        let (second, _) = f.service.register(register_input("kedua"), None).await.unwrap();

        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let f = fixture().await;
        f.service.register(register_input("budi"), None).await.unwrap();

        let dup = f.service.register(register_input("budi"), None).await;
        assert!(matches!(dup, Err(UserServiceError::UserExists(_))));

        let mut same_email = register_input("budi2");
        same_email.email = "BUDI@example.com".into();
        assert!(matches!(
            f.service.register(same_email, None).await,
            Err(UserServiceError::UserExists(_))
        ));

        let mut bad = register_input("Budi Besar");
        bad.password = "short".into();
        match f.service.register(bad, None).await {
            Err(UserServiceError::InvalidFields(errors)) => {
                let fields = errors.field_errors();
                assert!(fields.contains_key("username"));
                assert!(fields.contains_key("password"));
            }
            other => panic!("expected field errors, got {:?}", other.map(|(u, _)| u.id)),
        }
    }

    #[tokio::test]
    async fn test_login_and_session_validation() {
        let f = fixture().await;
        f.service.register(register_input("sari"), None).await.unwrap();

        let (user, session) = f.service.login(login_input("sari", "kata_sandi_123"), None).await.unwrap();
        let found = f.service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let (_, by_email) = f
            .service
            .login(login_input("sari@example.com", "kata_sandi_123"), None)
            .await
            .unwrap();
        assert!(f.service.validate_session(&by_email.id).await.unwrap().is_some());

        f.service.logout(&session.id).await.unwrap();
        assert!(f.service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_is_rate_limited() {
        let f = fixture().await;
        f.service.register(register_input("andi"), None).await.unwrap();

        for _ in 0..5 {
            let result = f.service.login(login_input("andi", "salah_total"), None).await;
            assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
        }

        let limited = f.service.login(login_input("andi", "kata_sandi_123"), None).await;
        assert!(matches!(limited, Err(UserServiceError::RateLimited)));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_login_and_loses_sessions() {
        let f = fixture().await;
        let (admin, _) = f.service.register(register_input("admin"), None).await.unwrap();
        let (member, session) = f.service.register(register_input("anggota"), None).await.unwrap();

        f.service.ban_user(&admin, member.id).await.unwrap();

        assert!(f.service.validate_session(&session.id).await.unwrap().is_none());
        assert!(f.sessions.get_by_id(&session.id).await.unwrap().is_none());
        let result = f.service.login(login_input("anggota", "kata_sandi_123"), None).await;
        assert!(matches!(result, Err(UserServiceError::UserBanned)));

        f.service.unban_user(&admin, member.id).await.unwrap();
        assert!(f.service.login(login_input("anggota", "kata_sandi_123"), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_cannot_ban_or_demote_self() {
        let f = fixture().await;
        let (admin, _) = f.service.register(register_input("admin"), None).await.unwrap();

        assert!(matches!(
            f.service.ban_user(&admin, admin.id).await,
            Err(UserServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.set_role(&admin, admin.id, UserRole::User).await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let f = fixture().await;
        let (user, session) = f.service.register(register_input("dewi"), None).await.unwrap();

        // Unknown emails answer ok as well
        f.service
            .forgot_password(
                ForgotPasswordInput {
                    email: "tidak.ada@example.com".into(),
                    captcha_token: None,
                },
                None,
            )
            .await
            .unwrap();

        let token = f.service.issue_reset_token(user.id).await.unwrap();
        assert!(f.resets.get_by_token_hash(&hash_token(&token)).await.unwrap().is_some());

        f.service
            .reset_password(ResetPasswordInput {
                token: token.clone(),
                password: "sandi_baru_456".into(),
            })
            .await
            .unwrap();

        // Token is single use and old sessions are gone
        let reuse = f
            .service
            .reset_password(ResetPasswordInput {
                token,
                password: "sandi_lain_789".into(),
            })
            .await;
        assert!(matches!(reuse, Err(UserServiceError::ValidationError(_))));
        assert!(f.service.validate_session(&session.id).await.unwrap().is_none());

        assert!(f.service.login(login_input("dewi", "sandi_baru_456"), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_forgot_password_replaces_previous_token() {
        let f = fixture().await;
        let (user, _) = f.service.register(register_input("rina"), None).await.unwrap();

        let first = f.service.issue_reset_token(user.id).await.unwrap();
        let second = f.service.issue_reset_token(user.id).await.unwrap();

        assert!(f.resets.get_by_token_hash(&hash_token(&first)).await.unwrap().is_none());
        assert!(f.resets.get_by_token_hash(&hash_token(&second)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let f = fixture().await;
        let (user, _) = f.service.register(register_input("joko"), None).await.unwrap();

        let wrong = f
            .service
            .change_password(
                &user,
                ChangePasswordInput {
                    current_password: "bukan_ini".into(),
                    new_password: "sandi_baru_456".into(),
                },
            )
            .await;
        assert!(matches!(wrong, Err(UserServiceError::ValidationError(_))));

        f.service
            .change_password(
                &user,
                ChangePasswordInput {
                    current_password: "kata_sandi_123".into(),
                    new_password: "sandi_baru_456".into(),
                },
            )
            .await
            .unwrap();
        assert!(f.service.login(login_input("joko", "sandi_baru_456"), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let f = fixture().await;
        let (user, _) = f.service.register(register_input("tono"), None).await.unwrap();

        let updated = f
            .service
            .update_profile(
                &user,
                UpdateProfileInput {
                    name: Some("  Tono Sugiarto ".into()),
                    avatar: Some("/uploads/a.png".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Tono Sugiarto"));
        assert_eq!(updated.display_name(), "Tono Sugiarto");

        let too_long = f
            .service
            .update_profile(
                &user,
                UpdateProfileInput {
                    name: Some("x".repeat(101)),
                    avatar: None,
                },
            )
            .await;
        assert!(matches!(too_long, Err(UserServiceError::InvalidFields(ref e)) if e.field_errors().contains_key("name")));

        let bad_avatar = f
            .service
            .update_profile(
                &user,
                UpdateProfileInput {
                    name: None,
                    avatar: Some("javascript:alert(1)".into()),
                },
            )
            .await;
        assert!(matches!(bad_avatar, Err(UserServiceError::InvalidFields(ref e)) if e.field_errors().contains_key("avatar")));
    }
}
