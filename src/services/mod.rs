//! Services layer - Business logic
//!
//! Services sit between the HTTP layer and the repositories. They:
//! - enforce ownership, role and status rules
//! - validate input structs
//! - keep the tagged cache in step with every mutation

pub mod article;
pub mod captcha;
pub mod comment;
pub mod community;
pub mod dashboard;
pub mod email;
pub mod error;
pub mod hub;
pub mod markdown;
pub mod moderation;
pub mod password;
pub mod product;
pub mod rate_limiter;
pub mod site_content;
pub mod slug;
pub mod talent;
pub mod upload;
pub mod user;

pub use article::{ArticleQuery, ArticleService, LatestArticles};
pub use captcha::{CaptchaError, CaptchaService};
pub use comment::CommentService;
pub use community::{CommunityDetail, CommunityService};
pub use dashboard::DashboardService;
pub use email::EmailService;
pub use error::{ServiceError, ServiceResult};
pub use hub::HubService;
pub use markdown::MarkdownRenderer;
pub use moderation::ModerationAction;
pub use password::{hash_password, verify_password};
pub use product::ProductService;
pub use rate_limiter::LoginRateLimiter;
pub use site_content::SiteContentService;
pub use talent::{TalentDetail, TalentService};
pub use upload::{UploadError, UploadService, UploadedImage};
pub use user::{AuthSettings, LoginInput, RegisterInput, UserService, UserServiceError};

/// Trimmed value, or `None` when blank
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
