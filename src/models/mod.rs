//! Data models
//!
//! Database entities, the input structs accepted by services (validated with
//! `validator`), listing filters and pagination types.

mod article;
mod comment;
mod community;
mod hub;
mod pagination;
mod product;
mod session;
mod site;
mod status;
mod talent;
mod user;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::ValidationError;

pub use article::{
    Article, ArticleChannel, ArticleFilter, ChannelCounts, CreateArticleInput, UpdateArticleInput,
};
pub use comment::{Comment, CreateCommentInput};
pub use community::{Community, CommunityFilter, CommunityInput};
pub use hub::{Hub, HubCategory, HubCategoryInput, HubFilter, HubInput};
pub use pagination::{ListParams, PagedResult};
pub use product::{Product, ProductFilter, ProductInput};
pub use session::{PasswordReset, Session};
pub use site::{
    AboutContent, AppData, AppDataGroup, Branding, ContactInfo, HeroContent, LegalPage,
    LegalPageInput, OrderItem, Partner, PartnerInput, SiteInfo, SocialMedia, SocialMediaInput,
};
pub use status::{ArticleStatus, HubStatus, ModerationStatus};
pub use talent::{Talent, TalentFilter, TalentInput};
pub use user::{UpdateProfileInput, User, UserFilter, UserRole, UserStatus};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{3,32}$").expect("username pattern is valid"));

static INSTAGRAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@?[A-Za-z0-9._]{1,30}$").expect("instagram pattern is valid"));

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("color pattern is valid"));

/// Usernames are 3-32 characters of `a-z`, `0-9` and `_`
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("username").with_message(
            "Username must be 3-32 characters of lowercase letters, digits or underscore".into(),
        ))
    }
}

pub(crate) fn validate_instagram(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || INSTAGRAM_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("instagram").with_message("Instagram handle is not valid".into()))
    }
}

pub(crate) fn validate_color(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || HEX_COLOR_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("color").with_message("Colors must look like #1a2b3c".into()))
    }
}

/// Uploaded files are referenced by their public path; remote ones by URL
pub(crate) fn validate_image_ref(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    let local = value.starts_with('/') && !value.starts_with("//");
    let remote = value.starts_with("https://") || value.starts_with("http://");
    if value.is_empty() || local || remote {
        Ok(())
    } else {
        Err(ValidationError::new("image").with_message("Image must be an upload path or an http(s) URL".into()))
    }
}

/// Counters shown on the admin dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub users: i64,
    pub pending_talents: i64,
    pub pending_communities: i64,
    pub pending_products: i64,
    pub published_articles: ChannelCounts,
    pub active_hubs: i64,
}
