//! Community profiles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{validate_instagram, ModerationStatus};

/// A community (group) profile. An approved community may publish `dampak` articles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub location: Option<String>,
    pub contact_email: Option<String>,
    pub instagram: Option<String>,
    pub status: ModerationStatus,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommunityInput {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub logo: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(email(message = "Contact email is not valid"))]
    pub contact_email: Option<String>,
    #[validate(custom(function = "validate_instagram"))]
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommunityFilter {
    pub search: Option<String>,
    pub status: Option<ModerationStatus>,
}
