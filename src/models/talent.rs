//! Talent profiles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{validate_instagram, ModerationStatus};

/// A creator profile submitted by a user and reviewed by an admin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Talent {
    pub id: i64,
    /// Owner; a user has at most one talent
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub profession: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub instagram: Option<String>,
    pub website: Option<String>,
    pub status: ModerationStatus,
    /// Admin's reason for a rejection or ban
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when registering or editing a talent
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TalentInput {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 100, message = "Profession must be 2-100 characters"))]
    pub profession: String,
    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 500))]
    pub image: Option<String>,
    #[validate(custom(function = "validate_instagram"))]
    pub instagram: Option<String>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TalentFilter {
    pub search: Option<String>,
    pub profession: Option<String>,
    pub status: Option<ModerationStatus>,
}

impl TalentFilter {
    /// Filter for the public directory
    pub fn public(search: Option<String>, profession: Option<String>) -> Self {
        Self {
            search,
            profession,
            status: Some(ModerationStatus::Approved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> TalentInput {
        TalentInput {
            name: "Dewi Lestari".into(),
            profession: "Ilustrator".into(),
            bio: Some("Menggambar sejak kecil".into()),
            image: None,
            instagram: Some("dewi.draws".into()),
            website: Some("https://dewi.example.com".into()),
        }
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_short_name_rejected() {
        let input = TalentInput {
            name: "D".into(),
            ..valid_input()
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_bad_website_rejected() {
        let input = TalentInput {
            website: Some("not a url".into()),
            ..valid_input()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_public_filter_is_approved_only() {
        let filter = TalentFilter::public(None, Some("Musisi".into()));
        assert_eq!(filter.status, Some(ModerationStatus::Approved));
    }
}
