//! Products shown in a talent's gallery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ModerationStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub talent_id: i64,
    /// Joined from the owning talent
    pub talent_name: String,
    pub talent_slug: String,
    pub talent_status: ModerationStatus,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Whole rupiah
    pub price: Option<i64>,
    pub image: Option<String>,
    pub link: Option<String>,
    pub status: ModerationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Visible to the public only when both product and talent are approved
    pub fn is_public(&self) -> bool {
        self.status.is_public() && self.talent_status.is_public()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 2, max = 150, message = "Name must be 2-150 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i64>,
    #[validate(length(max = 500))]
    pub image: Option<String>,
    #[validate(url(message = "Link must be a valid URL"))]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub talent_id: Option<i64>,
    pub status: Option<ModerationStatus>,
    /// Also require the owning talent to be approved
    pub public_only: bool,
}

impl ProductFilter {
    pub fn public(search: Option<String>, talent_id: Option<i64>) -> Self {
        Self {
            search,
            talent_id,
            status: Some(ModerationStatus::Approved),
            public_only: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_price_rejected() {
        let input = ProductInput {
            name: "Batik Tulis".into(),
            price: Some(-1),
            ..Default::default()
        };
        assert!(input.validate().is_err());

        let input = ProductInput {
            price: Some(150_000),
            ..input
        };
        assert!(input.validate().is_ok());
    }
}
