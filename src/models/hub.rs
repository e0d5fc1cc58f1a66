//! Zhub directory: programs and initiatives grouped by category

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::HubStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubCategory {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct HubCategoryInput {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub slug: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub category_slug: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,
    pub status: HubStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct HubInput {
    pub category_id: i64,
    #[validate(length(min = 2, max = 150, message = "Name must be 2-150 characters"))]
    pub name: String,
    #[validate(length(max = 150))]
    pub slug: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub image: Option<String>,
    #[validate(url(message = "Link must be a valid URL"))]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HubFilter {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub status: Option<HubStatus>,
}
