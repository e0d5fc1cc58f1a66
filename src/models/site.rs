//! Site-wide CMS content: app data groups, partners, socials and legal pages

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use super::validate_color;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialMedia {
    pub id: i64,
    /// e.g. `instagram`, `youtube`, `tiktok`
    pub platform: String,
    pub url: String,
    pub handle: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SocialMediaInput {
    #[validate(length(min = 1, max = 50, message = "Platform must be 1-50 characters"))]
    pub platform: String,
    #[validate(url(message = "URL must be valid"))]
    pub url: String,
    #[validate(length(max = 100))]
    pub handle: Option<String>,
    /// Appended at the end when absent
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub logo: Option<String>,
    pub url: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PartnerInput {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub logo: Option<String>,
    #[validate(url(message = "URL must be valid"))]
    pub url: Option<String>,
    pub sort_order: Option<i32>,
}

/// One entry of a reorder request
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalPage {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub content_html: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LegalPageInput {
    #[validate(length(max = 100))]
    pub slug: Option<String>,
    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: String,
}

/// A named group of `app_data` rows, stored as `{prefix}.{field}` keys.
///
/// Implementors are flat structs of string fields with `#[serde(default)]`.
pub trait AppDataGroup: Serialize + DeserializeOwned + Default {
    const PREFIX: &'static str;

    /// Read the group out of the full key/value map; missing keys keep their defaults
    fn from_map(map: &HashMap<String, String>) -> Self {
        let prefix = format!("{}.", Self::PREFIX);
        let fields: serde_json::Map<String, serde_json::Value> = map
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&prefix)
                    .map(|field| (field.to_string(), serde_json::Value::String(v.clone())))
            })
            .collect();
        serde_json::from_value(serde_json::Value::Object(fields)).unwrap_or_default()
    }

    /// Flatten into `(key, value)` rows
    fn to_pairs(&self) -> Vec<(String, String)> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(fields)) => fields
                .into_iter()
                .map(|(field, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (format!("{}.{}", Self::PREFIX, field), value)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct SiteInfo {
    #[validate(length(min = 1, max = 100, message = "Site name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 200))]
    pub tagline: String,
    #[validate(length(max = 300))]
    pub description: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            name: "Pemuda Magelang".to_string(),
            tagline: String::new(),
            description: String::new(),
        }
    }
}

impl AppDataGroup for SiteInfo {
    const PREFIX: &'static str = "site";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct HeroContent {
    #[validate(length(max = 200))]
    pub title: String,
    #[validate(length(max = 500))]
    pub subtitle: String,
    #[validate(length(max = 500))]
    pub image: String,
    #[validate(length(max = 50))]
    pub cta_label: String,
    #[validate(length(max = 500))]
    pub cta_link: String,
}

impl AppDataGroup for HeroContent {
    const PREFIX: &'static str = "hero";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct AboutContent {
    #[validate(length(max = 200))]
    pub title: String,
    /// Markdown
    #[validate(length(max = 10000))]
    pub body: String,
    #[validate(length(max = 500))]
    pub image: String,
    #[validate(length(max = 500))]
    pub vision: String,
    #[validate(length(max = 2000))]
    pub mission: String,
}

impl AppDataGroup for AboutContent {
    const PREFIX: &'static str = "about";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Branding {
    #[validate(length(max = 500))]
    pub logo: String,
    #[validate(length(max = 500))]
    pub favicon: String,
    #[validate(custom(function = "validate_color"))]
    pub primary_color: String,
    #[validate(custom(function = "validate_color"))]
    pub secondary_color: String,
}

impl AppDataGroup for Branding {
    const PREFIX: &'static str = "branding";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct ContactInfo {
    #[validate(length(max = 255))]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: String,
    #[validate(length(max = 500))]
    pub address: String,
}

impl AppDataGroup for ContactInfo {
    const PREFIX: &'static str = "contact";
}

/// The singleton site configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppData {
    pub site: SiteInfo,
    pub hero: HeroContent,
    pub about: AboutContent,
    pub branding: Branding,
    pub contact: ContactInfo,
}

impl AppData {
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            site: SiteInfo::from_map(map),
            hero: HeroContent::from_map(map),
            about: AboutContent::from_map(map),
            branding: Branding::from_map(map),
            contact: ContactInfo::from_map(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_from_map_uses_defaults_for_missing_keys() {
        let mut map = HashMap::new();
        map.insert("site.tagline".to_string(), "Tumbuh bersama".to_string());
        map.insert("hero.title".to_string(), "Halo".to_string());

        let data = AppData::from_map(&map);
        assert_eq!(data.site.name, "Pemuda Magelang");
        assert_eq!(data.site.tagline, "Tumbuh bersama");
        assert_eq!(data.hero.title, "Halo");
        assert_eq!(data.branding, Branding::default());
    }

    #[test]
    fn test_group_pairs_are_prefixed() {
        let hero = HeroContent {
            title: "Ayo".into(),
            cta_link: "/zhub".into(),
            ..Default::default()
        };
        let pairs = hero.to_pairs();
        assert!(pairs.contains(&("hero.title".to_string(), "Ayo".to_string())));
        assert!(pairs.contains(&("hero.cta_link".to_string(), "/zhub".to_string())));
        assert_eq!(pairs.len(), 5);
    }

    #[test]
    fn test_pairs_read_back() {
        let contact = ContactInfo {
            email: "halo@pemudamagelang.id".into(),
            phone: "0812".into(),
            address: "Jl. Pemuda 1".into(),
        };
        let map: HashMap<String, String> = contact.to_pairs().into_iter().collect();
        assert_eq!(ContactInfo::from_map(&map), contact);
    }

    #[test]
    fn test_branding_color_validation() {
        let mut branding = Branding {
            primary_color: "#12ab9F".into(),
            ..Default::default()
        };
        assert!(branding.validate().is_ok());

        branding.secondary_color = "blue".into();
        assert!(branding.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut map = HashMap::new();
        map.insert("site.unknown_field".to_string(), "x".to_string());
        let site = SiteInfo::from_map(&map);
        assert_eq!(site, SiteInfo::default());
    }
}
