//! Articles and their editorial channels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::ArticleStatus;

/// Editorial channel an article is published in.
///
/// - `Gerak`: the admin journal
/// - `Detak`: opinion column, open to every member
/// - `Dampak`: community impact stories, written for an approved community
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleChannel {
    Gerak,
    Detak,
    Dampak,
}

impl ArticleChannel {
    pub const ALL: [ArticleChannel; 3] = [
        ArticleChannel::Gerak,
        ArticleChannel::Detak,
        ArticleChannel::Dampak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleChannel::Gerak => "gerak",
            ArticleChannel::Detak => "detak",
            ArticleChannel::Dampak => "dampak",
        }
    }

    /// Heading used on the channel page
    pub fn title(&self) -> &'static str {
        match self {
            ArticleChannel::Gerak => "Gerak",
            ArticleChannel::Detak => "Detak",
            ArticleChannel::Dampak => "Dampak",
        }
    }
}

impl fmt::Display for ArticleChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleChannel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gerak" => Ok(ArticleChannel::Gerak),
            "detak" => Ok(ArticleChannel::Detak),
            "dampak" => Ok(ArticleChannel::Dampak),
            _ => Err(anyhow::anyhow!("Invalid article channel: {}", s)),
        }
    }
}

/// Article entity. `author_name` and the community fields are joined in on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    /// Markdown source
    pub content: String,
    /// Rendered, sanitized HTML
    pub content_html: String,
    pub cover_image: Option<String>,
    pub channel: ArticleChannel,
    pub status: ArticleStatus,
    pub author_id: i64,
    pub author_name: String,
    pub community_id: Option<i64>,
    pub community_name: Option<String>,
    pub community_slug: Option<String>,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateArticleInput {
    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: String,
    /// Generated from the title when absent
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    #[validate(length(max = 500, message = "Excerpt must be at most 500 characters"))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: String,
    #[validate(length(max = 500))]
    pub cover_image: Option<String>,
    pub channel: ArticleChannel,
    /// Publish right away instead of saving a draft
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateArticleInput {
    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: String,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    #[validate(length(max = 500, message = "Excerpt must be at most 500 characters"))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: String,
    #[validate(length(max = 500))]
    pub cover_image: Option<String>,
}

/// Listing filter. `None` fields do not constrain the query.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub channel: Option<ArticleChannel>,
    pub status: Option<ArticleStatus>,
    pub author_id: Option<i64>,
    pub community_id: Option<i64>,
    pub search: Option<String>,
}

/// Published article counts per channel
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelCounts {
    pub gerak: i64,
    pub detak: i64,
    pub dampak: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_parse_and_display() {
        assert_eq!("DETAK".parse::<ArticleChannel>().unwrap(), ArticleChannel::Detak);
        assert_eq!(ArticleChannel::Dampak.to_string(), "dampak");
        assert!("berita".parse::<ArticleChannel>().is_err());
    }

    #[test]
    fn test_create_input_title_bounds() {
        let input = CreateArticleInput {
            title: "Hi".into(),
            slug: None,
            excerpt: None,
            content: "isi".into(),
            cover_image: None,
            channel: ArticleChannel::Detak,
            publish: false,
        };
        assert!(input.validate().is_err());

        let input = CreateArticleInput {
            title: "Hai Magelang".into(),
            ..input
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_create_input_deserializes_without_publish() {
        let input: CreateArticleInput = serde_json::from_str(
            r#"{"title":"Jalan pagi","content":"isi","channel":"gerak"}"#,
        )
        .unwrap();
        assert!(!input.publish);
        assert_eq!(input.channel, ArticleChannel::Gerak);
    }
}
