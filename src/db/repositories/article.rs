//! Article repository
//!
//! Reads join in the author's display name and, for `dampak` articles, the
//! community name and slug.

use crate::db::DbPool;
use crate::models::{Article, ArticleChannel, ArticleFilter, ArticleStatus, ChannelCounts, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(&self, article: &Article) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// Whether another article (not `exclude_id`) already uses `slug`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Persist content, slug, status and publish date
    async fn update(&self, article: &Article) -> Result<Article>;

    async fn increment_view_count(&self, id: i64) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Filtered listing, most recently published first
    async fn list(&self, filter: &ArticleFilter, params: &ListParams) -> Result<(Vec<Article>, i64)>;

    async fn count_published_by_channel(&self) -> Result<ChannelCounts>;
}

pub struct SqlxArticleRepository {
    pool: DbPool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const ARTICLE_SELECT: &str = r#"
    SELECT a.id, a.slug, a.title, a.excerpt, a.content, a.content_html, a.cover_image,
           a.channel, a.status, a.author_id, a.community_id, a.view_count,
           a.published_at, a.created_at, a.updated_at,
           COALESCE(NULLIF(u.name, ''), u.username) AS author_name,
           c.name AS community_name, c.slug AS community_slug
    FROM articles a
    JOIN users u ON u.id = a.author_id
    LEFT JOIN communities c ON c.id = a.community_id
"#;

const LIST_WHERE: &str = r#"
    WHERE (?1 IS NULL OR a.channel = ?1)
      AND (?2 IS NULL OR a.status = ?2)
      AND (?3 IS NULL OR a.author_id = ?3)
      AND (?4 IS NULL OR a.community_id = ?4)
      AND (?5 IS NULL OR a.title LIKE ?5 OR a.excerpt LIKE ?5 OR a.content LIKE ?5)
"#;

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &Article) -> Result<Article> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO articles (slug, title, excerpt, content, content_html, cover_image, channel,
                                  status, author_id, community_id, view_count, published_at,
                                  created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.excerpt)
        .bind(&article.content)
        .bind(&article.content_html)
        .bind(&article.cover_image)
        .bind(article.channel.to_string())
        .bind(article.status.to_string())
        .bind(article.author_id)
        .bind(article.community_id)
        .bind(article.published_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create article")?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .context("Article missing right after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("{} WHERE a.id = ?", ARTICLE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get article by ID")?;

        row.as_ref().map(row_to_article).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("{} WHERE a.slug = ?", ARTICLE_SELECT))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get article by slug")?;

        row.as_ref().map(row_to_article).transpose()
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM articles WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check article slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn update(&self, article: &Article) -> Result<Article> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE articles
            SET slug = ?, title = ?, excerpt = ?, content = ?, content_html = ?, cover_image = ?,
                status = ?, community_id = ?, published_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.excerpt)
        .bind(&article.content)
        .bind(&article.content_html)
        .bind(&article.cover_image)
        .bind(article.status.to_string())
        .bind(article.community_id)
        .bind(article.published_at)
        .bind(now)
        .bind(article.id)
        .execute(&self.pool)
        .await
        .context("Failed to update article")?;

        Ok(Article {
            updated_at: now,
            ..article.clone()
        })
    }

    async fn increment_view_count(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE articles SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to increment view count")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete article")?;
        Ok(())
    }

    async fn list(&self, filter: &ArticleFilter, params: &ListParams) -> Result<(Vec<Article>, i64)> {
        let channel = filter.channel.map(|c| c.to_string());
        let status = filter.status.map(|s| s.to_string());
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));

        let rows = sqlx::query(&format!(
            "{} {} ORDER BY COALESCE(a.published_at, a.created_at) DESC, a.id DESC LIMIT ?6 OFFSET ?7",
            ARTICLE_SELECT, LIST_WHERE
        ))
        .bind(&channel)
        .bind(&status)
        .bind(filter.author_id)
        .bind(filter.community_id)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list articles")?;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) as count FROM articles a {}", LIST_WHERE))
            .bind(&channel)
            .bind(&status)
            .bind(filter.author_id)
            .bind(filter.community_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count articles")?
            .get("count");

        let articles = rows.iter().map(row_to_article).collect::<Result<Vec<_>>>()?;
        Ok((articles, total))
    }

    async fn count_published_by_channel(&self) -> Result<ChannelCounts> {
        let rows = sqlx::query(
            "SELECT channel, COUNT(*) as count FROM articles WHERE status = 'published' GROUP BY channel",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count articles per channel")?;

        let mut counts = ChannelCounts::default();
        for row in rows {
            let channel: String = row.get("channel");
            let count: i64 = row.get("count");
            match ArticleChannel::from_str(&channel) {
                Ok(ArticleChannel::Gerak) => counts.gerak = count,
                Ok(ArticleChannel::Detak) => counts.detak = count,
                Ok(ArticleChannel::Dampak) => counts.dampak = count,
                Err(_) => tracing::warn!("Unknown article channel in database: {}", channel),
            }
        }
        Ok(counts)
    }
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let channel_str: String = row.get("channel");
    let channel = ArticleChannel::from_str(&channel_str)
        .with_context(|| format!("Invalid channel in database: {}", channel_str))?;

    let status_str: String = row.get("status");
    let status = ArticleStatus::from_str(&status_str)
        .with_context(|| format!("Invalid article status in database: {}", status_str))?;

    let published_at: Option<DateTime<Utc>> = row.get("published_at");

    Ok(Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        channel,
        status,
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        community_id: row.get("community_id"),
        community_name: row.get("community_name"),
        community_slug: row.get("community_slug"),
        view_count: row.get("view_count"),
        published_at,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
