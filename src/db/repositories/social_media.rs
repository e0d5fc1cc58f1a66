//! Social media link repository

use crate::db::DbPool;
use crate::models::SocialMedia;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SocialMediaRepository: Send + Sync {
    async fn create(&self, item: &SocialMedia) -> Result<SocialMedia>;

    async fn get_by_id(&self, id: i64) -> Result<Option<SocialMedia>>;

    /// Ordered by `sort_order`
    async fn list(&self) -> Result<Vec<SocialMedia>>;

    async fn update(&self, item: &SocialMedia) -> Result<SocialMedia>;

    async fn update_order(&self, id: i64, sort_order: i32) -> Result<()>;

    /// One past the current highest `sort_order`
    async fn next_sort_order(&self) -> Result<i32>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxSocialMediaRepository {
    pool: DbPool,
}

impl SqlxSocialMediaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn SocialMediaRepository> {
        Arc::new(Self::new(pool))
    }
}

const SOCIAL_COLUMNS: &str = "id, platform, url, handle, sort_order, created_at, updated_at";

#[async_trait]
impl SocialMediaRepository for SqlxSocialMediaRepository {
    async fn create(&self, item: &SocialMedia) -> Result<SocialMedia> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO social_media (platform, url, handle, sort_order, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.platform)
        .bind(&item.url)
        .bind(&item.handle)
        .bind(item.sort_order)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create social media link")?;

        Ok(SocialMedia {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..item.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SocialMedia>> {
        let row = sqlx::query(&format!("SELECT {} FROM social_media WHERE id = ?", SOCIAL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get social media link")?;
        Ok(row.as_ref().map(row_to_social))
    }

    async fn list(&self) -> Result<Vec<SocialMedia>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM social_media ORDER BY sort_order, id",
            SOCIAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list social media links")?;
        Ok(rows.iter().map(row_to_social).collect())
    }

    async fn update(&self, item: &SocialMedia) -> Result<SocialMedia> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE social_media SET platform = ?, url = ?, handle = ?, sort_order = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&item.platform)
        .bind(&item.url)
        .bind(&item.handle)
        .bind(item.sort_order)
        .bind(now)
        .bind(item.id)
        .execute(&self.pool)
        .await
        .context("Failed to update social media link")?;

        Ok(SocialMedia {
            updated_at: now,
            ..item.clone()
        })
    }

    async fn update_order(&self, id: i64, sort_order: i32) -> Result<()> {
        sqlx::query("UPDATE social_media SET sort_order = ?, updated_at = ? WHERE id = ?")
            .bind(sort_order)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to reorder social media link")?;
        Ok(())
    }

    async fn next_sort_order(&self) -> Result<i32> {
        let row = sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 as next FROM social_media")
            .fetch_one(&self.pool)
            .await
            .context("Failed to read social media order")?;
        Ok(row.get("next"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM social_media WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete social media link")?;
        Ok(())
    }
}

fn row_to_social(row: &SqliteRow) -> SocialMedia {
    SocialMedia {
        id: row.get("id"),
        platform: row.get("platform"),
        url: row.get("url"),
        handle: row.get("handle"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
