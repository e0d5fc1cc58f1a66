//! Zhub repositories: hub categories and hubs

use crate::db::DbPool;
use crate::models::{Hub, HubCategory, HubFilter, HubStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait HubCategoryRepository: Send + Sync {
    async fn create(&self, category: &HubCategory) -> Result<HubCategory>;

    async fn get_by_id(&self, id: i64) -> Result<Option<HubCategory>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<HubCategory>>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn update(&self, category: &HubCategory) -> Result<HubCategory>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Ordered by `sort_order`, then name
    async fn list(&self) -> Result<Vec<HubCategory>>;

    /// Hubs (any status) still referencing the category
    async fn hub_count(&self, id: i64) -> Result<i64>;
}

pub struct SqlxHubCategoryRepository {
    pool: DbPool,
}

impl SqlxHubCategoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn HubCategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const CATEGORY_COLUMNS: &str = "id, name, slug, description, sort_order, created_at";

#[async_trait]
impl HubCategoryRepository for SqlxHubCategoryRepository {
    async fn create(&self, category: &HubCategory) -> Result<HubCategory> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO hub_categories (name, slug, description, sort_order, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.sort_order)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create hub category")?;

        Ok(HubCategory {
            id: result.last_insert_rowid(),
            created_at: now,
            ..category.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<HubCategory>> {
        let row = sqlx::query(&format!("SELECT {} FROM hub_categories WHERE id = ?", CATEGORY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get hub category")?;

        Ok(row.as_ref().map(row_to_category))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<HubCategory>> {
        let row = sqlx::query(&format!("SELECT {} FROM hub_categories WHERE slug = ?", CATEGORY_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get hub category by slug")?;

        Ok(row.as_ref().map(row_to_category))
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM hub_categories WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check hub category slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn update(&self, category: &HubCategory) -> Result<HubCategory> {
        sqlx::query("UPDATE hub_categories SET name = ?, slug = ?, description = ?, sort_order = ? WHERE id = ?")
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(category.sort_order)
            .bind(category.id)
            .execute(&self.pool)
            .await
            .context("Failed to update hub category")?;
        Ok(category.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM hub_categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete hub category")?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<HubCategory>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM hub_categories ORDER BY sort_order, name COLLATE NOCASE",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list hub categories")?;

        Ok(rows.iter().map(row_to_category).collect())
    }

    async fn hub_count(&self, id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM hubs WHERE category_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count hubs in category")?;
        Ok(row.get("count"))
    }
}

fn row_to_category(row: &SqliteRow) -> HubCategory {
    HubCategory {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
pub trait HubRepository: Send + Sync {
    async fn create(&self, hub: &Hub) -> Result<Hub>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Hub>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Hub>>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn update(&self, hub: &Hub) -> Result<Hub>;

    async fn set_status(&self, id: i64, status: HubStatus) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn list(&self, filter: &HubFilter, params: &ListParams) -> Result<(Vec<Hub>, i64)>;

    async fn count_by_status(&self, status: HubStatus) -> Result<i64>;
}

pub struct SqlxHubRepository {
    pool: DbPool,
}

impl SqlxHubRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn HubRepository> {
        Arc::new(Self::new(pool))
    }
}

const HUB_SELECT: &str = r#"
    SELECT h.id, h.category_id, h.name, h.slug, h.description, h.image, h.link, h.status,
           h.created_at, h.updated_at,
           c.name AS category_name, c.slug AS category_slug
    FROM hubs h
    JOIN hub_categories c ON c.id = h.category_id
"#;

const HUB_WHERE: &str = r#"
    WHERE (?1 IS NULL OR c.slug = ?1)
      AND (?2 IS NULL OR h.name LIKE ?2 OR h.description LIKE ?2)
      AND (?3 IS NULL OR h.status = ?3)
"#;

#[async_trait]
impl HubRepository for SqlxHubRepository {
    async fn create(&self, hub: &Hub) -> Result<Hub> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO hubs (category_id, name, slug, description, image, link, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(hub.category_id)
        .bind(&hub.name)
        .bind(&hub.slug)
        .bind(&hub.description)
        .bind(&hub.image)
        .bind(&hub.link)
        .bind(hub.status.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create hub")?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .context("Hub missing right after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Hub>> {
        let row = sqlx::query(&format!("{} WHERE h.id = ?", HUB_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get hub")?;

        row.as_ref().map(row_to_hub).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Hub>> {
        let row = sqlx::query(&format!("{} WHERE h.slug = ?", HUB_SELECT))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get hub by slug")?;

        row.as_ref().map(row_to_hub).transpose()
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM hubs WHERE slug = ? AND (? IS NULL OR id != ?)")
            .bind(slug)
            .bind(exclude_id)
            .bind(exclude_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check hub slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn update(&self, hub: &Hub) -> Result<Hub> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE hubs
            SET category_id = ?, name = ?, slug = ?, description = ?, image = ?, link = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(hub.category_id)
        .bind(&hub.name)
        .bind(&hub.slug)
        .bind(&hub.description)
        .bind(&hub.image)
        .bind(&hub.link)
        .bind(now)
        .bind(hub.id)
        .execute(&self.pool)
        .await
        .context("Failed to update hub")?;

        self.get_by_id(hub.id)
            .await?
            .context("Hub missing right after update")
    }

    async fn set_status(&self, id: i64, status: HubStatus) -> Result<()> {
        sqlx::query("UPDATE hubs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update hub status")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM hubs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete hub")?;
        Ok(())
    }

    async fn list(&self, filter: &HubFilter, params: &ListParams) -> Result<(Vec<Hub>, i64)> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let status = filter.status.map(|s| s.to_string());

        let rows = sqlx::query(&format!(
            "{} {} ORDER BY c.sort_order, h.name COLLATE NOCASE, h.id LIMIT ?4 OFFSET ?5",
            HUB_SELECT, HUB_WHERE
        ))
        .bind(&filter.category_slug)
        .bind(&pattern)
        .bind(&status)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list hubs")?;

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) as count FROM hubs h JOIN hub_categories c ON c.id = h.category_id {}",
            HUB_WHERE
        ))
        .bind(&filter.category_slug)
        .bind(&pattern)
        .bind(&status)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count hubs")?
        .get("count");

        let hubs = rows.iter().map(row_to_hub).collect::<Result<Vec<_>>>()?;
        Ok((hubs, total))
    }

    async fn count_by_status(&self, status: HubStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM hubs WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count hubs")?;
        Ok(row.get("count"))
    }
}

fn row_to_hub(row: &SqliteRow) -> Result<Hub> {
    let status_str: String = row.get("status");
    let status = HubStatus::from_str(&status_str)
        .with_context(|| format!("Invalid hub status in database: {}", status_str))?;

    Ok(Hub {
        id: row.get("id"),
        category_id: row.get("category_id"),
        category_name: row.get("category_name"),
        category_slug: row.get("category_slug"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        image: row.get("image"),
        link: row.get("link"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
