//! Legal page repository

use crate::db::DbPool;
use crate::models::LegalPage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LegalPageRepository: Send + Sync {
    async fn create(&self, page: &LegalPage) -> Result<LegalPage>;

    async fn get_by_id(&self, id: i64) -> Result<Option<LegalPage>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<LegalPage>>;

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn update(&self, page: &LegalPage) -> Result<LegalPage>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Ordered by title
    async fn list(&self) -> Result<Vec<LegalPage>>;
}

pub struct SqlxLegalPageRepository {
    pool: DbPool,
}

impl SqlxLegalPageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn LegalPageRepository> {
        Arc::new(Self::new(pool))
    }
}

const PAGE_COLUMNS: &str = "id, slug, title, content, content_html, created_at, updated_at";

#[async_trait]
impl LegalPageRepository for SqlxLegalPageRepository {
    async fn create(&self, page: &LegalPage) -> Result<LegalPage> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO legal_pages (slug, title, content, content_html, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&page.content)
        .bind(&page.content_html)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create legal page")?;

        Ok(LegalPage {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..page.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LegalPage>> {
        let row = sqlx::query(&format!("SELECT {} FROM legal_pages WHERE id = ?", PAGE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get legal page")?;
        Ok(row.as_ref().map(row_to_page))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<LegalPage>> {
        let row = sqlx::query(&format!("SELECT {} FROM legal_pages WHERE slug = ?", PAGE_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get legal page by slug")?;
        Ok(row.as_ref().map(row_to_page))
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM legal_pages WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check legal page slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn update(&self, page: &LegalPage) -> Result<LegalPage> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE legal_pages SET slug = ?, title = ?, content = ?, content_html = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&page.content)
        .bind(&page.content_html)
        .bind(now)
        .bind(page.id)
        .execute(&self.pool)
        .await
        .context("Failed to update legal page")?;

        Ok(LegalPage {
            updated_at: now,
            ..page.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM legal_pages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete legal page")?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LegalPage>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM legal_pages ORDER BY title COLLATE NOCASE",
            PAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list legal pages")?;
        Ok(rows.iter().map(row_to_page).collect())
    }
}

fn row_to_page(row: &SqliteRow) -> LegalPage {
    LegalPage {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_pool;

    fn page(slug: &str, title: &str) -> LegalPage {
        let now = Utc::now();
        LegalPage {
            id: 0,
            slug: slug.into(),
            title: title.into(),
            content: "Isi".into(),
            content_html: "<p>Isi</p>".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_legal_page_crud() {
        let repo = SqlxLegalPageRepository::new(migrated_test_pool().await);

        let privacy = repo.create(&page("kebijakan-privasi", "Kebijakan Privasi")).await.unwrap();
        repo.create(&page("aturan", "Aturan Penggunaan")).await.unwrap();

        let list = repo.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].slug, "aturan");

        let mut updated = privacy.clone();
        updated.title = "Privasi".into();
        repo.update(&updated).await.unwrap();
        assert_eq!(repo.get_by_slug("kebijakan-privasi").await.unwrap().unwrap().title, "Privasi");

        assert!(repo.slug_exists("aturan", None).await.unwrap());
        assert!(!repo.slug_exists("kebijakan-privasi", Some(privacy.id)).await.unwrap());

        repo.delete(privacy.id).await.unwrap();
        assert!(repo.get_by_id(privacy.id).await.unwrap().is_none());
    }
}
