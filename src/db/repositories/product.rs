//! Product repository

use crate::db::DbPool;
use crate::models::{ListParams, ModerationStatus, Product, ProductFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: &Product) -> Result<Product>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    async fn update(&self, product: &Product) -> Result<Product>;

    async fn set_status(&self, id: i64, status: ModerationStatus) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Every product of one talent, newest first
    async fn list_by_talent(&self, talent_id: i64) -> Result<Vec<Product>>;

    async fn list(&self, filter: &ProductFilter, params: &ListParams) -> Result<(Vec<Product>, i64)>;

    async fn count_by_status(&self, status: ModerationStatus) -> Result<i64>;
}

pub struct SqlxProductRepository {
    pool: DbPool,
}

impl SqlxProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn ProductRepository> {
        Arc::new(Self::new(pool))
    }
}

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.talent_id, p.name, p.slug, p.description, p.price, p.image, p.link,
           p.status, p.created_at, p.updated_at,
           t.name AS talent_name, t.slug AS talent_slug, t.status AS talent_status
    FROM products p
    JOIN talents t ON t.id = p.talent_id
"#;

const LIST_WHERE: &str = r#"
    WHERE (?1 IS NULL OR p.name LIKE ?1 OR p.description LIKE ?1 OR t.name LIKE ?1)
      AND (?2 IS NULL OR p.talent_id = ?2)
      AND (?3 IS NULL OR p.status = ?3)
      AND (?4 = 0 OR t.status = 'approved')
"#;

#[async_trait]
impl ProductRepository for SqlxProductRepository {
    async fn create(&self, product: &Product) -> Result<Product> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO products (talent_id, name, slug, description, price, image, link, status,
                                  created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product.talent_id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image)
        .bind(&product.link)
        .bind(product.status.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create product")?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .context("Product missing right after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?", PRODUCT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get product by ID")?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("{} WHERE p.slug = ?", PRODUCT_SELECT))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get product by slug")?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM products WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check product slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn update(&self, product: &Product) -> Result<Product> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, price = ?, image = ?, link = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image)
        .bind(&product.link)
        .bind(product.status.to_string())
        .bind(now)
        .bind(product.id)
        .execute(&self.pool)
        .await
        .context("Failed to update product")?;

        Ok(Product {
            updated_at: now,
            ..product.clone()
        })
    }

    async fn set_status(&self, id: i64, status: ModerationStatus) -> Result<()> {
        sqlx::query("UPDATE products SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update product status")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete product")?;
        Ok(())
    }

    async fn list_by_talent(&self, talent_id: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{} WHERE p.talent_id = ? ORDER BY p.created_at DESC, p.id DESC",
            PRODUCT_SELECT
        ))
        .bind(talent_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list talent products")?;

        rows.iter().map(row_to_product).collect()
    }

    async fn list(&self, filter: &ProductFilter, params: &ListParams) -> Result<(Vec<Product>, i64)> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let status = filter.status.map(|s| s.to_string());
        let public_only = filter.public_only as i64;

        let rows = sqlx::query(&format!(
            "{} {} ORDER BY p.created_at DESC, p.id DESC LIMIT ?5 OFFSET ?6",
            PRODUCT_SELECT, LIST_WHERE
        ))
        .bind(&pattern)
        .bind(filter.talent_id)
        .bind(&status)
        .bind(public_only)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list products")?;

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) as count FROM products p JOIN talents t ON t.id = p.talent_id {}",
            LIST_WHERE
        ))
        .bind(&pattern)
        .bind(filter.talent_id)
        .bind(&status)
        .bind(public_only)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count products")?
        .get("count");

        let products = rows.iter().map(row_to_product).collect::<Result<Vec<_>>>()?;
        Ok((products, total))
    }

    async fn count_by_status(&self, status: ModerationStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM products WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count products")?;
        Ok(row.get("count"))
    }
}

fn row_to_product(row: &SqliteRow) -> Result<Product> {
    let status_str: String = row.get("status");
    let status = ModerationStatus::from_str(&status_str)
        .with_context(|| format!("Invalid product status in database: {}", status_str))?;

    let talent_status_str: String = row.get("talent_status");
    let talent_status = ModerationStatus::from_str(&talent_status_str)
        .with_context(|| format!("Invalid talent status in database: {}", talent_status_str))?;

    Ok(Product {
        id: row.get("id"),
        talent_id: row.get("talent_id"),
        talent_name: row.get("talent_name"),
        talent_slug: row.get("talent_slug"),
        talent_status,
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        price: row.get("price"),
        image: row.get("image"),
        link: row.get("link"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_pool;

    async fn insert_talent(pool: &DbPool, username: &str, status: &str) -> i64 {
        let user_id = sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'h')")
            .bind(username)
            .bind(format!("{}@example.com", username))
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid();
        sqlx::query("INSERT INTO talents (user_id, name, slug, profession, status) VALUES (?, ?, ?, 'Perajin', ?)")
            .bind(user_id)
            .bind(username)
            .bind(username)
            .bind(status)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    fn product(talent_id: i64, slug: &str, status: ModerationStatus) -> Product {
        let now = Utc::now();
        Product {
            id: 0,
            talent_id,
            talent_name: String::new(),
            talent_slug: String::new(),
            talent_status: ModerationStatus::Pending,
            name: format!("Produk {}", slug),
            slug: slug.into(),
            description: None,
            price: Some(25_000),
            image: None,
            link: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_joins_talent() {
        let pool = migrated_test_pool().await;
        let talent_id = insert_talent(&pool, "perajin", "approved").await;
        let repo = SqlxProductRepository::new(pool);

        let created = repo.create(&product(talent_id, "gerabah", ModerationStatus::Pending)).await.unwrap();
        assert_eq!(created.talent_slug, "perajin");
        assert_eq!(created.talent_status, ModerationStatus::Approved);
        assert_eq!(created.price, Some(25_000));
        assert!(repo.slug_exists("gerabah").await.unwrap());
    }

    #[tokio::test]
    async fn test_public_listing_requires_approved_talent() {
        let pool = migrated_test_pool().await;
        let approved = insert_talent(&pool, "disetujui", "approved").await;
        let banned = insert_talent(&pool, "diblokir", "banned").await;
        let repo = SqlxProductRepository::new(pool);

        repo.create(&product(approved, "a", ModerationStatus::Approved)).await.unwrap();
        repo.create(&product(approved, "b", ModerationStatus::Pending)).await.unwrap();
        repo.create(&product(banned, "c", ModerationStatus::Approved)).await.unwrap();

        let params = ListParams::default();
        let (public, total) = repo.list(&ProductFilter::public(None, None), &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(public[0].slug, "a");

        let (all, total) = repo.list(&ProductFilter::default(), &params).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(total, 3);

        assert_eq!(repo.list_by_talent(approved).await.unwrap().len(), 2);
        assert_eq!(repo.count_by_status(ModerationStatus::Approved).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_status_and_delete() {
        let pool = migrated_test_pool().await;
        let talent_id = insert_talent(&pool, "penjahit", "approved").await;
        let repo = SqlxProductRepository::new(pool);
        let mut p = repo.create(&product(talent_id, "kebaya", ModerationStatus::Pending)).await.unwrap();

        repo.set_status(p.id, ModerationStatus::Approved).await.unwrap();
        p.price = None;
        p.status = ModerationStatus::Approved;
        repo.update(&p).await.unwrap();

        let found = repo.get_by_slug("kebaya").await.unwrap().unwrap();
        assert!(found.is_public());
        assert_eq!(found.price, None);

        repo.delete(p.id).await.unwrap();
        assert!(repo.get_by_id(p.id).await.unwrap().is_none());
    }
}
