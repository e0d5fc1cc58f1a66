//! Partner repository

use crate::db::DbPool;
use crate::models::Partner;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn create(&self, partner: &Partner) -> Result<Partner>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Partner>>;

    async fn list(&self) -> Result<Vec<Partner>>;

    async fn update(&self, partner: &Partner) -> Result<Partner>;

    async fn update_order(&self, id: i64, sort_order: i32) -> Result<()>;

    async fn next_sort_order(&self) -> Result<i32>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxPartnerRepository {
    pool: DbPool,
}

impl SqlxPartnerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn PartnerRepository> {
        Arc::new(Self::new(pool))
    }
}

const PARTNER_COLUMNS: &str = "id, name, logo, url, sort_order, created_at, updated_at";

#[async_trait]
impl PartnerRepository for SqlxPartnerRepository {
    async fn create(&self, partner: &Partner) -> Result<Partner> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO partners (name, logo, url, sort_order, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&partner.name)
        .bind(&partner.logo)
        .bind(&partner.url)
        .bind(partner.sort_order)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create partner")?;

        Ok(Partner {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..partner.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Partner>> {
        let row = sqlx::query(&format!("SELECT {} FROM partners WHERE id = ?", PARTNER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get partner")?;
        Ok(row.as_ref().map(row_to_partner))
    }

    async fn list(&self) -> Result<Vec<Partner>> {
        let rows = sqlx::query(&format!("SELECT {} FROM partners ORDER BY sort_order, id", PARTNER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list partners")?;
        Ok(rows.iter().map(row_to_partner).collect())
    }

    async fn update(&self, partner: &Partner) -> Result<Partner> {
        let now = Utc::now();

        sqlx::query("UPDATE partners SET name = ?, logo = ?, url = ?, sort_order = ?, updated_at = ? WHERE id = ?")
            .bind(&partner.name)
            .bind(&partner.logo)
            .bind(&partner.url)
            .bind(partner.sort_order)
            .bind(now)
            .bind(partner.id)
            .execute(&self.pool)
            .await
            .context("Failed to update partner")?;

        Ok(Partner {
            updated_at: now,
            ..partner.clone()
        })
    }

    async fn update_order(&self, id: i64, sort_order: i32) -> Result<()> {
        sqlx::query("UPDATE partners SET sort_order = ?, updated_at = ? WHERE id = ?")
            .bind(sort_order)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to reorder partner")?;
        Ok(())
    }

    async fn next_sort_order(&self) -> Result<i32> {
        let row = sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 as next FROM partners")
            .fetch_one(&self.pool)
            .await
            .context("Failed to read partner order")?;
        Ok(row.get("next"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM partners WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete partner")?;
        Ok(())
    }
}

fn row_to_partner(row: &SqliteRow) -> Partner {
    Partner {
        id: row.get("id"),
        name: row.get("name"),
        logo: row.get("logo"),
        url: row.get("url"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_pool;

    #[tokio::test]
    async fn test_partner_crud() {
        let repo = SqlxPartnerRepository::new(migrated_test_pool().await);
        let now = Utc::now();

        let created = repo
            .create(&Partner {
                id: 0,
                name: "Pemkot Magelang".into(),
                logo: None,
                url: Some("https://magelangkota.go.id".into()),
                sort_order: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let mut updated = created.clone();
        updated.name = "Pemerintah Kota Magelang".into();
        repo.update(&updated).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Pemerintah Kota Magelang");
        assert_eq!(repo.next_sort_order().await.unwrap(), 1);

        repo.delete(created.id).await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
    }
}
