//! AppData repository
//!
//! The site configuration singleton is a flat key/value table; grouping into
//! site/hero/about/branding/contact happens in the model layer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::DbPool;

#[async_trait]
pub trait AppDataRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn get_all(&self) -> Result<HashMap<String, String>>;

    /// Upsert every pair in one transaction
    async fn set_many(&self, pairs: &[(String, String)]) -> Result<()>;
}

pub struct SqlxAppDataRepository {
    pool: DbPool,
}

impl SqlxAppDataRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn AppDataRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AppDataRepository for SqlxAppDataRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM app_data WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read app data")?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn get_all(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM app_data")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read app data")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }

    async fn set_many(&self, pairs: &[(String, String)]) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (key, value) in pairs {
            sqlx::query(
                "INSERT INTO app_data (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to write app data key {}", key))?;
        }

        tx.commit().await.context("Failed to commit app data")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_pool;

    #[tokio::test]
    async fn test_set_many_upserts() {
        let repo = SqlxAppDataRepository::new(migrated_test_pool().await);

        repo.set_many(&[
            ("hero.title".to_string(), "Baru".to_string()),
            ("hero.subtitle".to_string(), "Sub".to_string()),
        ])
        .await
        .unwrap();

        assert_eq!(repo.get("hero.title").await.unwrap().as_deref(), Some("Baru"));
        assert_eq!(repo.get("hero.subtitle").await.unwrap().as_deref(), Some("Sub"));
        assert!(repo.get("hero.missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_all_includes_seeded_defaults() {
        let repo = SqlxAppDataRepository::new(migrated_test_pool().await);
        let all = repo.get_all().await.unwrap();
        assert_eq!(all.get("site.name").map(String::as_str), Some("Pemuda Magelang"));
    }
}
