//! Community repository

use crate::db::DbPool;
use crate::models::{Community, CommunityFilter, ListParams, ModerationStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait CommunityRepository: Send + Sync {
    async fn create(&self, community: &Community) -> Result<Community>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Community>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Community>>;

    async fn get_by_user(&self, user_id: i64) -> Result<Option<Community>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    async fn update(&self, community: &Community) -> Result<Community>;

    async fn set_status(&self, id: i64, status: ModerationStatus, note: Option<&str>) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn list(&self, filter: &CommunityFilter, params: &ListParams) -> Result<(Vec<Community>, i64)>;

    async fn count_by_status(&self, status: ModerationStatus) -> Result<i64>;
}

pub struct SqlxCommunityRepository {
    pool: DbPool,
}

impl SqlxCommunityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn CommunityRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMUNITY_COLUMNS: &str = "id, user_id, name, slug, description, logo, location, contact_email, instagram, status, review_note, created_at, updated_at";

const LIST_WHERE: &str = r#"
    WHERE (?1 IS NULL OR name LIKE ?1 OR description LIKE ?1 OR location LIKE ?1)
      AND (?2 IS NULL OR status = ?2)
"#;

#[async_trait]
impl CommunityRepository for SqlxCommunityRepository {
    async fn create(&self, community: &Community) -> Result<Community> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO communities (user_id, name, slug, description, logo, location, contact_email,
                                     instagram, status, review_note, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(community.user_id)
        .bind(&community.name)
        .bind(&community.slug)
        .bind(&community.description)
        .bind(&community.logo)
        .bind(&community.location)
        .bind(&community.contact_email)
        .bind(&community.instagram)
        .bind(community.status.to_string())
        .bind(&community.review_note)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create community")?;

        Ok(Community {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..community.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Community>> {
        let row = sqlx::query(&format!("SELECT {} FROM communities WHERE id = ?", COMMUNITY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get community by id")?;

        row.as_ref().map(row_to_community).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Community>> {
        let row = sqlx::query(&format!("SELECT {} FROM communities WHERE slug = ?", COMMUNITY_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get community by slug")?;

        row.as_ref().map(row_to_community).transpose()
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<Community>> {
        let row = sqlx::query(&format!("SELECT {} FROM communities WHERE user_id = ?", COMMUNITY_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get community by user")?;

        row.as_ref().map(row_to_community).transpose()
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM communities WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check community slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn update(&self, community: &Community) -> Result<Community> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE communities
            SET name = ?, slug = ?, description = ?, logo = ?, location = ?, contact_email = ?,
                instagram = ?, status = ?, review_note = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&community.name)
        .bind(&community.slug)
        .bind(&community.description)
        .bind(&community.logo)
        .bind(&community.location)
        .bind(&community.contact_email)
        .bind(&community.instagram)
        .bind(community.status.to_string())
        .bind(&community.review_note)
        .bind(now)
        .bind(community.id)
        .execute(&self.pool)
        .await
        .context("Failed to update community")?;

        Ok(Community {
            updated_at: now,
            ..community.clone()
        })
    }

    async fn set_status(&self, id: i64, status: ModerationStatus, note: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE communities SET status = ?, review_note = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(note)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update community status")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM communities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete community")?;
        Ok(())
    }

    async fn list(&self, filter: &CommunityFilter, params: &ListParams) -> Result<(Vec<Community>, i64)> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let status = filter.status.map(|s| s.to_string());

        let rows = sqlx::query(&format!(
            "SELECT {} FROM communities {} ORDER BY name COLLATE NOCASE, id LIMIT ?3 OFFSET ?4",
            COMMUNITY_COLUMNS, LIST_WHERE
        ))
        .bind(&pattern)
        .bind(&status)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list communities")?;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) as count FROM communities {}", LIST_WHERE))
            .bind(&pattern)
            .bind(&status)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count communities")?
            .get("count");

        let communities = rows.iter().map(row_to_community).collect::<Result<Vec<_>>>()?;
        Ok((communities, total))
    }

    async fn count_by_status(&self, status: ModerationStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM communities WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count communities")?;
        Ok(row.get("count"))
    }
}

fn row_to_community(row: &SqliteRow) -> Result<Community> {
    let status_str: String = row.get("status");
    let status = ModerationStatus::from_str(&status_str)
        .with_context(|| format!("Invalid community status in database: {}", status_str))?;

    Ok(Community {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        logo: row.get("logo"),
        location: row.get("location"),
        contact_email: row.get("contact_email"),
        instagram: row.get("instagram"),
        status,
        review_note: row.get("review_note"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_pool;

    async fn insert_user(pool: &DbPool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'h')")
            .bind(username)
            .bind(format!("{}@example.com", username))
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    fn community(user_id: i64, name: &str, slug: &str) -> Community {
        let now = Utc::now();
        Community {
            id: 0,
            user_id,
            name: name.into(),
            slug: slug.into(),
            description: Some("Kegiatan rutin akhir pekan".into()),
            logo: None,
            location: Some("Mertoyudan".into()),
            contact_email: None,
            instagram: None,
            status: ModerationStatus::Pending,
            review_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_update_and_lookup() {
        let pool = migrated_test_pool().await;
        let user_id = insert_user(&pool, "ketua").await;
        let repo = SqlxCommunityRepository::new(pool);

        let mut created = repo.create(&community(user_id, "Gowes Magelang", "gowes-magelang")).await.unwrap();
        created.location = Some("Borobudur".into());
        repo.update(&created).await.unwrap();

        let found = repo.get_by_slug("gowes-magelang").await.unwrap().unwrap();
        assert_eq!(found.location.as_deref(), Some("Borobudur"));
        assert_eq!(repo.get_by_user(user_id).await.unwrap().unwrap().id, created.id);
        assert!(repo.slug_exists("gowes-magelang").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_status_and_search() {
        let pool = migrated_test_pool().await;
        let a = insert_user(&pool, "a_user").await;
        let b = insert_user(&pool, "b_user").await;
        let repo = SqlxCommunityRepository::new(pool);

        let c1 = repo.create(&community(a, "Literasi Kota", "literasi-kota")).await.unwrap();
        repo.create(&community(b, "Relawan Merapi", "relawan-merapi")).await.unwrap();
        repo.set_status(c1.id, ModerationStatus::Approved, None).await.unwrap();

        let params = ListParams::default();
        let filter = CommunityFilter {
            status: Some(ModerationStatus::Approved),
            ..Default::default()
        };
        let (approved, total) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(approved[0].slug, "literasi-kota");

        let filter = CommunityFilter {
            search: Some("merapi".into()),
            ..Default::default()
        };
        let (found, _) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(found.len(), 1);

        assert_eq!(repo.count_by_status(ModerationStatus::Pending).await.unwrap(), 1);
    }
}
