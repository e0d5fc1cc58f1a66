//! Talent repository

use crate::db::DbPool;
use crate::models::{ListParams, ModerationStatus, Talent, TalentFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait TalentRepository: Send + Sync {
    async fn create(&self, talent: &Talent) -> Result<Talent>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Talent>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Talent>>;

    async fn get_by_user(&self, user_id: i64) -> Result<Option<Talent>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Persist every mutable column, including status and review note
    async fn update(&self, talent: &Talent) -> Result<Talent>;

    async fn set_status(&self, id: i64, status: ModerationStatus, note: Option<&str>) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Filtered listing ordered by name
    async fn list(&self, filter: &TalentFilter, params: &ListParams) -> Result<(Vec<Talent>, i64)>;

    async fn count_by_status(&self, status: ModerationStatus) -> Result<i64>;
}

pub struct SqlxTalentRepository {
    pool: DbPool,
}

impl SqlxTalentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn TalentRepository> {
        Arc::new(Self::new(pool))
    }
}

const TALENT_COLUMNS: &str = "id, user_id, name, slug, profession, bio, image, instagram, website, status, review_note, created_at, updated_at";

const LIST_WHERE: &str = r#"
    WHERE (?1 IS NULL OR name LIKE ?1 OR profession LIKE ?1 OR bio LIKE ?1)
      AND (?2 IS NULL OR profession = ?2 COLLATE NOCASE)
      AND (?3 IS NULL OR status = ?3)
"#;

#[async_trait]
impl TalentRepository for SqlxTalentRepository {
    async fn create(&self, talent: &Talent) -> Result<Talent> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO talents (user_id, name, slug, profession, bio, image, instagram, website,
                                 status, review_note, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(talent.user_id)
        .bind(&talent.name)
        .bind(&talent.slug)
        .bind(&talent.profession)
        .bind(&talent.bio)
        .bind(&talent.image)
        .bind(&talent.instagram)
        .bind(&talent.website)
        .bind(talent.status.to_string())
        .bind(&talent.review_note)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create talent")?;

        Ok(Talent {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..talent.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Talent>> {
        let row = sqlx::query(&format!("SELECT {} FROM talents WHERE id = ?", TALENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get talent by id")?;

        row.as_ref().map(row_to_talent).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Talent>> {
        let row = sqlx::query(&format!("SELECT {} FROM talents WHERE slug = ?", TALENT_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get talent by slug")?;

        row.as_ref().map(row_to_talent).transpose()
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<Talent>> {
        let row = sqlx::query(&format!("SELECT {} FROM talents WHERE user_id = ?", TALENT_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get talent by user")?;

        row.as_ref().map(row_to_talent).transpose()
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM talents WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check talent slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn update(&self, talent: &Talent) -> Result<Talent> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE talents
            SET name = ?, slug = ?, profession = ?, bio = ?, image = ?, instagram = ?, website = ?,
                status = ?, review_note = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&talent.name)
        .bind(&talent.slug)
        .bind(&talent.profession)
        .bind(&talent.bio)
        .bind(&talent.image)
        .bind(&talent.instagram)
        .bind(&talent.website)
        .bind(talent.status.to_string())
        .bind(&talent.review_note)
        .bind(now)
        .bind(talent.id)
        .execute(&self.pool)
        .await
        .context("Failed to update talent")?;

        Ok(Talent {
            updated_at: now,
            ..talent.clone()
        })
    }

    async fn set_status(&self, id: i64, status: ModerationStatus, note: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE talents SET status = ?, review_note = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(note)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update talent status")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM talents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete talent")?;
        Ok(())
    }

    async fn list(&self, filter: &TalentFilter, params: &ListParams) -> Result<(Vec<Talent>, i64)> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let status = filter.status.map(|s| s.to_string());

        let rows = sqlx::query(&format!(
            "SELECT {} FROM talents {} ORDER BY name COLLATE NOCASE, id LIMIT ?4 OFFSET ?5",
            TALENT_COLUMNS, LIST_WHERE
        ))
        .bind(&pattern)
        .bind(&filter.profession)
        .bind(&status)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list talents")?;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) as count FROM talents {}", LIST_WHERE))
            .bind(&pattern)
            .bind(&filter.profession)
            .bind(&status)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count talents")?
            .get("count");

        let talents = rows.iter().map(row_to_talent).collect::<Result<Vec<_>>>()?;
        Ok((talents, total))
    }

    async fn count_by_status(&self, status: ModerationStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM talents WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count talents")?;
        Ok(row.get("count"))
    }
}

fn row_to_talent(row: &SqliteRow) -> Result<Talent> {
    let status_str: String = row.get("status");
    let status = ModerationStatus::from_str(&status_str)
        .with_context(|| format!("Invalid talent status in database: {}", status_str))?;

    Ok(Talent {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        slug: row.get("slug"),
        profession: row.get("profession"),
        bio: row.get("bio"),
        image: row.get("image"),
        instagram: row.get("instagram"),
        website: row.get("website"),
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

    fn talent(user_id: i64, name: &str, slug: &str, profession: &str) -> Talent {
        let now = Utc::now();
        Talent {
            id: 0,
            user_id,
            name: name.into(),
            slug: slug.into(),
            profession: profession.into(),
            bio: None,
            image: None,
            instagram: None,
            website: None,
            status: ModerationStatus::Pending,
            review_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = migrated_test_pool().await;
        let user_id = insert_user(&pool, "dewi").await;
        let repo = SqlxTalentRepository::new(pool);

        let created = repo.create(&talent(user_id, "Dewi", "dewi", "Ilustrator")).await.unwrap();
        assert!(created.id > 0);

        assert_eq!(repo.get_by_slug("dewi").await.unwrap().unwrap().id, created.id);
        assert_eq!(repo.get_by_user(user_id).await.unwrap().unwrap().id, created.id);
        assert!(repo.slug_exists("dewi").await.unwrap());
        assert!(!repo.slug_exists("dewi-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_status_with_note() {
        let pool = migrated_test_pool().await;
        let user_id = insert_user(&pool, "agus").await;
        let repo = SqlxTalentRepository::new(pool);
        let created = repo.create(&talent(user_id, "Agus", "agus", "Musisi")).await.unwrap();

        repo.set_status(created.id, ModerationStatus::Rejected, Some("Foto kurang jelas"))
            .await
            .unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, ModerationStatus::Rejected);
        assert_eq!(found.review_note.as_deref(), Some("Foto kurang jelas"));
        assert_eq!(repo.count_by_status(ModerationStatus::Rejected).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let pool = migrated_test_pool().await;
        let a = insert_user(&pool, "a_user").await;
        let b = insert_user(&pool, "b_user").await;
        let c = insert_user(&pool, "c_user").await;
        let repo = SqlxTalentRepository::new(pool);

        let t1 = repo.create(&talent(a, "Bayu", "bayu", "Fotografer")).await.unwrap();
        repo.create(&talent(b, "Citra", "citra", "Penari")).await.unwrap();
        let t3 = repo.create(&talent(c, "Ayu", "ayu", "fotografer")).await.unwrap();
        repo.set_status(t1.id, ModerationStatus::Approved, None).await.unwrap();
        repo.set_status(t3.id, ModerationStatus::Approved, None).await.unwrap();

        let params = ListParams::new(1, 10);

        let (public, total) = repo
            .list(&TalentFilter::public(None, None), &params)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(public[0].name, "Ayu");

        let (by_profession, _) = repo
            .list(&TalentFilter::public(None, Some("Fotografer".into())), &params)
            .await
            .unwrap();
        assert_eq!(by_profession.len(), 2);

        let (searched, _) = repo
            .list(&TalentFilter::public(Some("bay".into()), None), &params)
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);

        let (all, total) = repo.list(&TalentFilter::default(), &params).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = migrated_test_pool().await;
        let user_id = insert_user(&pool, "hilang").await;
        let repo = SqlxTalentRepository::new(pool);
        let created = repo.create(&talent(user_id, "Hilang", "hilang", "Penulis")).await.unwrap();

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
