//! User repository

use crate::db::DbPool;
use crate::models::{ListParams, User, UserFilter, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Lookup is case-insensitive
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable column of `user`
    async fn update(&self, user: &User) -> Result<User>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// Filtered listing, newest first. Returns the page and the total count.
    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, name, avatar, role, status, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, name, avatar, role, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(user.role.to_string())
        .bind(user.status.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(User {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by ID")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by username")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ? COLLATE NOCASE",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by email")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, password_hash = ?, name = ?, avatar = ?,
                role = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(user.role.to_string())
        .bind(user.status.to_string())
        .bind(now)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(row.get("count"))
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let role = filter.role.map(|r| r.to_string());
        let status = filter.status.map(|s| s.to_string());

        const WHERE: &str = r#"
            WHERE (?1 IS NULL OR username LIKE ?1 OR email LIKE ?1 OR name LIKE ?1)
              AND (?2 IS NULL OR role = ?2)
              AND (?3 IS NULL OR status = ?3)
        "#;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM users {} ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5",
            USER_COLUMNS, WHERE
        ))
        .bind(&pattern)
        .bind(&role)
        .bind(&status)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) as count FROM users {}", WHERE))
            .bind(&pattern)
            .bind(&role)
            .bind(&status)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?
            .get("count");

        let users = rows.iter().map(row_to_user).collect::<Result<Vec<_>>>()?;
        Ok((users, total))
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    let status_str: String = row.get("status");
    let status = UserStatus::from_str(&status_str)
        .with_context(|| format!("Invalid user status in database: {}", status_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        name: row.get("name"),
        avatar: row.get("avatar"),
        role,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_pool;

    async fn setup_test_repo() -> SqlxUserRepository {
        SqlxUserRepository::new(migrated_test_pool().await)
    }

    fn test_user(username: &str, email: &str) -> User {
        User::new(username.to_string(), email.to_string(), "hash".to_string(), UserRole::User)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo.create(&test_user("budi", "budi@example.com")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(found.username, "budi");
        assert_eq!(found.role, UserRole::User);
        assert_eq!(found.status, UserStatus::Active);

        assert!(repo.get_by_username("budi").await.unwrap().is_some());
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_email_is_case_insensitive() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("sari", "Sari@Example.com")).await.unwrap();

        let found = repo.get_by_email("sari@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.username), Some("sari".to_string()));
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&test_user("joko", "joko@example.com")).await.unwrap();

        user.name = Some("Joko Widodo".into());
        user.status = UserStatus::Banned;
        repo.update(&user).await.unwrap();

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Joko Widodo"));
        assert!(found.is_banned());
    }

    #[tokio::test]
    async fn test_update_password() {
        let repo = setup_test_repo().await;
        let user = repo.create(&test_user("rina", "rina@example.com")).await.unwrap();

        repo.update_password(user.id, "new-hash").await.unwrap();

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let repo = setup_test_repo().await;
        let mut admin = test_user("admin", "admin@example.com");
        admin.role = UserRole::Admin;
        repo.create(&admin).await.unwrap();
        repo.create(&test_user("budi", "budi@example.com")).await.unwrap();
        repo.create(&test_user("budiman", "budiman@example.com")).await.unwrap();

        let params = ListParams::new(1, 10);

        let (all, total) = repo.list(&UserFilter::default(), &params).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(total, 3);

        let filter = UserFilter {
            search: Some("budi".into()),
            ..Default::default()
        };
        let (found, total) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(total, 2);

        let filter = UserFilter {
            role: Some(UserRole::Admin),
            ..Default::default()
        };
        let (admins, _) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "admin");
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = setup_test_repo().await;
        for i in 0..5 {
            repo.create(&test_user(&format!("user{}", i), &format!("u{}@example.com", i)))
                .await
                .unwrap();
        }

        let (page, total) = repo.list(&UserFilter::default(), &ListParams::new(2, 2)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn test_count_and_delete() {
        let repo = setup_test_repo().await;
        let user = repo.create(&test_user("hapus", "hapus@example.com")).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.delete(user.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
