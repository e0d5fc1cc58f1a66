//! Comment repository

use crate::db::DbPool;
use crate::models::Comment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, article_id: i64, user_id: i64, content: &str) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Oldest first
    async fn list_by_article(&self, article_id: i64) -> Result<Vec<Comment>>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxCommentRepository {
    pool: DbPool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.article_id, c.user_id, c.content, c.created_at, c.updated_at,
           COALESCE(NULLIF(u.name, ''), u.username) AS author_name
    FROM comments c
    JOIN users u ON u.id = c.user_id
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, article_id: i64, user_id: i64, content: &str) -> Result<Comment> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO comments (article_id, user_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create comment")?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .context("Comment missing right after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get comment")?;

        Ok(row.as_ref().map(row_to_comment))
    }

    async fn list_by_article(&self, article_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.article_id = ? ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list comments")?;

        Ok(rows.iter().map(row_to_comment).collect())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }
}

fn row_to_comment(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        user_id: row.get("user_id"),
        author_name: row.get("author_name"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_pool;

    async fn seed(pool: &DbPool) -> (i64, i64) {
        let user_id = sqlx::query("INSERT INTO users (username, email, password_hash) VALUES ('budi', 'b@example.com', 'h')")
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid();
        let article_id = sqlx::query(
            "INSERT INTO articles (slug, title, content, content_html, channel, author_id) VALUES ('a', 'Artikel', 'x', 'x', 'detak', ?)",
        )
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
        (user_id, article_id)
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first() {
        let pool = migrated_test_pool().await;
        let (user_id, article_id) = seed(&pool).await;
        let repo = SqlxCommentRepository::new(pool);

        let first = repo.create(article_id, user_id, "Pertama").await.unwrap();
        repo.create(article_id, user_id, "Kedua").await.unwrap();

        assert_eq!(first.author_name, "budi");

        let comments = repo.list_by_article(article_id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "Pertama");
        assert_eq!(comments[1].content, "Kedua");
    }

    #[tokio::test]
    async fn test_delete_comment() {
        let pool = migrated_test_pool().await;
        let (user_id, article_id) = seed(&pool).await;
        let repo = SqlxCommentRepository::new(pool);

        let comment = repo.create(article_id, user_id, "Hapus saya").await.unwrap();
        repo.delete(comment.id).await.unwrap();

        assert!(repo.get_by_id(comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comments_removed_with_article() {
        let pool = migrated_test_pool().await;
        let (user_id, article_id) = seed(&pool).await;
        let repo = SqlxCommentRepository::new(pool.clone());
        repo.create(article_id, user_id, "Ikut terhapus").await.unwrap();

        sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(article_id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(repo.list_by_article(article_id).await.unwrap().is_empty());
    }
}
