//! Comment service

use std::sync::Arc;
use std::time::Duration;

use validator::Validate;

use crate::cache::{tags, Cache, CacheLayer};
use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{Article, Comment, CreateCommentInput, User};
use crate::services::error::{ServiceError, ServiceResult};

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    article_repo: Arc<dyn ArticleRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, article_repo: Arc<dyn ArticleRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            article_repo,
            cache,
            cache_ttl,
        }
    }

    /// Comments of a published article, oldest first
    pub async fn list(&self, article_slug: &str) -> ServiceResult<Vec<Comment>> {
        let key = format!("comments:{}", article_slug);
        if let Ok(Some(cached)) = self.cache.get::<Vec<Comment>>(&key).await {
            return Ok(cached);
        }

        let article = self.published_article(article_slug).await?;
        let comments = self.repo.list_by_article(article.id).await?;

        let tag_list = tags::list([tags::COMMENTS.to_string(), tags::article(article_slug)]);
        let _ = self.cache.set_tagged(&key, &comments, &tag_list, self.cache_ttl).await;
        Ok(comments)
    }

    pub async fn create(&self, actor: &User, article_slug: &str, input: CreateCommentInput) -> ServiceResult<Comment> {
        input.validate()?;

        if !actor.is_active() {
            return Err(ServiceError::forbidden("Your account cannot comment"));
        }
        let article = self.published_article(article_slug).await?;

        let comment = self.repo.create(article.id, actor.id, input.content.trim()).await?;
        tracing::info!(comment_id = comment.id, article_id = article.id, user_id = actor.id, "Comment added");
        self.invalidate(&article.slug).await;
        Ok(comment)
    }

    /// Allowed for the commenter, the article's author and admins
    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let comment = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Comment"))?;
        let article = self
            .article_repo
            .get_by_id(comment.article_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Article"))?;

        if !actor.can_manage(comment.user_id) && actor.id != article.author_id {
            return Err(ServiceError::forbidden("You cannot delete this comment"));
        }

        self.repo.delete(id).await?;
        tracing::info!(comment_id = id, actor_id = actor.id, "Comment deleted");
        self.invalidate(&article.slug).await;
        Ok(())
    }

    async fn published_article(&self, slug: &str) -> ServiceResult<Article> {
        self.article_repo
            .get_by_slug(slug)
            .await?
            .filter(|a| a.is_published())
            .ok_or_else(|| ServiceError::not_found("Article"))
    }

    async fn invalidate(&self, article_slug: &str) {
        let tag_list = tags::list([tags::COMMENTS.to_string(), tags::article(article_slug)]);
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate comment cache: {}", e);
        }
    }
}
