//! Article service
//!
//! Articles live in one of three channels, each with its own authoring rule:
//! - `gerak`: admins only
//! - `detak`: any active member
//! - `dampak`: owners of an approved community; the article is linked to it
//!
//! Content is Markdown, rendered to sanitized HTML on every save. Public
//! reads only ever see published articles.

use crate::cache::{tags, Cache, CacheLayer};
use crate::db::repositories::{ArticleRepository, CommunityRepository};
use crate::models::{
    Article, ArticleChannel, ArticleFilter, ArticleStatus, CreateArticleInput, ListParams,
    PagedResult, UpdateArticleInput, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::markdown::MarkdownRenderer;
use crate::services::non_empty;
use crate::services::slug::{generate_slug, is_reserved, slug_or, unique_slug};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Length of the excerpt generated when the author gives none
const EXCERPT_CHARS: usize = 200;

const LATEST_KEY: &str = "articles:latest";

/// Newest published article of each channel, for the home page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestArticles {
    pub gerak: Option<Article>,
    pub detak: Option<Article>,
    pub dampak: Option<Article>,
}

/// Public listing query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleQuery {
    pub channel: Option<ArticleChannel>,
    /// Community slug, for dampak listings
    pub community: Option<String>,
    pub search: Option<String>,
}

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    community_repo: Arc<dyn CommunityRepository>,
    cache: Arc<Cache>,
    markdown: MarkdownRenderer,
    cache_ttl: Duration,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        community_repo: Arc<dyn CommunityRepository>,
        cache: Arc<Cache>,
        markdown: MarkdownRenderer,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            community_repo,
            cache,
            markdown,
            cache_ttl,
        }
    }

    /// Create an article in `input.channel` on behalf of `actor`.
    ///
    /// # Errors
    /// - `Forbidden` when the actor may not write in the channel
    /// - `Conflict` when an explicit slug is taken
    pub async fn create(&self, actor: &User, input: CreateArticleInput) -> ServiceResult<Article> {
        input.validate()?;

        if !actor.is_active() {
            return Err(ServiceError::forbidden("Your account cannot publish articles"));
        }
        let community_id = self.channel_community(actor, input.channel).await?;

        let slug = self.resolve_slug(input.slug.as_deref(), &input.title, None).await?;
        let status = if input.publish {
            ArticleStatus::Published
        } else {
            ArticleStatus::Draft
        };

        let now = Utc::now();
        let article = Article {
            id: 0,
            slug,
            title: input.title.trim().to_string(),
            excerpt: self.excerpt_for(input.excerpt, &input.content),
            content_html: self.markdown.render(&input.content),
            content: input.content,
            cover_image: non_empty(input.cover_image),
            channel: input.channel,
            status,
            author_id: actor.id,
            author_name: actor.display_name().to_string(),
            community_id,
            community_name: None,
            community_slug: None,
            view_count: 0,
            published_at: (status == ArticleStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&article).await?;
        tracing::info!(
            article_id = created.id,
            channel = %created.channel,
            author_id = actor.id,
            "Article created"
        );
        self.invalidate(&[&created.slug]).await;
        Ok(created)
    }

    /// Edit title, slug, excerpt, content or cover. Channel and author stay.
    pub async fn update(&self, actor: &User, id: i64, input: UpdateArticleInput) -> ServiceResult<Article> {
        input.validate()?;

        let existing = self.get_for_edit(actor, id).await?;
        let slug = match input.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty()) {
            Some(slug) if slug != existing.slug => self.resolve_slug(Some(&slug), &input.title, Some(id)).await?,
            _ => existing.slug.clone(),
        };

        let updated = Article {
            slug,
            title: input.title.trim().to_string(),
            excerpt: self.excerpt_for(input.excerpt, &input.content),
            content_html: self.markdown.render(&input.content),
            content: input.content,
            cover_image: non_empty(input.cover_image),
            ..existing.clone()
        };

        let saved = self.repo.update(&updated).await?;
        tracing::info!(article_id = id, "Article updated");
        self.invalidate(&[&existing.slug, &saved.slug]).await;
        Ok(saved)
    }

    pub async fn publish(&self, actor: &User, id: i64) -> ServiceResult<Article> {
        let article = self.get_for_edit(actor, id).await?;
        self.transition(actor, article, ArticleStatus::Published).await
    }

    pub async fn unpublish(&self, actor: &User, id: i64) -> ServiceResult<Article> {
        let article = self.get_for_edit(actor, id).await?;
        self.transition(actor, article, ArticleStatus::Draft).await
    }

    /// Admin takedown
    pub async fn ban(&self, admin: &User, id: i64) -> ServiceResult<Article> {
        let article = self.get_by_id(id).await?;
        self.transition(admin, article, ArticleStatus::Banned).await
    }

    /// Lift a takedown; the article is published again
    pub async fn unban(&self, admin: &User, id: i64) -> ServiceResult<Article> {
        let article = self.get_by_id(id).await?;
        self.transition(admin, article, ArticleStatus::Published).await
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let article = self.get_by_id(id).await?;
        if !actor.can_manage(article.author_id) {
            return Err(ServiceError::forbidden("You cannot delete this article"));
        }

        self.repo.delete(id).await?;
        tracing::info!(article_id = id, actor_id = actor.id, "Article deleted");
        self.invalidate(&[&article.slug]).await;
        Ok(())
    }

    /// Published articles, newest first
    pub async fn list_public(&self, query: &ArticleQuery, params: &ListParams) -> ServiceResult<PagedResult<Article>> {
        let search = non_empty(query.search.clone());
        let community = non_empty(query.community.clone());
        let key = format!(
            "articles:list:{}:{}:{}:{}:{}",
            query.channel.map(|c| c.as_str()).unwrap_or(""),
            community.as_deref().unwrap_or(""),
            search.as_deref().unwrap_or(""),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Article>>(&key).await {
            return Ok(cached);
        }

        let community_id = match community.as_deref() {
            Some(slug) => match self.community_repo.get_by_slug(slug).await? {
                Some(c) if c.status.is_public() => Some(c.id),
                _ => return Ok(PagedResult::new(Vec::new(), 0, params)),
            },
            None => None,
        };

        let filter = ArticleFilter {
            channel: query.channel,
            status: Some(ArticleStatus::Published),
            community_id,
            search,
            ..Default::default()
        };
        let (items, total) = self.repo.list(&filter, params).await?;
        let result = PagedResult::new(items, total, params);
        let _ = self
            .cache
            .set_tagged(&key, &result, &[tags::ARTICLES.to_string()], self.cache_ttl)
            .await;
        Ok(result)
    }

    /// Published article by slug. Each call counts as one view.
    pub async fn get_public(&self, slug: &str) -> ServiceResult<Article> {
        let key = format!("article:{}", slug);
        let article = match self.cache.get::<Article>(&key).await {
            Ok(Some(cached)) => cached,
            _ => {
                let article = self
                    .repo
                    .get_by_slug(slug)
                    .await?
                    .filter(|a| a.is_published())
                    .ok_or_else(|| ServiceError::not_found("Article"))?;
                let tag_list = tags::list([tags::ARTICLES.to_string(), tags::article(slug)]);
                let _ = self.cache.set_tagged(&key, &article, &tag_list, self.cache_ttl).await;
                article
            }
        };

        if let Err(e) = self.repo.increment_view_count(article.id).await {
            tracing::warn!(article_id = article.id, "Failed to count view: {}", e);
        }
        Ok(article)
    }

    pub async fn latest_per_channel(&self) -> ServiceResult<LatestArticles> {
        if let Ok(Some(cached)) = self.cache.get::<LatestArticles>(LATEST_KEY).await {
            return Ok(cached);
        }

        let mut latest = LatestArticles::default();
        for channel in ArticleChannel::ALL {
            let filter = ArticleFilter {
                channel: Some(channel),
                status: Some(ArticleStatus::Published),
                ..Default::default()
            };
            let (mut items, _) = self.repo.list(&filter, &ListParams::new(1, 1)).await?;
            let newest = items.pop();
            match channel {
                ArticleChannel::Gerak => latest.gerak = newest,
                ArticleChannel::Detak => latest.detak = newest,
                ArticleChannel::Dampak => latest.dampak = newest,
            }
        }

        let _ = self
            .cache
            .set_tagged(LATEST_KEY, &latest, &[tags::ARTICLES.to_string()], self.cache_ttl)
            .await;
        Ok(latest)
    }

    /// The actor's own articles in any status
    pub async fn my_articles(&self, actor: &User, params: &ListParams) -> ServiceResult<PagedResult<Article>> {
        let filter = ArticleFilter {
            author_id: Some(actor.id),
            ..Default::default()
        };
        let (items, total) = self.repo.list(&filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_all(&self, filter: &ArticleFilter, params: &ListParams) -> ServiceResult<PagedResult<Article>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Article> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Article"))
    }

    /// Article the actor may edit. Authors lose access once it is banned.
    pub async fn get_for_edit(&self, actor: &User, id: i64) -> ServiceResult<Article> {
        let article = self.get_by_id(id).await?;
        if !actor.can_manage(article.author_id) {
            return Err(ServiceError::forbidden("You cannot edit this article"));
        }
        if article.status == ArticleStatus::Banned && !actor.is_admin() {
            return Err(ServiceError::forbidden("This article has been taken down"));
        }
        Ok(article)
    }

    /// Community the article belongs to, after checking the channel's authoring rule
    async fn channel_community(&self, actor: &User, channel: ArticleChannel) -> ServiceResult<Option<i64>> {
        match channel {
            ArticleChannel::Gerak if !actor.is_admin() => {
                Err(ServiceError::forbidden("Only admins can write in the gerak channel"))
            }
            ArticleChannel::Gerak | ArticleChannel::Detak => Ok(None),
            ArticleChannel::Dampak => {
                let community = self
                    .community_repo
                    .get_by_user(actor.id)
                    .await?
                    .filter(|c| c.status.is_public())
                    .ok_or_else(|| {
                        ServiceError::forbidden("An approved community is required to write in the dampak channel")
                    })?;
                Ok(Some(community.id))
            }
        }
    }

    /// An explicit slug must be free; a generated one gets a numeric suffix.
    async fn resolve_slug(&self, explicit: Option<&str>, title: &str, exclude_id: Option<i64>) -> ServiceResult<String> {
        let repo = &self.repo;
        let explicit = explicit.map(generate_slug).filter(|s| !s.is_empty());

        if let Some(slug) = explicit {
            if is_reserved(&slug) {
                return Err(ServiceError::validation(format!("Slug '{}' is reserved", slug)));
            }
            if repo.slug_exists(&slug, exclude_id).await? {
                return Err(ServiceError::conflict(format!("Slug '{}' is already in use", slug)));
            }
            return Ok(slug);
        }

        let base = slug_or(None, title, "artikel");
        let slug = unique_slug(&base, |s| async move { repo.slug_exists(&s, exclude_id).await }).await?;
        Ok(slug)
    }

    fn excerpt_for(&self, explicit: Option<String>, content: &str) -> Option<String> {
        non_empty(explicit).or_else(|| {
            let generated = self.markdown.excerpt(content, EXCERPT_CHARS);
            (!generated.is_empty()).then_some(generated)
        })
    }

    async fn transition(&self, actor: &User, article: Article, next: ArticleStatus) -> ServiceResult<Article> {
        if !article.status.can_transition_to(next, actor.is_admin()) {
            return Err(ServiceError::bad_transition(article.status, next));
        }

        let published_at = match (next, article.published_at) {
            (ArticleStatus::Published, None) => Some(Utc::now()),
            (_, existing) => existing,
        };
        let updated = Article {
            status: next,
            published_at,
            ..article
        };

        let saved = self.repo.update(&updated).await?;
        tracing::info!(article_id = saved.id, status = %next, actor_id = actor.id, "Article status changed");
        self.invalidate(&[&saved.slug]).await;
        Ok(saved)
    }

    async fn invalidate(&self, slugs: &[&str]) {
        let mut tag_list = vec![tags::ARTICLES.to_string(), tags::COMMENTS.to_string()];
        tag_list.extend(slugs.iter().map(|s| tags::article(s)));
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate article cache: {}", e);
        }
    }
}
