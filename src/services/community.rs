//! Community service
//!
//! One community profile per user, moderated like talents. An approved
//! community is what lets its owner write in the dampak channel.

use crate::cache::{tags, Cache, CacheLayer};
use crate::db::repositories::{ArticleRepository, CommunityRepository};
use crate::models::{
    Article, ArticleChannel, ArticleFilter, ArticleStatus, Community, CommunityFilter, CommunityInput, ListParams,
    ModerationStatus, PagedResult, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::moderation::ModerationAction;
use crate::services::non_empty;
use crate::services::slug::{slug_or, unique_slug};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

const RECENT_ARTICLES: u32 = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityDetail {
    pub community: Community,
    /// Latest published dampak articles
    pub articles: Vec<Article>,
}

pub struct CommunityService {
    repo: Arc<dyn CommunityRepository>,
    article_repo: Arc<dyn ArticleRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CommunityService {
    pub fn new(repo: Arc<dyn CommunityRepository>, article_repo: Arc<dyn ArticleRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            article_repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn register(&self, actor: &User, input: CommunityInput) -> ServiceResult<Community> {
        input.validate()?;

        if self.repo.get_by_user(actor.id).await?.is_some() {
            return Err(ServiceError::conflict("You already have a community profile"));
        }

        let base = slug_or(None, &input.name, "komunitas");
        let repo = &self.repo;
        let slug = unique_slug(&base, |s| async move { repo.slug_exists(&s).await }).await?;

        let now = Utc::now();
        let community = Community {
            id: 0,
            user_id: actor.id,
            name: input.name.trim().to_string(),
            slug,
            description: non_empty(input.description),
            logo: non_empty(input.logo),
            location: non_empty(input.location),
            contact_email: non_empty(input.contact_email),
            instagram: non_empty(input.instagram),
            status: ModerationStatus::Pending,
            review_note: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&community).await?;
        tracing::info!(community_id = created.id, user_id = actor.id, "Community submitted for review");
        self.invalidate(&created.slug).await;
        Ok(created)
    }

    pub async fn my_community(&self, actor: &User) -> ServiceResult<Option<Community>> {
        Ok(self.repo.get_by_user(actor.id).await?)
    }

    pub async fn update_mine(&self, actor: &User, input: CommunityInput) -> ServiceResult<Community> {
        input.validate()?;

        let existing = self
            .repo
            .get_by_user(actor.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Community"))?;

        let status = existing
            .status
            .after_owner_edit()
            .ok_or_else(|| ServiceError::forbidden("A banned community cannot be edited"))?;

        let updated = Community {
            name: input.name.trim().to_string(),
            description: non_empty(input.description),
            logo: non_empty(input.logo),
            location: non_empty(input.location),
            contact_email: non_empty(input.contact_email),
            instagram: non_empty(input.instagram),
            status,
            review_note: if status == existing.status { existing.review_note.clone() } else { None },
            ..existing
        };

        let saved = self.repo.update(&updated).await?;
        self.invalidate(&saved.slug).await;
        Ok(saved)
    }

    pub async fn list_public(&self, search: Option<String>, params: &ListParams) -> ServiceResult<PagedResult<Community>> {
        let filter = CommunityFilter {
            search: non_empty(search),
            status: Some(ModerationStatus::Approved),
        };
        let key = format!(
            "communities:list:{}:{}:{}",
            filter.search.as_deref().unwrap_or(""),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Community>>(&key).await {
            return Ok(cached);
        }

        let (items, total) = self.repo.list(&filter, params).await?;
        let result = PagedResult::new(items, total, params);
        let _ = self
            .cache
            .set_tagged(&key, &result, &[tags::COMMUNITIES.to_string()], self.cache_ttl)
            .await;
        Ok(result)
    }

    pub async fn get_public(&self, slug: &str) -> ServiceResult<CommunityDetail> {
        let key = format!("community:{}", slug);
        if let Ok(Some(cached)) = self.cache.get::<CommunityDetail>(&key).await {
            return Ok(cached);
        }

        let community = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(|c| c.status.is_public())
            .ok_or_else(|| ServiceError::not_found("Community"))?;

        let filter = ArticleFilter {
            channel: Some(ArticleChannel::Dampak),
            status: Some(ArticleStatus::Published),
            community_id: Some(community.id),
            ..Default::default()
        };
        let (articles, _) = self
            .article_repo
            .list(&filter, &ListParams::new(1, RECENT_ARTICLES))
            .await?;

        let detail = CommunityDetail { community, articles };
        let tag_list = tags::list([
            tags::COMMUNITIES.to_string(),
            tags::community(slug),
            tags::ARTICLES.to_string(),
        ]);
        let _ = self.cache.set_tagged(&key, &detail, &tag_list, self.cache_ttl).await;
        Ok(detail)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Community> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Community"))
    }

    pub async fn list_all(&self, filter: &CommunityFilter, params: &ListParams) -> ServiceResult<PagedResult<Community>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn moderate(&self, id: i64, action: ModerationAction, note: Option<String>) -> ServiceResult<Community> {
        let community = self.get_by_id(id).await?;
        let next = action.apply(community.status)?;

        let note = match action {
            ModerationAction::Reject | ModerationAction::Ban => non_empty(note),
            _ => None,
        };
        self.repo.set_status(id, next, note.as_deref()).await?;
        tracing::info!(community_id = id, from = %community.status, to = %next, "Community status changed");

        self.invalidate(&community.slug).await;
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let community = self.get_by_id(id).await?;
        self.repo.delete(id).await?;
        tracing::info!(community_id = id, "Community deleted");
        self.invalidate(&community.slug).await;
        Ok(())
    }

    /// Dampak articles show the community name, so article pages go too
    async fn invalidate(&self, slug: &str) {
        let tag_list = tags::list([
            tags::COMMUNITIES.to_string(),
            tags::community(slug),
            tags::ARTICLES.to_string(),
        ]);
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate community cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::migrated_test_pool;
    use crate::db::repositories::{SqlxArticleRepository, SqlxCommunityRepository};
    use crate::models::UserRole;
    use crate::services::testing::create_user;

    fn service(pool: crate::db::DbPool) -> CommunityService {
        CommunityService::new(
            SqlxCommunityRepository::boxed(pool.clone()),
            SqlxArticleRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
        )
    }

    fn input(name: &str) -> CommunityInput {
        CommunityInput {
            name: name.into(),
            description: Some("Bersepeda tiap Minggu pagi".into()),
            location: Some("Kota Magelang".into()),
            contact_email: Some("halo@ksm.id".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_and_approve() {
        let pool = migrated_test_pool().await;
        let user = create_user(&pool, "ketua", UserRole::User).await;
        let svc = service(pool);

        let community = svc.register(&user, input("Komunitas Sepeda Magelang")).await.unwrap();
        assert_eq!(community.slug, "komunitas-sepeda-magelang");
        let pending = CommunityFilter {
            status: Some(ModerationStatus::Pending),
            ..Default::default()
        };
        assert_eq!(svc.list_all(&pending, &ListParams::default()).await.unwrap().total, 1);
        assert_eq!(svc.list_public(None, &ListParams::default()).await.unwrap().total, 0);

        svc.moderate(community.id, ModerationAction::Approve, None).await.unwrap();
        assert_eq!(svc.list_public(None, &ListParams::default()).await.unwrap().total, 1);

        let detail = svc.get_public("komunitas-sepeda-magelang").await.unwrap();
        assert_eq!(detail.community.id, community.id);
        assert!(detail.articles.is_empty());
    }

    #[tokio::test]
    async fn test_second_community_conflicts() {
        let pool = migrated_test_pool().await;
        let user = create_user(&pool, "ketua", UserRole::User).await;
        let svc = service(pool);

        svc.register(&user, input("Satu")).await.unwrap();
        assert!(matches!(
            svc.register(&user, input("Dua")).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_then_edit_resubmits() {
        let pool = migrated_test_pool().await;
        let user = create_user(&pool, "ketua", UserRole::User).await;
        let svc = service(pool);
        let community = svc.register(&user, input("Kopi Pagi")).await.unwrap();

        svc.moderate(community.id, ModerationAction::Reject, Some("Kurang jelas".into()))
            .await
            .unwrap();
        let edited = svc.update_mine(&user, input("Kopi Pagi Magelang")).await.unwrap();
        assert_eq!(edited.status, ModerationStatus::Pending);
        assert_eq!(edited.name, "Kopi Pagi Magelang");

        svc.delete(community.id).await.unwrap();
        assert!(svc.my_community(&user).await.unwrap().is_none());
    }
}
