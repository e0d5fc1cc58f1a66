//! Talent service
//!
//! Users submit one talent profile each; admins moderate it. Only approved
//! talents (and their approved products) are public.

use crate::cache::{tags, Cache, CacheLayer};
use crate::db::repositories::{ProductRepository, TalentRepository};
use crate::models::{
    ListParams, ModerationStatus, PagedResult, Product, ProductFilter, Talent, TalentFilter, TalentInput, User,
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

/// Public talent page: the profile plus its visible products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentDetail {
    pub talent: Talent,
    pub products: Vec<Product>,
}

pub struct TalentService {
    repo: Arc<dyn TalentRepository>,
    product_repo: Arc<dyn ProductRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl TalentService {
    pub fn new(repo: Arc<dyn TalentRepository>, product_repo: Arc<dyn ProductRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            product_repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn register(&self, actor: &User, input: TalentInput) -> ServiceResult<Talent> {
        input.validate()?;

        if self.repo.get_by_user(actor.id).await?.is_some() {
            return Err(ServiceError::conflict("You already have a talent profile"));
        }

        let base = slug_or(None, &input.name, "talenta");
        let repo = &self.repo;
        let slug = unique_slug(&base, |s| async move { repo.slug_exists(&s).await }).await?;

        let now = Utc::now();
        let talent = Talent {
            id: 0,
            user_id: actor.id,
            name: input.name.trim().to_string(),
            slug,
            profession: input.profession.trim().to_string(),
            bio: non_empty(input.bio),
            image: non_empty(input.image),
            instagram: non_empty(input.instagram),
            website: non_empty(input.website),
            status: ModerationStatus::Pending,
            review_note: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&talent).await?;
        tracing::info!(talent_id = created.id, user_id = actor.id, "Talent submitted for review");
        self.invalidate(&created.slug).await;
        Ok(created)
    }

    pub async fn my_talent(&self, actor: &User) -> ServiceResult<Option<Talent>> {
        Ok(self.repo.get_by_user(actor.id).await?)
    }

    /// Owner edit. A rejected profile goes back to review; a banned one is locked.
    pub async fn update_mine(&self, actor: &User, input: TalentInput) -> ServiceResult<Talent> {
        input.validate()?;

        let existing = self
            .repo
            .get_by_user(actor.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Talent"))?;

        let status = existing
            .status
            .after_owner_edit()
            .ok_or_else(|| ServiceError::forbidden("A banned talent profile cannot be edited"))?;

        let updated = Talent {
            name: input.name.trim().to_string(),
            profession: input.profession.trim().to_string(),
            bio: non_empty(input.bio),
            image: non_empty(input.image),
            instagram: non_empty(input.instagram),
            website: non_empty(input.website),
            status,
            review_note: if status == existing.status { existing.review_note.clone() } else { None },
            ..existing
        };

        let saved = self.repo.update(&updated).await?;
        self.invalidate(&saved.slug).await;
        Ok(saved)
    }

    pub async fn list_public(
        &self,
        search: Option<String>,
        profession: Option<String>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Talent>> {
        let filter = TalentFilter::public(non_empty(search), non_empty(profession));
        let key = format!(
            "talents:list:{}:{}:{}:{}",
            filter.search.as_deref().unwrap_or(""),
            filter.profession.as_deref().unwrap_or(""),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Talent>>(&key).await {
            return Ok(cached);
        }

        let (items, total) = self.repo.list(&filter, params).await?;
        let result = PagedResult::new(items, total, params);
        let _ = self
            .cache
            .set_tagged(&key, &result, &[tags::TALENTS.to_string()], self.cache_ttl)
            .await;
        Ok(result)
    }

    /// Approved talent with its public products
    pub async fn get_public(&self, slug: &str) -> ServiceResult<TalentDetail> {
        let key = format!("talent:{}", slug);
        if let Ok(Some(cached)) = self.cache.get::<TalentDetail>(&key).await {
            return Ok(cached);
        }

        let talent = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(|t| t.status.is_public())
            .ok_or_else(|| ServiceError::not_found("Talent"))?;

        let filter = ProductFilter::public(None, Some(talent.id));
        let (products, _) = self.product_repo.list(&filter, &ListParams::new(1, 100)).await?;

        let detail = TalentDetail { talent, products };
        let tag_list = tags::list([tags::TALENTS.to_string(), tags::talent(slug), tags::PRODUCTS.to_string()]);
        let _ = self.cache.set_tagged(&key, &detail, &tag_list, self.cache_ttl).await;
        Ok(detail)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Talent> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Talent"))
    }

    pub async fn list_all(&self, filter: &TalentFilter, params: &ListParams) -> ServiceResult<PagedResult<Talent>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Apply an admin moderation action. `note` is kept for reject and ban.
    pub async fn moderate(&self, id: i64, action: ModerationAction, note: Option<String>) -> ServiceResult<Talent> {
        let talent = self.get_by_id(id).await?;
        let next = action.apply(talent.status)?;

        let note = match action {
            ModerationAction::Reject | ModerationAction::Ban => non_empty(note),
            _ => None,
        };
        self.repo.set_status(id, next, note.as_deref()).await?;
        tracing::info!(talent_id = id, from = %talent.status, to = %next, "Talent status changed");

        self.invalidate(&talent.slug).await;
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let talent = self.get_by_id(id).await?;
        self.repo.delete(id).await?;
        tracing::info!(talent_id = id, "Talent deleted");
        self.invalidate(&talent.slug).await;
        Ok(())
    }

    /// Product visibility follows the talent, so product pages go too
    async fn invalidate(&self, slug: &str) {
        let tag_list = tags::list([tags::TALENTS.to_string(), tags::talent(slug), tags::PRODUCTS.to_string()]);
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate talent cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::migrated_test_pool;
    use crate::db::repositories::{SqlxProductRepository, SqlxTalentRepository};
    use crate::models::UserRole;
    use crate::services::testing::create_user;

    fn service(pool: crate::db::DbPool) -> TalentService {
        TalentService::new(
            SqlxTalentRepository::boxed(pool.clone()),
            SqlxProductRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
        )
    }

    fn input(name: &str) -> TalentInput {
        TalentInput {
            name: name.into(),
            profession: "Fotografer".into(),
            bio: Some("Memotret Magelang".into()),
            image: None,
            instagram: Some("@foto.mgl".into()),
            website: None,
        }
    }

    #[tokio::test]
    async fn test_register_once_per_user() {
        let pool = migrated_test_pool().await;
        let user = create_user(&pool, "budi", UserRole::User).await;
        let svc = service(pool);

        let talent = svc.register(&user, input("Budi Santoso")).await.unwrap();
        assert_eq!(talent.slug, "budi-santoso");
        assert_eq!(talent.status, ModerationStatus::Pending);
        assert!(talent.website.is_none());

        let again = svc.register(&user, input("Budi Lagi")).await;
        assert!(matches!(again, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_slug_collision_gets_suffix() {
        let pool = migrated_test_pool().await;
        let a = create_user(&pool, "a_user", UserRole::User).await;
        let b = create_user(&pool, "b_user", UserRole::User).await;
        let svc = service(pool);

        svc.register(&a, input("Sari Dewi")).await.unwrap();
        let second = svc.register(&b, input("Sari Dewi")).await.unwrap();
        assert_eq!(second.slug, "sari-dewi-2");
    }

    #[tokio::test]
    async fn test_moderation_and_visibility() {
        let pool = migrated_test_pool().await;
        let user = create_user(&pool, "rina", UserRole::User).await;
        let svc = service(pool);
        let talent = svc.register(&user, input("Rina")).await.unwrap();

        // Pending is hidden and cannot jump straight to banned
        assert!(matches!(svc.get_public("rina").await, Err(ServiceError::NotFound(_))));
        let early_ban = svc.moderate(talent.id, ModerationAction::Ban, None).await;
        assert!(matches!(early_ban, Err(ServiceError::Validation(_))));

        svc.moderate(talent.id, ModerationAction::Approve, None).await.unwrap();
        assert_eq!(svc.get_public("rina").await.unwrap().talent.id, talent.id);
        let listed = svc.list_public(None, None, &ListParams::default()).await.unwrap();
        assert_eq!(listed.total, 1);

        // Cached detail is evicted on ban
        svc.moderate(talent.id, ModerationAction::Ban, Some("Spam".into())).await.unwrap();
        assert!(matches!(svc.get_public("rina").await, Err(ServiceError::NotFound(_))));
        let listed = svc.list_public(None, None, &ListParams::default()).await.unwrap();
        assert_eq!(listed.total, 0);

        let unbanned = svc.moderate(talent.id, ModerationAction::Unban, None).await.unwrap();
        assert_eq!(unbanned.status, ModerationStatus::Approved);
    }

    #[tokio::test]
    async fn test_owner_edit_resubmits_rejected_and_locks_banned() {
        let pool = migrated_test_pool().await;
        let user = create_user(&pool, "joko", UserRole::User).await;
        let svc = service(pool);
        let talent = svc.register(&user, input("Joko")).await.unwrap();

        let rejected = svc
            .moderate(talent.id, ModerationAction::Reject, Some("Lengkapi bio".into()))
            .await
            .unwrap();
        assert_eq!(rejected.review_note.as_deref(), Some("Lengkapi bio"));

        let edited = svc.update_mine(&user, input("Joko Widodo")).await.unwrap();
        assert_eq!(edited.status, ModerationStatus::Pending);
        assert!(edited.review_note.is_none());
        assert_eq!(edited.slug, talent.slug);

        svc.moderate(talent.id, ModerationAction::Approve, None).await.unwrap();
        svc.moderate(talent.id, ModerationAction::Ban, None).await.unwrap();
        let locked = svc.update_mine(&user, input("Joko Lagi")).await;
        assert!(matches!(locked, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let pool = migrated_test_pool().await;
        let user = create_user(&pool, "tono", UserRole::User).await;
        let svc = service(pool);

        let mut bad = input("T");
        bad.instagram = Some("bukan handle!".into());
        match svc.register(&user, bad).await {
            Err(ServiceError::InvalidFields(errors)) => {
                assert!(errors.field_errors().contains_key("name"));
                assert!(errors.field_errors().contains_key("instagram"));
            }
            other => panic!("expected field errors, got {:?}", other),
        }
    }
}
