//! Zhub directory service
//!
//! Admins curate categories and hub listings; visitors only see active hubs.

use crate::cache::{tags, Cache, CacheLayer};
use crate::db::repositories::{HubCategoryRepository, HubRepository};
use crate::models::{
    Hub, HubCategory, HubCategoryInput, HubFilter, HubInput, HubStatus, ListParams, PagedResult,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::non_empty;
use crate::services::slug::{generate_slug, slug_or, unique_slug};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

const CATEGORIES_KEY: &str = "hub-categories:all";

pub struct HubService {
    category_repo: Arc<dyn HubCategoryRepository>,
    repo: Arc<dyn HubRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl HubService {
    pub fn new(
        category_repo: Arc<dyn HubCategoryRepository>,
        repo: Arc<dyn HubRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            category_repo,
            repo,
            cache,
            cache_ttl,
        }
    }

    // ============================================================================
    // Categories
    // ============================================================================

    pub async fn list_categories(&self) -> ServiceResult<Vec<HubCategory>> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<HubCategory>>(CATEGORIES_KEY).await {
            return Ok(cached);
        }

        let categories = self.category_repo.list().await?;
        let _ = self
            .cache
            .set_tagged(
                CATEGORIES_KEY,
                &categories,
                &[tags::HUB_CATEGORIES.to_string()],
                self.cache_ttl,
            )
            .await;
        Ok(categories)
    }

    pub async fn get_category(&self, id: i64) -> ServiceResult<HubCategory> {
        self.category_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Hub category"))
    }

    pub async fn create_category(&self, input: HubCategoryInput) -> ServiceResult<HubCategory> {
        input.validate()?;

        let slug = slug_or(input.slug.as_deref(), &input.name, "kategori");
        if self.category_repo.slug_exists(&slug, None).await? {
            return Err(ServiceError::conflict(format!("Category slug '{}' is already in use", slug)));
        }

        let category = HubCategory {
            id: 0,
            name: input.name.trim().to_string(),
            slug,
            description: non_empty(input.description),
            sort_order: input.sort_order,
            created_at: Utc::now(),
        };
        let created = self.category_repo.create(&category).await?;
        tracing::info!(category_id = created.id, slug = %created.slug, "Hub category created");
        self.invalidate_categories().await;
        Ok(created)
    }

    pub async fn update_category(&self, id: i64, input: HubCategoryInput) -> ServiceResult<HubCategory> {
        input.validate()?;
        let existing = self.get_category(id).await?;

        let slug = match input.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None => existing.slug.clone(),
        };
        if slug != existing.slug && self.category_repo.slug_exists(&slug, Some(id)).await? {
            return Err(ServiceError::conflict(format!("Category slug '{}' is already in use", slug)));
        }

        let updated = HubCategory {
            name: input.name.trim().to_string(),
            slug,
            description: non_empty(input.description),
            sort_order: input.sort_order,
            ..existing
        };
        let saved = self.category_repo.update(&updated).await?;
        self.invalidate_categories().await;
        Ok(saved)
    }

    /// Refused while any hub still belongs to the category
    pub async fn delete_category(&self, id: i64) -> ServiceResult<()> {
        let category = self.get_category(id).await?;

        let in_use = self.category_repo.hub_count(id).await?;
        if in_use > 0 {
            return Err(ServiceError::conflict(format!(
                "Category '{}' still has {} hub(s)",
                category.name, in_use
            )));
        }

        self.category_repo.delete(id).await?;
        tracing::info!(category_id = id, "Hub category deleted");
        self.invalidate_categories().await;
        Ok(())
    }

    // ============================================================================
    // Hubs
    // ============================================================================

    pub async fn create_hub(&self, input: HubInput) -> ServiceResult<Hub> {
        input.validate()?;
        let category = self.category_for(input.category_id).await?;

        let explicit = input.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty());
        let slug = match explicit {
            Some(slug) => {
                if self.repo.slug_exists(&slug, None).await? {
                    return Err(ServiceError::conflict(format!("Hub slug '{}' is already in use", slug)));
                }
                slug
            }
            None => {
                let base = slug_or(None, &input.name, "zhub");
                let repo = &self.repo;
                unique_slug(&base, |s| async move { repo.slug_exists(&s, None).await }).await?
            }
        };

        let now = Utc::now();
        let hub = Hub {
            id: 0,
            category_id: category.id,
            category_name: category.name,
            category_slug: category.slug,
            name: input.name.trim().to_string(),
            slug,
            description: non_empty(input.description),
            image: non_empty(input.image),
            link: non_empty(input.link),
            status: HubStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        let created = self.repo.create(&hub).await?;
        tracing::info!(hub_id = created.id, slug = %created.slug, "Hub created");
        self.invalidate(&created.slug).await;
        Ok(created)
    }

    pub async fn update_hub(&self, id: i64, input: HubInput) -> ServiceResult<Hub> {
        input.validate()?;
        let existing = self.get_by_id(id).await?;
        let category = self.category_for(input.category_id).await?;

        let slug = match input.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None => existing.slug.clone(),
        };
        if slug != existing.slug && self.repo.slug_exists(&slug, Some(id)).await? {
            return Err(ServiceError::conflict(format!("Hub slug '{}' is already in use", slug)));
        }

        let updated = Hub {
            category_id: category.id,
            category_name: category.name,
            category_slug: category.slug,
            name: input.name.trim().to_string(),
            slug,
            description: non_empty(input.description),
            image: non_empty(input.image),
            link: non_empty(input.link),
            ..existing.clone()
        };
        let saved = self.repo.update(&updated).await?;
        self.invalidate(&existing.slug).await;
        self.invalidate(&saved.slug).await;
        Ok(saved)
    }

    pub async fn set_status(&self, id: i64, next: HubStatus) -> ServiceResult<Hub> {
        let hub = self.get_by_id(id).await?;
        if !hub.status.can_transition_to(next) {
            return Err(ServiceError::bad_transition(hub.status, next));
        }

        self.repo.set_status(id, next).await?;
        tracing::info!(hub_id = id, from = %hub.status, to = %next, "Hub status changed");
        self.invalidate(&hub.slug).await;
        self.get_by_id(id).await
    }

    pub async fn delete_hub(&self, id: i64) -> ServiceResult<()> {
        let hub = self.get_by_id(id).await?;
        self.repo.delete(id).await?;
        tracing::info!(hub_id = id, "Hub deleted");
        self.invalidate(&hub.slug).await;
        Ok(())
    }

    /// Active hubs, optionally narrowed to one category
    pub async fn list_public(
        &self,
        category_slug: Option<String>,
        search: Option<String>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Hub>> {
        let filter = HubFilter {
            category_slug: non_empty(category_slug),
            search: non_empty(search),
            status: Some(HubStatus::Active),
        };
        let key = format!(
            "hubs:list:{}:{}:{}:{}",
            filter.category_slug.as_deref().unwrap_or(""),
            filter.search.as_deref().unwrap_or(""),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Hub>>(&key).await {
            return Ok(cached);
        }

        let (items, total) = self.repo.list(&filter, params).await?;
        let result = PagedResult::new(items, total, params);
        let _ = self
            .cache
            .set_tagged(&key, &result, &[tags::HUBS.to_string()], self.cache_ttl)
            .await;
        Ok(result)
    }

    pub async fn get_public(&self, slug: &str) -> ServiceResult<Hub> {
        let key = format!("hub:{}", slug);
        if let Ok(Some(cached)) = self.cache.get::<Hub>(&key).await {
            return Ok(cached);
        }

        let hub = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(|h| h.status == HubStatus::Active)
            .ok_or_else(|| ServiceError::not_found("Hub"))?;

        let tag_list = tags::list([tags::HUBS.to_string(), tags::hub(slug)]);
        let _ = self.cache.set_tagged(&key, &hub, &tag_list, self.cache_ttl).await;
        Ok(hub)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Hub> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Hub"))
    }

    pub async fn list_all(&self, filter: &HubFilter, params: &ListParams) -> ServiceResult<PagedResult<Hub>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn category_for(&self, id: i64) -> ServiceResult<HubCategory> {
        self.category_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::validation(format!("Hub category {} does not exist", id)))
    }

    /// Hub rows embed the category name, so hub lists go as well
    async fn invalidate_categories(&self) {
        let tag_list = tags::list([tags::HUB_CATEGORIES, tags::HUBS]);
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate hub category cache: {}", e);
        }
    }

    async fn invalidate(&self, slug: &str) {
        let tag_list = tags::list([tags::HUBS.to_string(), tags::hub(slug)]);
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate hub cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::migrated_test_pool;
    use crate::db::repositories::{SqlxHubCategoryRepository, SqlxHubRepository};

    async fn service() -> HubService {
        let pool = migrated_test_pool().await;
        HubService::new(
            SqlxHubCategoryRepository::boxed(pool.clone()),
            SqlxHubRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
        )
    }

    fn category(name: &str) -> HubCategoryInput {
        HubCategoryInput {
            name: name.into(),
            ..Default::default()
        }
    }

    fn hub(category_id: i64, name: &str) -> HubInput {
        HubInput {
            category_id,
            name: name.into(),
            description: Some("Program pemuda".into()),
            link: Some("https://zhub.example.org".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_category_crud_and_conflicts() {
        let svc = service().await;

        let kreatif = svc.create_category(category("Ekonomi Kreatif")).await.unwrap();
        assert_eq!(kreatif.slug, "ekonomi-kreatif");
        assert!(matches!(
            svc.create_category(category("Ekonomi Kreatif")).await,
            Err(ServiceError::Conflict(_))
        ));

        let renamed = svc
            .update_category(
                kreatif.id,
                HubCategoryInput {
                    name: "Kreatif".into(),
                    sort_order: 3,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.slug, "ekonomi-kreatif");
        assert_eq!(renamed.sort_order, 3);
        assert_eq!(svc.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_category_in_use_cannot_be_deleted() {
        let svc = service().await;
        let cat = svc.create_category(category("Sosial")).await.unwrap();
        let listing = svc.create_hub(hub(cat.id, "Bank Sampah")).await.unwrap();

        assert!(matches!(svc.delete_category(cat.id).await, Err(ServiceError::Conflict(_))));

        svc.delete_hub(listing.id).await.unwrap();
        svc.delete_category(cat.id).await.unwrap();
        assert!(svc.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hub_requires_existing_category() {
        let svc = service().await;
        assert!(matches!(
            svc.create_hub(hub(99, "Yatim")).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_only_active_hubs_are_public() {
        let svc = service().await;
        let cat = svc.create_category(category("Pendidikan")).await.unwrap();
        let listing = svc.create_hub(hub(cat.id, "Kelas Koding")).await.unwrap();
        assert_eq!(listing.status, HubStatus::Draft);
        assert_eq!(listing.category_slug, "pendidikan");

        let params = ListParams::default();
        assert_eq!(svc.list_public(None, None, &params).await.unwrap().total, 0);
        assert!(matches!(svc.get_public("kelas-koding").await, Err(ServiceError::NotFound(_))));

        svc.set_status(listing.id, HubStatus::Active).await.unwrap();
        assert_eq!(svc.list_public(None, None, &params).await.unwrap().total, 1);
        assert_eq!(
            svc.list_public(Some("pendidikan".into()), None, &params).await.unwrap().total,
            1
        );
        assert_eq!(svc.get_public("kelas-koding").await.unwrap().id, listing.id);

        svc.set_status(listing.id, HubStatus::Archived).await.unwrap();
        assert!(matches!(svc.get_public("kelas-koding").await, Err(ServiceError::NotFound(_))));

        // Archived hubs can only come back as active
        assert!(matches!(
            svc.set_status(listing.id, HubStatus::Draft).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_hub_moves_category() {
        let svc = service().await;
        let a = svc.create_category(category("Seni")).await.unwrap();
        let b = svc.create_category(category("Olahraga")).await.unwrap();
        let listing = svc.create_hub(hub(a.id, "Lari Pagi")).await.unwrap();

        let moved = svc.update_hub(listing.id, hub(b.id, "Lari Pagi Bersama")).await.unwrap();
        assert_eq!(moved.category_slug, "olahraga");
        assert_eq!(moved.slug, "lari-pagi");
        assert_eq!(moved.status, HubStatus::Draft);
    }
}
