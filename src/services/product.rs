//! Product service
//!
//! Products hang off a talent. Only the owner of an approved talent can add
//! them, every new product waits for review, and a product is public only
//! while both it and its talent are approved.

use crate::cache::{tags, Cache, CacheLayer};
use crate::db::repositories::{ProductRepository, TalentRepository};
use crate::models::{
    ListParams, ModerationStatus, PagedResult, Product, ProductFilter, ProductInput, Talent, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::moderation::ModerationAction;
use crate::services::non_empty;
use crate::services::slug::{slug_or, unique_slug};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
    talent_repo: Arc<dyn TalentRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductRepository>, talent_repo: Arc<dyn TalentRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            talent_repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn create(&self, actor: &User, input: ProductInput) -> ServiceResult<Product> {
        input.validate()?;

        let talent = self
            .talent_repo
            .get_by_user(actor.id)
            .await?
            .filter(|t| t.status.is_public())
            .ok_or_else(|| ServiceError::forbidden("An approved talent profile is required to add products"))?;

        let base = slug_or(None, &input.name, "produk");
        let repo = &self.repo;
        let slug = unique_slug(&base, |s| async move { repo.slug_exists(&s).await }).await?;

        let now = Utc::now();
        let product = Product {
            id: 0,
            talent_id: talent.id,
            talent_name: talent.name.clone(),
            talent_slug: talent.slug.clone(),
            talent_status: talent.status,
            name: input.name.trim().to_string(),
            slug,
            description: non_empty(input.description),
            price: input.price,
            image: non_empty(input.image),
            link: non_empty(input.link),
            status: ModerationStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&product).await?;
        tracing::info!(product_id = created.id, talent_id = talent.id, "Product submitted for review");
        self.invalidate(&created).await;
        Ok(created)
    }

    /// Owner or admin edit. An owner's edit sends a rejected product back to review.
    pub async fn update(&self, actor: &User, id: i64, input: ProductInput) -> ServiceResult<Product> {
        input.validate()?;

        let (existing, _) = self.get_owned(actor, id).await?;
        let status = if actor.is_admin() {
            existing.status
        } else {
            existing
                .status
                .after_owner_edit()
                .ok_or_else(|| ServiceError::forbidden("A banned product cannot be edited"))?
        };

        let updated = Product {
            name: input.name.trim().to_string(),
            description: non_empty(input.description),
            price: input.price,
            image: non_empty(input.image),
            link: non_empty(input.link),
            status,
            ..existing
        };

        let saved = self.repo.update(&updated).await?;
        self.invalidate(&saved).await;
        Ok(saved)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let (product, _) = self.get_owned(actor, id).await?;
        self.repo.delete(id).await?;
        tracing::info!(product_id = id, actor_id = actor.id, "Product deleted");
        self.invalidate(&product).await;
        Ok(())
    }

    /// Public products, optionally of one talent (by slug)
    pub async fn list_public(
        &self,
        search: Option<String>,
        talent_slug: Option<String>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Product>> {
        let search = non_empty(search);
        let talent_slug = non_empty(talent_slug);
        let key = format!(
            "products:list:{}:{}:{}:{}",
            search.as_deref().unwrap_or(""),
            talent_slug.as_deref().unwrap_or(""),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Product>>(&key).await {
            return Ok(cached);
        }

        let talent_id = match talent_slug.as_deref() {
            Some(slug) => match self.talent_repo.get_by_slug(slug).await? {
                Some(t) => Some(t.id),
                None => return Ok(PagedResult::new(Vec::new(), 0, params)),
            },
            None => None,
        };

        let (items, total) = self.repo.list(&ProductFilter::public(search, talent_id), params).await?;
        let result = PagedResult::new(items, total, params);
        let _ = self
            .cache
            .set_tagged(&key, &result, &[tags::PRODUCTS.to_string()], self.cache_ttl)
            .await;
        Ok(result)
    }

    pub async fn get_public(&self, slug: &str) -> ServiceResult<Product> {
        let key = format!("product:{}", slug);
        if let Ok(Some(cached)) = self.cache.get::<Product>(&key).await {
            return Ok(cached);
        }

        let product = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(|p| p.is_public())
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        let tag_list = tags::list([
            tags::PRODUCTS.to_string(),
            tags::product(slug),
            tags::talent(&product.talent_slug),
        ]);
        let _ = self.cache.set_tagged(&key, &product, &tag_list, self.cache_ttl).await;
        Ok(product)
    }

    /// Every product of the actor's talent, any status
    pub async fn my_products(&self, actor: &User) -> ServiceResult<Vec<Product>> {
        match self.talent_repo.get_by_user(actor.id).await? {
            Some(talent) => Ok(self.repo.list_by_talent(talent.id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Product> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))
    }

    pub async fn list_all(&self, filter: &ProductFilter, params: &ListParams) -> ServiceResult<PagedResult<Product>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn moderate(&self, id: i64, action: ModerationAction) -> ServiceResult<Product> {
        let product = self.get_by_id(id).await?;
        let next = action.apply(product.status)?;

        self.repo.set_status(id, next).await?;
        tracing::info!(product_id = id, from = %product.status, to = %next, "Product status changed");

        self.invalidate(&product).await;
        self.get_by_id(id).await
    }

    /// Product plus its talent, if the actor owns the talent or is an admin
    async fn get_owned(&self, actor: &User, id: i64) -> ServiceResult<(Product, Talent)> {
        let product = self.get_by_id(id).await?;
        let talent = self
            .talent_repo
            .get_by_id(product.talent_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Talent"))?;

        if !actor.can_manage(talent.user_id) {
            return Err(ServiceError::forbidden("You cannot manage this product"));
        }
        Ok((product, talent))
    }

    async fn invalidate(&self, product: &Product) {
        let tag_list = tags::list([
            tags::PRODUCTS.to_string(),
            tags::product(&product.slug),
            tags::talent(&product.talent_slug),
        ]);
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate product cache: {}", e);
        }
    }
}
