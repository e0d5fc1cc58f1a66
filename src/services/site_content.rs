//! Site content service
//!
//! Everything an admin edits from the CMS screens that is not a talent,
//! community or article: the app data groups (site, hero, about, branding,
//! contact), partners, social media links and legal pages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

use crate::cache::{tags, Cache, CacheLayer};
use crate::db::repositories::{
    AppDataRepository, LegalPageRepository, PartnerRepository, SocialMediaRepository,
};
use crate::models::{
    AboutContent, AppData, AppDataGroup, Branding, ContactInfo, HeroContent, LegalPage, LegalPageInput,
    OrderItem, Partner, PartnerInput, SiteInfo, SocialMedia, SocialMediaInput,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::markdown::MarkdownRenderer;
use crate::services::non_empty;
use crate::services::slug::{generate_slug, slug_or};

const APP_DATA_KEY: &str = "app-data";
const PARTNERS_KEY: &str = "partners:all";
const SOCIALS_KEY: &str = "socials:all";
const LEGAL_KEY: &str = "legal:all";

pub struct SiteContentService {
    app_data_repo: Arc<dyn AppDataRepository>,
    partner_repo: Arc<dyn PartnerRepository>,
    social_repo: Arc<dyn SocialMediaRepository>,
    legal_repo: Arc<dyn LegalPageRepository>,
    cache: Arc<Cache>,
    markdown: MarkdownRenderer,
    cache_ttl: Duration,
}

impl SiteContentService {
    pub fn new(
        app_data_repo: Arc<dyn AppDataRepository>,
        partner_repo: Arc<dyn PartnerRepository>,
        social_repo: Arc<dyn SocialMediaRepository>,
        legal_repo: Arc<dyn LegalPageRepository>,
        cache: Arc<Cache>,
        markdown: MarkdownRenderer,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            app_data_repo,
            partner_repo,
            social_repo,
            legal_repo,
            cache,
            markdown,
            cache_ttl,
        }
    }

    // ============================================================================
    // App data
    // ============================================================================

    /// All groups, with defaults for anything never saved
    pub async fn get_app_data(&self) -> ServiceResult<AppData> {
        self.cached(APP_DATA_KEY, tags::APP_DATA, || async {
            let map = self.app_data_repo.get_all().await?;
            Ok(AppData::from_map(&map))
        })
        .await
    }

    pub async fn update_site(&self, site: SiteInfo) -> ServiceResult<AppData> {
        self.save_group(site).await
    }

    pub async fn update_hero(&self, hero: HeroContent) -> ServiceResult<AppData> {
        self.save_group(hero).await
    }

    pub async fn update_about(&self, about: AboutContent) -> ServiceResult<AppData> {
        self.save_group(about).await
    }

    pub async fn update_branding(&self, branding: Branding) -> ServiceResult<AppData> {
        self.save_group(branding).await
    }

    pub async fn update_contact(&self, contact: ContactInfo) -> ServiceResult<AppData> {
        self.save_group(contact).await
    }

    async fn save_group<G: AppDataGroup + Validate>(&self, group: G) -> ServiceResult<AppData> {
        group.validate()?;
        self.app_data_repo.set_many(&group.to_pairs()).await?;
        tracing::info!(group = G::PREFIX, "App data updated");
        self.invalidate(&[tags::APP_DATA]).await;
        self.get_app_data().await
    }

    // ============================================================================
    // Partners
    // ============================================================================

    pub async fn list_partners(&self) -> ServiceResult<Vec<Partner>> {
        self.cached(PARTNERS_KEY, tags::PARTNERS, || async { Ok(self.partner_repo.list().await?) })
            .await
    }

    pub async fn create_partner(&self, input: PartnerInput) -> ServiceResult<Partner> {
        input.validate()?;

        let sort_order = match input.sort_order {
            Some(order) => order,
            None => self.partner_repo.next_sort_order().await?,
        };
        let now = Utc::now();
        let partner = Partner {
            id: 0,
            name: input.name.trim().to_string(),
            logo: non_empty(input.logo),
            url: non_empty(input.url),
            sort_order,
            created_at: now,
            updated_at: now,
        };

        let created = self.partner_repo.create(&partner).await?;
        tracing::info!(partner_id = created.id, "Partner created");
        self.invalidate(&[tags::PARTNERS]).await;
        Ok(created)
    }

    pub async fn update_partner(&self, id: i64, input: PartnerInput) -> ServiceResult<Partner> {
        input.validate()?;

        let existing = self
            .partner_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Partner"))?;
        let updated = Partner {
            name: input.name.trim().to_string(),
            logo: non_empty(input.logo),
            url: non_empty(input.url),
            sort_order: input.sort_order.unwrap_or(existing.sort_order),
            ..existing
        };

        let saved = self.partner_repo.update(&updated).await?;
        self.invalidate(&[tags::PARTNERS]).await;
        Ok(saved)
    }

    pub async fn delete_partner(&self, id: i64) -> ServiceResult<()> {
        if self.partner_repo.get_by_id(id).await?.is_none() {
            return Err(ServiceError::not_found("Partner"));
        }
        self.partner_repo.delete(id).await?;
        tracing::info!(partner_id = id, "Partner deleted");
        self.invalidate(&[tags::PARTNERS]).await;
        Ok(())
    }

    pub async fn reorder_partners(&self, order: &[OrderItem]) -> ServiceResult<Vec<Partner>> {
        for item in order {
            if self.partner_repo.get_by_id(item.id).await?.is_none() {
                return Err(ServiceError::not_found(format!("Partner {}", item.id)));
            }
        }
        for item in order {
            self.partner_repo.update_order(item.id, item.sort_order).await?;
        }
        self.invalidate(&[tags::PARTNERS]).await;
        self.list_partners().await
    }

    // ============================================================================
    // Social media
    // ============================================================================

    pub async fn list_socials(&self) -> ServiceResult<Vec<SocialMedia>> {
        self.cached(SOCIALS_KEY, tags::SOCIALS, || async { Ok(self.social_repo.list().await?) })
            .await
    }

    pub async fn create_social(&self, input: SocialMediaInput) -> ServiceResult<SocialMedia> {
        input.validate()?;

        let sort_order = match input.sort_order {
            Some(order) => order,
            None => self.social_repo.next_sort_order().await?,
        };
        let now = Utc::now();
        let item = SocialMedia {
            id: 0,
            platform: input.platform.trim().to_lowercase(),
            url: input.url.trim().to_string(),
            handle: non_empty(input.handle),
            sort_order,
            created_at: now,
            updated_at: now,
        };

        let created = self.social_repo.create(&item).await?;
        tracing::info!(social_id = created.id, platform = %created.platform, "Social link created");
        self.invalidate(&[tags::SOCIALS]).await;
        Ok(created)
    }

    pub async fn update_social(&self, id: i64, input: SocialMediaInput) -> ServiceResult<SocialMedia> {
        input.validate()?;

        let existing = self
            .social_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Social media link"))?;
        let updated = SocialMedia {
            platform: input.platform.trim().to_lowercase(),
            url: input.url.trim().to_string(),
            handle: non_empty(input.handle),
            sort_order: input.sort_order.unwrap_or(existing.sort_order),
            ..existing
        };

        let saved = self.social_repo.update(&updated).await?;
        self.invalidate(&[tags::SOCIALS]).await;
        Ok(saved)
    }

    pub async fn delete_social(&self, id: i64) -> ServiceResult<()> {
        if self.social_repo.get_by_id(id).await?.is_none() {
            return Err(ServiceError::not_found("Social media link"));
        }
        self.social_repo.delete(id).await?;
        tracing::info!(social_id = id, "Social link deleted");
        self.invalidate(&[tags::SOCIALS]).await;
        Ok(())
    }

    pub async fn reorder_socials(&self, order: &[OrderItem]) -> ServiceResult<Vec<SocialMedia>> {
        for item in order {
            if self.social_repo.get_by_id(item.id).await?.is_none() {
                return Err(ServiceError::not_found(format!("Social media link {}", item.id)));
            }
        }
        for item in order {
            self.social_repo.update_order(item.id, item.sort_order).await?;
        }
        self.invalidate(&[tags::SOCIALS]).await;
        self.list_socials().await
    }

    // ============================================================================
    // Legal pages
    // ============================================================================

    pub async fn list_legal_pages(&self) -> ServiceResult<Vec<LegalPage>> {
        self.cached(LEGAL_KEY, tags::LEGAL, || async { Ok(self.legal_repo.list().await?) })
            .await
    }

    pub async fn get_legal_page(&self, slug: &str) -> ServiceResult<LegalPage> {
        let key = tags::legal_page(slug);
        if let Ok(Some(cached)) = self.cache.get::<LegalPage>(&key).await {
            return Ok(cached);
        }

        let page = self
            .legal_repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("Legal page"))?;
        let tag_list = tags::list([tags::LEGAL.to_string(), tags::legal_page(slug)]);
        let _ = self.cache.set_tagged(&key, &page, &tag_list, self.cache_ttl).await;
        Ok(page)
    }

    pub async fn create_legal_page(&self, input: LegalPageInput) -> ServiceResult<LegalPage> {
        input.validate()?;

        let slug = slug_or(input.slug.as_deref(), &input.title, "halaman");
        if self.legal_repo.slug_exists(&slug, None).await? {
            return Err(ServiceError::conflict(format!("Legal page '{}' already exists", slug)));
        }

        let now = Utc::now();
        let page = LegalPage {
            id: 0,
            slug,
            title: input.title.trim().to_string(),
            content_html: self.markdown.render(&input.content),
            content: input.content,
            created_at: now,
            updated_at: now,
        };

        let created = self.legal_repo.create(&page).await?;
        tracing::info!(page_id = created.id, slug = %created.slug, "Legal page created");
        self.invalidate(&[tags::LEGAL]).await;
        Ok(created)
    }

    pub async fn update_legal_page(&self, id: i64, input: LegalPageInput) -> ServiceResult<LegalPage> {
        input.validate()?;

        let existing = self
            .legal_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Legal page"))?;
        let slug = input
            .slug
            .as_deref()
            .map(generate_slug)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| existing.slug.clone());
        if slug != existing.slug && self.legal_repo.slug_exists(&slug, Some(id)).await? {
            return Err(ServiceError::conflict(format!("Legal page '{}' already exists", slug)));
        }

        let updated = LegalPage {
            slug,
            title: input.title.trim().to_string(),
            content_html: self.markdown.render(&input.content),
            content: input.content,
            ..existing
        };

        let saved = self.legal_repo.update(&updated).await?;
        self.invalidate(&[tags::LEGAL]).await;
        Ok(saved)
    }

    pub async fn delete_legal_page(&self, id: i64) -> ServiceResult<()> {
        if self.legal_repo.get_by_id(id).await?.is_none() {
            return Err(ServiceError::not_found("Legal page"));
        }
        self.legal_repo.delete(id).await?;
        tracing::info!(page_id = id, "Legal page deleted");
        self.invalidate(&[tags::LEGAL]).await;
        Ok(())
    }

    /// Cache-aside read under a single tag
    async fn cached<T, F, Fut>(&self, key: &str, tag: &str, load: F) -> ServiceResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ServiceResult<T>>,
    {
        if let Ok(Some(cached)) = self.cache.get::<T>(key).await {
            return Ok(cached);
        }

        let value = load().await?;
        let _ = self
            .cache
            .set_tagged(key, &value, &[tag.to_string()], self.cache_ttl)
            .await;
        Ok(value)
    }

    /// Every legal page is tagged `legal`, so that tag covers single pages too
    async fn invalidate(&self, tag_names: &[&str]) {
        let tag_list = tags::list(tag_names.iter().copied());
        if let Err(e) = self.cache.invalidate_tags(&tag_list).await {
            tracing::warn!("Failed to invalidate site content cache: {}", e);
        }
    }
}
