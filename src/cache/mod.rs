//! Cache layer
//!
//! Cache-aside storage for public reads. Keys are registered under
//! revalidation tags; every mutation invalidates the tags it touches.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pemuda_magelang::cache::{create_cache, tags, CacheLayer};
//!
//! let cache = create_cache(&config.cache);
//! cache.set_tagged("talent:budi", &talent, &[tags::TALENTS.into()], ttl).await?;
//! cache.invalidate_tags(&[tags::TALENTS.into()]).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// The cache shared by all services
pub type Cache = MemoryCache;

/// Cache layer trait
///
/// Generic methods keep this from being object safe; services hold the
/// concrete [`Cache`] behind an `Arc`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Store a value and register its key under every tag
    async fn set_tagged<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        tags: &[String],
        ttl: Duration,
    ) -> Result<()>;

    /// Evict every key registered under any of `tags`
    async fn invalidate_tags(&self, tags: &[String]) -> Result<()>;
}

/// Revalidation tag names
pub mod tags {
    pub const TALENTS: &str = "talents";
    pub const COMMUNITIES: &str = "communities";
    pub const ARTICLES: &str = "articles";
    pub const COMMENTS: &str = "comments";
    pub const PRODUCTS: &str = "products";
    pub const HUBS: &str = "hubs";
    pub const HUB_CATEGORIES: &str = "hub-categories";
    pub const APP_DATA: &str = "app-data";
    pub const PARTNERS: &str = "partners";
    pub const SOCIALS: &str = "socials";
    pub const LEGAL: &str = "legal";

    pub fn talent(slug: &str) -> String {
        format!("talent:{}", slug)
    }

    pub fn community(slug: &str) -> String {
        format!("community:{}", slug)
    }

    pub fn article(slug: &str) -> String {
        format!("article:{}", slug)
    }

    pub fn product(slug: &str) -> String {
        format!("product:{}", slug)
    }

    pub fn hub(slug: &str) -> String {
        format!("hub:{}", slug)
    }

    pub fn legal_page(slug: &str) -> String {
        format!("legal:{}", slug)
    }

    /// Owned tag list for `set_tagged` / `invalidate_tags`
    pub fn list<I, S>(items: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        items.into_iter().map(Into::into).collect()
    }
}

/// Build the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}
