//! In-memory cache implementation using moka
//!
//! Entries carry their own TTL (via moka's `Expiry`) and may be registered
//! under revalidation tags. Invalidating a tag evicts every key registered
//! under it. An eviction listener drops keys from the tag index once moka
//! removes them, so expired or capacity-evicted entries do not linger there.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default TTL for cache entries (1 hour)
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// JSON-serialized value plus the TTL it was stored with
#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
    /// Distinguishes this insert from later ones under the same key
    generation: u64,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration, generation: u64) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
            generation,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Tags per key and keys per tag
#[derive(Default)]
struct TagIndex {
    by_tag: HashMap<String, HashSet<String>>,
    /// key -> (generation of the registered entry, its tags)
    by_key: HashMap<String, (u64, Vec<String>)>,
}

impl TagIndex {
    fn register(&mut self, key: &str, generation: u64, tags: &[String]) {
        self.unregister(key);
        for tag in tags {
            self.by_tag.entry(tag.clone()).or_default().insert(key.to_string());
        }
        self.by_key.insert(key.to_string(), (generation, tags.to_vec()));
    }

    fn unregister(&mut self, key: &str) {
        let Some((_, tags)) = self.by_key.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = self.by_tag.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(&tag);
                }
            }
        }
    }

    /// Forget `key` only if the index still describes that exact entry
    fn entry_removed(&mut self, key: &str, generation: u64) {
        if matches!(self.by_key.get(key), Some((registered, _)) if *registered == generation) {
            self.unregister(key);
        }
    }

    /// Detach every key registered under `tags` and return them
    fn take_tagged(&mut self, tags: &[String]) -> HashSet<String> {
        let keys: HashSet<String> = tags.iter().filter_map(|tag| self.by_tag.remove(tag)).flatten().collect();
        for key in &keys {
            self.unregister(key);
        }
        keys
    }
}

type SharedIndex = Arc<Mutex<TagIndex>>;

/// The index is never left half-updated, so a poisoned lock is still usable
fn lock(index: &SharedIndex) -> MutexGuard<'_, TagIndex> {
    index.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory cache using moka with a tag index
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    index: SharedIndex,
    generation: AtomicU64,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("tagged_keys", &lock(&self.index).by_key.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// 10,000 entries, 1 hour TTL
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let index: SharedIndex = Arc::default();
        let listener_index = Arc::clone(&index);

        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .eviction_listener(move |key: Arc<String>, entry: CacheEntry, cause: RemovalCause| {
                // a replaced entry's key lives on under the new value
                if cause != RemovalCause::Replaced {
                    lock(&listener_index).entry_removed(&key, entry.generation);
                }
            })
            .build();

        Self {
            cache,
            index,
            generation: AtomicU64::new(0),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    async fn insert<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<u64> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let entry = CacheEntry::new(value, ttl, generation)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(generation)
    }

    /// Number of keys currently registered under `tag`
    #[cfg(test)]
    fn tagged_count(&self, tag: &str) -> usize {
        lock(&self.index).by_tag.get(tag).map_or(0, HashSet::len)
    }

    /// Number of keys registered under any tag
    #[cfg(test)]
    fn tagged_keys(&self) -> usize {
        lock(&self.index).by_key.len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        self.insert(key, value, ttl).await?;
        lock(&self.index).unregister(key);
        Ok(())
    }

    async fn set_tagged<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        tags: &[String],
        ttl: Duration,
    ) -> Result<()> {
        let generation = self.insert(key, value, ttl).await?;
        let mut index = lock(&self.index);
        index.register(key, generation, tags);
        // evicted before it was registered; the listener has already run
        if !self.cache.contains_key(key) {
            index.entry_removed(key, generation);
        }
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &[String]) -> Result<()> {
        let keys = lock(&self.index).take_tagged(tags);

        if !keys.is_empty() {
            tracing::debug!("Invalidating {} cache entries for tags {:?}", keys.len(), tags);
        }
        for key in keys {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache.set("key1", &"value1".to_string(), Duration::from_secs(60)).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new();
        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let cache = MemoryCache::with_capacity_and_ttl(100, Duration::from_secs(3600));
        cache.set("short", &1, Duration::from_millis(20)).await.unwrap();
        cache.set("long", &2, Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.cache.run_pending_tasks().await;

        assert_eq!(cache.get::<i32>("short").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("long").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_invalidate_tag_evicts_all_registered_keys() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set_tagged("talents:list:1", &"a", &tags(&["talents"]), ttl).await.unwrap();
        cache
            .set_tagged("talent:budi", &"b", &tags(&["talents", "talent:budi"]), ttl)
            .await
            .unwrap();
        cache.set_tagged("hubs:list:1", &"c", &tags(&["hubs"]), ttl).await.unwrap();
        assert_eq!(cache.tagged_count("talents"), 2);

        cache.invalidate_tags(&tags(&["talents"])).await.unwrap();

        assert_eq!(cache.get::<String>("talents:list:1").await.unwrap(), None);
        assert_eq!(cache.get::<String>("talent:budi").await.unwrap(), None);
        assert_eq!(cache.get::<String>("hubs:list:1").await.unwrap(), Some("c".into()));
        assert_eq!(cache.tagged_count("talents"), 0);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_tag_is_noop() {
        let cache = MemoryCache::new();
        cache.invalidate_tags(&tags(&["nothing"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entries_leave_tag_index() {
        let cache = MemoryCache::with_capacity_and_ttl(10, Duration::from_millis(5));
        let ttl = Duration::from_millis(5);
        for page in 0..5000 {
            let key = format!("talents:list:{}", page);
            cache.set_tagged(&key, &page, &tags(&["talents"]), ttl).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        for _ in 0..5 {
            cache.cache.run_pending_tasks().await;
        }

        assert_eq!(cache.tagged_keys(), 0);
        assert_eq!(cache.tagged_count("talents"), 0);
    }

    #[tokio::test]
    async fn test_retagging_a_key_replaces_its_tags() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set_tagged("k", &1, &tags(&["a"]), ttl).await.unwrap();
        cache.set_tagged("k", &2, &tags(&["b"]), ttl).await.unwrap();
        cache.cache.run_pending_tasks().await;

        assert_eq!(cache.tagged_count("a"), 0);
        assert_eq!(cache.tagged_count("b"), 1);

        // the replaced value must not unregister the live one
        cache.invalidate_tags(&tags(&["b"])).await.unwrap();
        assert_eq!(cache.get::<i32>("k").await.unwrap(), None);
        assert_eq!(cache.tagged_keys(), 0);
    }

    #[tokio::test]
    async fn test_invalidation_prunes_other_tags_of_the_key() {
        let cache = MemoryCache::new();
        cache
            .set_tagged("talent:budi", &"b", &tags(&["talents", "talent:budi"]), Duration::from_secs(60))
            .await
            .unwrap();

        cache.invalidate_tags(&tags(&["talent:budi"])).await.unwrap();

        assert_eq!(cache.tagged_count("talents"), 0);
        assert_eq!(cache.tagged_keys(), 0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            #[test]
            fn tagged_entries_never_survive_their_tag(
                keys in proptest::collection::hash_set("[a-z]{1,8}", 1..10),
                tag in "[a-z]{1,6}"
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let cache = MemoryCache::new();
                    let tag_list = vec![tag.clone()];
                    for key in &keys {
                        cache.set_tagged(key, key, &tag_list, Duration::from_secs(60)).await.unwrap();
                    }

                    cache.invalidate_tags(&tag_list).await.unwrap();

                    for key in &keys {
                        let value: Option<String> = cache.get(key).await.unwrap();
                        prop_assert!(value.is_none());
                    }
                    Ok(())
                })?;
            }
        }
    }
}
