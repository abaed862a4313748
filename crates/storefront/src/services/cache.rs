//! In-memory cache for public, rarely-changing catalog reads.
//!
//! Featured products and active banners are read on every home page view
//! but change only through admin writes, which invalidate the entry.
//! Entries also expire after 5 minutes so stock figures stay close to live.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{BannerRepository, ProductRepository, RepositoryError};
use crate::models::{Banner, Product};

const FEATURED_KEY: &str = "featured";
const BANNERS_KEY: &str = "banners";

/// Featured products grouped by category.
pub type FeaturedMap = BTreeMap<String, Vec<Product>>;

#[derive(Clone)]
enum CacheValue {
    Featured(Arc<FeaturedMap>),
    Banners(Arc<Vec<Banner>>),
}

/// Cache in front of the featured and banner queries.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<String, CacheValue>,
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    /// Create an empty cache with a 5-minute TTL.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { cache }
    }

    /// Featured products, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the cache is cold and the query fails.
    pub async fn featured(&self, pool: &PgPool) -> Result<Arc<FeaturedMap>, RepositoryError> {
        if let Some(CacheValue::Featured(featured)) = self.cache.get(FEATURED_KEY).await {
            debug!("Featured cache hit");
            return Ok(featured);
        }

        let featured = Arc::new(ProductRepository::new(pool).featured().await?);
        self.cache
            .insert(
                FEATURED_KEY.to_owned(),
                CacheValue::Featured(Arc::clone(&featured)),
            )
            .await;
        Ok(featured)
    }

    /// Active banners, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the cache is cold and the query fails.
    pub async fn banners(&self, pool: &PgPool) -> Result<Arc<Vec<Banner>>, RepositoryError> {
        if let Some(CacheValue::Banners(banners)) = self.cache.get(BANNERS_KEY).await {
            debug!("Banner cache hit");
            return Ok(banners);
        }

        let banners = Arc::new(BannerRepository::new(pool).list(false).await?);
        self.cache
            .insert(
                BANNERS_KEY.to_owned(),
                CacheValue::Banners(Arc::clone(&banners)),
            )
            .await;
        Ok(banners)
    }

    /// Drop cached featured products (after product or featured writes).
    pub async fn invalidate_featured(&self) {
        self.cache.invalidate(FEATURED_KEY).await;
    }

    /// Drop cached banners (after banner writes).
    pub async fn invalidate_banners(&self) {
        self.cache.invalidate(BANNERS_KEY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let cache = CatalogCache::new();
        cache
            .cache
            .insert(
                BANNERS_KEY.to_owned(),
                CacheValue::Banners(Arc::new(Vec::new())),
            )
            .await;
        assert!(cache.cache.get(BANNERS_KEY).await.is_some());

        cache.invalidate_banners().await;
        assert!(cache.cache.get(BANNERS_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_is_per_key() {
        let cache = CatalogCache::new();
        cache
            .cache
            .insert(
                FEATURED_KEY.to_owned(),
                CacheValue::Featured(Arc::new(FeaturedMap::new())),
            )
            .await;

        cache.invalidate_banners().await;
        assert!(cache.cache.get(FEATURED_KEY).await.is_some());
    }
}
