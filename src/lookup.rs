//! Cache-aside lookup of one source's products for one search term
//!
//! Tiers are consulted in order: fast cache, persistent store, live
//! extraction. Whatever happens, the lookup settles into a [`SourceResult`];
//! errors never escape to the caller, so one source can't take down another.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cache::{cache_key, FastCache};
use crate::database::ProductStore;
use crate::error::CacheError;
use crate::models::{ProductRecord, SourceResult};
use crate::traits::ProductSource;

#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn FastCache>,
    store: Arc<dyn ProductStore>,
    cache_ttl: Duration,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn FastCache>, store: Arc<dyn ProductStore>, cache_ttl: Duration) -> Self {
        Self {
            cache,
            store,
            cache_ttl,
        }
    }

    pub async fn lookup(&self, source: &dyn ProductSource, term: &str) -> SourceResult {
        let name = source.name().to_string();
        match self.resolve(source, term).await {
            Ok(products) => SourceResult::Products {
                source: name,
                products,
            },
            Err(message) => SourceResult::Error {
                source: name,
                error: message,
            },
        }
    }

    async fn resolve(&self, source: &dyn ProductSource, term: &str) -> Result<Vec<ProductRecord>, String> {
        let name = source.name();
        let key = cache_key(name, term);

        match self.cache.get_products(&key).await {
            Ok(Some(products)) => {
                debug!(source = name, term, "Fast cache hit");
                return Ok(products);
            }
            Ok(None) => {}
            Err(CacheError::Serialize(e)) => {
                warn!(source = name, term, error = %e, "Discarding unreadable cache entry");
            }
            Err(e) => {
                error!(source = name, term, error = %e, "Fast cache lookup failed");
                return Err(e.to_string());
            }
        }

        match self.store.find_products(name, term).await {
            Ok(Some(products)) => {
                debug!(source = name, term, "Store hit, warming fast cache");
                self.warm_cache(&key, &products).await;
                return Ok(products);
            }
            Ok(None) => {}
            Err(e) => {
                error!(source = name, term, error = %e, "Store lookup failed");
                return Err(e.to_string());
            }
        }

        info!(source = name, term, "Cache miss, scraping");
        let products = source.search_products(term).await.map_err(|e| {
            error!(source = name, term, error = %e, "Error scraping source");
            e.to_string()
        })?;

        self.warm_cache(&key, &products).await;
        if let Err(e) = self.store.save_products(name, term, &products).await {
            warn!(source = name, term, error = %e, "Failed to persist scraped products");
        }

        Ok(products)
    }

    /// Best effort: a failed write is logged and otherwise ignored.
    async fn warm_cache(&self, key: &str, products: &[ProductRecord]) {
        if let Err(e) = self.cache.set_products(key, products, self.cache_ttl).await {
            warn!(key, error = %e, "Failed to write fast cache");
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::fakes::*;
    use super::*;

    fn cache_aside(cache: &Arc<MemoryCache>, store: &Arc<MemoryStore>) -> CacheAside {
        CacheAside::new(cache.clone(), store.clone(), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn fast_cache_hit_skips_store_and_extractor() {
        let cache = Arc::new(MemoryCache::default());
        let store = Arc::new(MemoryStore::default());
        cache
            .entries
            .lock()
            .unwrap()
            .insert("products:amazon:wireless mouse".to_string(), vec![product("cached", 1.0)]);
        let source = StubSource::ok("amazon", vec![product("fresh", 2.0)]);

        let result = cache_aside(&cache, &store).lookup(&source, "wireless mouse").await;

        assert_eq!(
            result,
            SourceResult::Products {
                source: "amazon".to_string(),
                products: vec![product("cached", 1.0)],
            }
        );
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_hit_warms_cache_without_scraping() {
        let cache = Arc::new(MemoryCache::default());
        let store = Arc::new(MemoryStore::default());
        store.docs.lock().unwrap().insert(
            ("amazon".to_string(), "wireless mouse".to_string()),
            vec![product("stored", 3.0)],
        );
        let source = StubSource::ok("amazon", vec![product("fresh", 2.0)]);

        let result = cache_aside(&cache, &store).lookup(&source, "wireless mouse").await;

        assert!(matches!(result, SourceResult::Products { ref products, .. } if products[0].title == "stored"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            cache.entries.lock().unwrap().get("products:amazon:wireless mouse"),
            Some(&vec![product("stored", 3.0)])
        );
    }

    #[tokio::test]
    async fn failed_cache_warm_does_not_fail_the_lookup() {
        let cache = Arc::new(MemoryCache {
            fail_writes: true,
            ..MemoryCache::default()
        });
        let store = Arc::new(MemoryStore::default());
        store.docs.lock().unwrap().insert(
            ("flipkart".to_string(), "mouse".to_string()),
            vec![product("stored", 3.0)],
        );
        let source = StubSource::ok("flipkart", vec![]);

        let result = cache_aside(&cache, &store).lookup(&source, "mouse").await;

        assert!(matches!(result, SourceResult::Products { .. }));
    }

    #[tokio::test]
    async fn corrupt_cache_entry_falls_through_to_store() {
        let cache = Arc::new(MemoryCache {
            corrupt: true,
            ..MemoryCache::default()
        });
        let store = Arc::new(MemoryStore::default());
        store.docs.lock().unwrap().insert(
            ("amazon".to_string(), "wireless mouse".to_string()),
            vec![product("stored", 3.0)],
        );
        let source = StubSource::ok("amazon", vec![product("fresh", 2.0)]);

        let result = cache_aside(&cache, &store).lookup(&source, "wireless mouse").await;

        assert_eq!(
            result,
            SourceResult::Products {
                source: "amazon".to_string(),
                products: vec![product("stored", 3.0)],
            }
        );
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_cache_is_an_error_for_that_source() {
        let cache = Arc::new(MemoryCache {
            fail_reads: true,
            ..MemoryCache::default()
        });
        let store = Arc::new(MemoryStore::default());
        let source = StubSource::ok("flipkart", vec![product("fresh", 2.0)]);

        let result = cache_aside(&cache, &store).lookup(&source, "mouse").await;

        match result {
            SourceResult::Error { source, error } => {
                assert_eq!(source, "flipkart");
                assert!(error.contains("connection refused"), "{error}");
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_read_failure_is_an_error_and_skips_extraction() {
        let cache = Arc::new(MemoryCache::default());
        let store = Arc::new(MemoryStore {
            fail_reads: true,
            ..MemoryStore::default()
        });
        let source = StubSource::ok("amazon", vec![product("fresh", 2.0)]);

        let result = cache_aside(&cache, &store).lookup(&source, "wireless mouse").await;

        assert!(matches!(result, SourceResult::Error { ref source, .. } if source == "amazon"));
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(cache.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_miss_populates_both_tiers() {
        let cache = Arc::new(MemoryCache::default());
        let store = Arc::new(MemoryStore::default());
        let source = StubSource::ok("amazon", vec![product("fresh", 2.0)]);

        let result = cache_aside(&cache, &store).lookup(&source, "wireless mouse").await;

        assert!(matches!(result, SourceResult::Products { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.entries.lock().unwrap().get("products:amazon:wireless mouse"),
            Some(&vec![product("fresh", 2.0)])
        );
        assert_eq!(
            store
                .docs
                .lock()
                .unwrap()
                .get(&("amazon".to_string(), "wireless mouse".to_string())),
            Some(&vec![product("fresh", 2.0)])
        );
    }

    #[tokio::test]
    async fn extractor_failure_becomes_error_marker_and_writes_nothing() {
        let cache = Arc::new(MemoryCache::default());
        let store = Arc::new(MemoryStore::default());
        let source = StubSource::failing("amazon", "div.results");

        let result = cache_aside(&cache, &store).lookup(&source, "wireless mouse").await;

        match result {
            SourceResult::Error { source, error } => {
                assert_eq!(source, "amazon");
                assert!(error.contains("div.results"), "{error}");
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert!(cache.entries.lock().unwrap().is_empty());
        assert!(store.docs.lock().unwrap().is_empty());
    }
}
