use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::lookup::CacheAside;
use crate::models::{AggregatedResponse, SourceResult};
use crate::traits::ProductSource;

/// Fans a normalized search term out to every configured source.
#[derive(Clone)]
pub struct Aggregator {
    sources: Vec<Arc<dyn ProductSource>>,
    lookup: CacheAside,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn ProductSource>>, lookup: CacheAside) -> Self {
        Self { sources, lookup }
    }

    pub fn sources(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Run every source's lookup concurrently and wait for all of them to
    /// settle. Failed sources appear as `{"error": ...}` entries.
    pub async fn search(&self, term: &str) -> AggregatedResponse {
        let lookups = self
            .sources
            .iter()
            .map(|source| self.lookup.lookup(source.as_ref(), term));

        let results: Vec<SourceResult> = join_all(lookups).await;

        let failed = results
            .iter()
            .filter(|result| matches!(result, SourceResult::Error { .. }))
            .count();
        info!(term, sources = results.len(), failed, "Aggregated search results");

        results.into_iter().map(SourceResult::into_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::lookup::fakes::{product, MemoryCache, MemoryStore, StubSource};
    use crate::models::SourcePayload;

    fn aggregator(sources: Vec<Arc<dyn ProductSource>>) -> Aggregator {
        let lookup = CacheAside::new(
            Arc::new(MemoryCache::default()),
            Arc::new(MemoryStore::default()),
            Duration::from_secs(3600),
        );
        Aggregator::new(sources, lookup)
    }

    #[tokio::test]
    async fn one_failing_source_does_not_hide_the_other() {
        let agg = aggregator(vec![
            Arc::new(StubSource::failing("amazon", "[data-cel-widget]")),
            Arc::new(StubSource::ok("flipkart", vec![product("Wireless Mouse", 499.0)])),
        ]);

        let response = agg.search("wireless mouse").await;

        assert_eq!(response.len(), 2);
        assert!(matches!(response["amazon"], SourcePayload::Error { .. }));
        assert_eq!(
            response["flipkart"],
            SourcePayload::Products(vec![product("Wireless Mouse", 499.0)])
        );

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["amazon"]["error"].as_str().unwrap().contains("timed out"));
        assert_eq!(json["flipkart"][0]["price"], 499.0);
    }

    #[tokio::test]
    async fn sources_run_concurrently() {
        let mut slow_a = StubSource::ok("amazon", vec![]);
        slow_a.delay = Duration::from_millis(200);
        let mut slow_b = StubSource::ok("flipkart", vec![]);
        slow_b.delay = Duration::from_millis(200);
        let agg = aggregator(vec![Arc::new(slow_a), Arc::new(slow_b)]);

        let started = Instant::now();
        let response = agg.search("mouse").await;

        assert_eq!(response.len(), 2);
        assert!(started.elapsed() < Duration::from_millis(390));
    }

    #[test]
    fn lists_configured_sources() {
        let agg = aggregator(vec![
            Arc::new(StubSource::ok("amazon", vec![])),
            Arc::new(StubSource::ok("flipkart", vec![])),
        ]);
        assert_eq!(agg.sources(), vec!["amazon", "flipkart"]);
    }
}
