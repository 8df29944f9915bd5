//! Traits and configuration for retailer-specific scraping

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::models::ProductRecord;

/// Configuration for a retailer scraper
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Source name used in cache keys and the response body
    pub name: String,
    /// Base URL for resolving relative links
    pub base_url: String,
    /// Search URL pattern with {query} placeholder
    pub search_url_pattern: String,
    /// Browser session settings for this retailer
    pub session: SessionProfile,
}

/// How the browser should present itself and how long it may wait.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub user_agent: String,
    /// Extra request headers, e.g. `accept-language`
    pub extra_headers: Vec<(String, String)>,
    pub navigation_timeout: Duration,
    /// Pause after navigation so client-side rendering can run
    pub settle_delay: Option<Duration>,
    /// Interstitial to click away if present (login modal etc.)
    pub popup_dismiss: Option<String>,
    /// Results container to wait for
    pub results_selector: String,
    /// Accepted instead of `results_selector` if that never shows up
    pub results_fallback: Option<String>,
    pub selector_timeout: Duration,
}

/// Site-specific selector rules and parsing heuristics.
///
/// Implementations are pure: they never touch the network, so a change in
/// a retailer's markup only affects its `parse_products`.
pub trait WebsiteScraper: Send + Sync {
    /// Get the configuration for this scraper
    fn config(&self) -> &ScraperConfig;

    /// Extract up to the product cap from a rendered results page.
    ///
    /// # Arguments
    /// * `html` - The page HTML after the results container appeared
    /// * `term` - The normalized search term, used for relevance filtering
    ///
    /// # Returns
    /// * `Vec<ProductRecord>` - Relevant priced products, ascending by price
    fn parse_products(&self, html: &str, term: &str) -> Vec<ProductRecord>;

    /// Process a search term to create the search URL
    ///
    /// # Arguments
    /// * `search_term` - The term to search for
    ///
    /// # Returns
    /// * `String` - The complete search URL
    fn build_search_url(&self, search_term: &str) -> String {
        let encoded_term = urlencoding::encode(search_term);
        self.config().search_url_pattern.replace("{query}", &encoded_term)
    }
}

/// A named source of product listings for a search term.
///
/// This is the uniform contract the cache-aside lookup relies on; each
/// retailer is an independently failing black box behind it.
#[async_trait]
pub trait ProductSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search_products(&self, term: &str) -> Result<Vec<ProductRecord>, ScrapeError>;
}
