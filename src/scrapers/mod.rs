//! Retailer-specific scrapers and the parsing helpers they share

pub mod amazon;
pub mod flipkart;

use scraper::{ElementRef, Selector};

use crate::error::ScrapeError;
use crate::models::ProductRecord;

pub use amazon::AmazonScraper;
pub use flipkart::FlipkartScraper;

/// Maximum number of products an extractor returns per search.
pub const MAX_PRODUCTS: usize = 6;

/// Desktop Chrome user agent presented to retailers.
pub(crate) const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

pub(crate) fn compile(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector {
        selector: css.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Trimmed text content of the first match of `selector` inside `el`.
pub(crate) fn first_text(el: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Combine the whole and fractional price fragments into one value.
///
/// Non-digit characters (currency symbols, thousands separators, trailing
/// dots) are stripped from both parts. Without whole digits there is no price.
pub fn parse_price(whole: &str, fraction: &str) -> Option<f64> {
    let whole: String = whole.chars().filter(char::is_ascii_digit).collect();
    if whole.is_empty() {
        return None;
    }
    let fraction: String = fraction.chars().filter(char::is_ascii_digit).collect();

    let text = if fraction.is_empty() {
        whole
    } else {
        format!("{whole}.{fraction}")
    };

    text.parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
}

/// Parse a price rendered as a single text node, e.g. `₹1,249.50`.
///
/// Everything except digits and dots is dropped; the last remaining dot
/// separates the fraction.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches('.');

    match cleaned.rsplit_once('.') {
        Some((whole, fraction)) => parse_price(whole, fraction),
        None => parse_price(cleaned, ""),
    }
}

/// Make an href absolute against the retailer's base URL.
pub fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{base_url}{href}")
    } else {
        format!("{base_url}/{href}")
    }
}

/// Sort collected products ascending by price and enforce the cap.
pub(crate) fn finalize(mut products: Vec<ProductRecord>) -> Vec<ProductRecord> {
    products.truncate(MAX_PRODUCTS);
    products.sort_by(|a, b| a.price.total_cmp(&b.price));
    products
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::ProductRecord;

    use super::MAX_PRODUCTS;

    pub fn assert_extractor_invariants(products: &[ProductRecord]) {
        assert!(products.len() <= MAX_PRODUCTS, "cap exceeded: {}", products.len());
        for pair in products.windows(2) {
            assert!(pair[0].price <= pair[1].price, "not sorted by price");
        }
        for product in products {
            assert!(product.price.is_finite() && product.price >= 0.0);
        }
    }
}
