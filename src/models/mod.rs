//! Data models for product listings and aggregated search responses

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A product listing scraped from a retailer's search results page.
///
/// `price` is always finite and non-negative; extractors drop candidates
/// without a parseable price before a record is ever built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub link: Option<String>,
    pub image: Option<String>,
    pub price: f64,
    /// Retailer item identifier (ASIN on Amazon, `data-id` on Flipkart).
    pub asin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

/// Outcome of one source's lookup within a request.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult {
    Products {
        source: String,
        products: Vec<ProductRecord>,
    },
    Error {
        source: String,
        error: String,
    },
}

impl SourceResult {
    pub fn into_entry(self) -> (String, SourcePayload) {
        match self {
            Self::Products { source, products } => (source, SourcePayload::Products(products)),
            Self::Error { source, error } => (source, SourcePayload::Error { error }),
        }
    }
}

/// Per-source value in the response body: either the product array or an
/// `{"error": "..."}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourcePayload {
    Products(Vec<ProductRecord>),
    Error { error: String },
}

/// Response body of `/api/scrape`, keyed by source name.
pub type AggregatedResponse = BTreeMap<String, SourcePayload>;
