//! Amazon.in specific scraper implementation

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::ProductRecord;
use crate::normalize::is_relevant;
use crate::traits::{ScraperConfig, SessionProfile, WebsiteScraper};

use super::{compile, finalize, first_text, parse_price, resolve_url, DESKTOP_USER_AGENT, MAX_PRODUCTS};

static ASIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/dp/([A-Z0-9]{10})").expect("valid asin regex"));
/// Size/crop tokens like `._AC_UY218_` that make Amazon serve thumbnails.
static SIZE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\._[A-Za-z0-9,_-]+_").expect("valid size token regex"));

const RESULTS_SELECTOR: &str = r#"[data-cel-widget^="MAIN-SEARCH_RESULTS-"]"#;
const RESULTS_FALLBACK: &str = "div.s-main-slot";

struct Selectors {
    cards: Selector,
    fallback_cards: Selector,
    title: Selector,
    heading: Selector,
    heading_link: Selector,
    image: Selector,
    price_whole: Selector,
    price_fraction: Selector,
}

/// Scraper implementation for Amazon India search results
pub struct AmazonScraper {
    config: ScraperConfig,
    selectors: Selectors,
}

impl AmazonScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        let config = ScraperConfig {
            name: "amazon".to_string(),
            base_url: "https://www.amazon.in".to_string(),
            search_url_pattern: "https://www.amazon.in/s?k={query}&s=relevanceblender".to_string(),
            session: SessionProfile {
                user_agent: DESKTOP_USER_AGENT.to_string(),
                extra_headers: vec![("accept-language".to_string(), "en-IN,en;q=0.9".to_string())],
                navigation_timeout: Duration::from_secs(120),
                settle_delay: None,
                popup_dismiss: None,
                results_selector: RESULTS_SELECTOR.to_string(),
                results_fallback: Some(RESULTS_FALLBACK.to_string()),
                selector_timeout: Duration::from_secs(15),
            },
        };

        let selectors = Selectors {
            cards: compile(RESULTS_SELECTOR)?,
            fallback_cards: compile(r#"div.s-main-slot div[data-component-type="s-search-result"]"#)?,
            title: compile("h2 span")?,
            heading: compile("h2")?,
            heading_link: compile("h2 a[href], a.a-link-normal[href]")?,
            image: compile("img.s-image")?,
            price_whole: compile(".a-price-whole")?,
            price_fraction: compile(".a-price-fraction")?,
        };

        Ok(Self { config, selectors })
    }

    fn parse_card(&self, card: ElementRef<'_>, term: &str) -> Option<ProductRecord> {
        let title = first_text(&card, &self.selectors.title)?;
        if !is_relevant(term, &title) {
            return None;
        }

        let link = self
            .card_link(card)
            .map(|href| resolve_url(&self.config.base_url, &href))?;

        let whole = first_text(&card, &self.selectors.price_whole).unwrap_or_default();
        let fraction = first_text(&card, &self.selectors.price_fraction).unwrap_or_default();
        let price = parse_price(&whole, &fraction)?;

        let asin = ASIN_RE
            .captures(&link)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                card.value()
                    .attr("data-asin")
                    .filter(|asin| !asin.is_empty())
                    .map(str::to_string)
            });

        let image = card
            .select(&self.selectors.image)
            .next()
            .and_then(best_image_url);

        Some(ProductRecord {
            title,
            link: Some(link),
            image,
            price,
            asin,
            rating: None,
        })
    }

    /// The anchor wrapping the card's heading, or failing that one inside it.
    fn card_link(&self, card: ElementRef<'_>) -> Option<String> {
        let enclosing = card.select(&self.selectors.heading).next().and_then(|heading| {
            heading
                .ancestors()
                .take_while(|node| node.id() != card.id())
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
        });

        enclosing
            .or_else(|| {
                card.select(&self.selectors.heading_link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
            })
            .map(str::to_string)
    }
}

impl WebsiteScraper for AmazonScraper {
    fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn parse_products(&self, html: &str, term: &str) -> Vec<ProductRecord> {
        let document = Html::parse_document(html);

        let mut cards: Vec<ElementRef<'_>> = document.select(&self.selectors.cards).collect();
        if cards.is_empty() {
            debug!("No widget cards found on Amazon page, using result slot fallback");
            cards = document.select(&self.selectors.fallback_cards).collect();
        }

        let mut products = Vec::new();
        for card in cards {
            if let Some(product) = self.parse_card(card, term) {
                products.push(product);
                if products.len() >= MAX_PRODUCTS {
                    break;
                }
            }
        }

        finalize(products)
    }
}

/// Pick the highest-resolution image URL an `img.s-image` advertises.
fn best_image_url(img: ElementRef<'_>) -> Option<String> {
    let attrs = img.value();

    if let Some(url) = attrs
        .attr("srcset")
        .or_else(|| attrs.attr("data-srcset"))
        .and_then(pick_from_srcset)
    {
        return Some(url);
    }

    ["data-old-hires", "data-hires", "data-src", "data-image-lazy-src"]
        .iter()
        .filter_map(|name| attrs.attr(name))
        .map(str::to_string)
        .chain(attrs.attr("data-a-dynamic-image").and_then(largest_dynamic_image))
        .chain(attrs.attr("src").map(str::to_string))
        .find(|candidate| !candidate.trim().is_empty())
        .map(|candidate| normalize_image_url(&candidate))
}

/// Last (largest) entry of a `srcset` list such as `"a.jpg 1x, b.jpg 2x"`.
fn pick_from_srcset(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .last()
        .and_then(|part| part.split_whitespace().next())
        .map(normalize_image_url)
}

/// `data-a-dynamic-image` maps URLs to `[width, height]`; take the widest.
fn largest_dynamic_image(raw: &str) -> Option<String> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw).ok()?;
    map.into_iter()
        .max_by_key(|(_, dims)| dims.get(0).and_then(serde_json::Value::as_u64).unwrap_or(0))
        .map(|(url, _)| url)
}

/// Strip query and thumbnail size tokens so the full-size image is served.
pub fn normalize_image_url(url: &str) -> String {
    let mut url = url.split('?').next().unwrap_or(url).to_string();
    if url.starts_with("//") {
        url = format!("https:{url}");
    }
    SIZE_TOKEN_RE.replace_all(&url, "").into_owned()
}
