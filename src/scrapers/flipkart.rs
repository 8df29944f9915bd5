//! Flipkart.com specific scraper implementation

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::error::ScrapeError;
use crate::models::ProductRecord;
use crate::normalize::is_relevant;
use crate::traits::{ScraperConfig, SessionProfile, WebsiteScraper};

use super::{compile, finalize, first_text, parse_price_text, resolve_url, DESKTOP_USER_AGENT, MAX_PRODUCTS};

const CARD_SELECTOR: &str = "div[data-id]";

struct Selectors {
    cards: Selector,
    product_image: Selector,
    any_image: Selector,
    titled_link: Selector,
    title_text: Selector,
    link: Selector,
    price: Selector,
    rating: Selector,
}

/// Scraper implementation for Flipkart search results
pub struct FlipkartScraper {
    config: ScraperConfig,
    selectors: Selectors,
}

impl FlipkartScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        let config = ScraperConfig {
            name: "flipkart".to_string(),
            base_url: "https://www.flipkart.com".to_string(),
            search_url_pattern: "https://www.flipkart.com/search?q={query}".to_string(),
            session: SessionProfile {
                user_agent: DESKTOP_USER_AGENT.to_string(),
                extra_headers: vec![("accept-language".to_string(), "en-IN,en;q=0.9".to_string())],
                navigation_timeout: Duration::from_secs(60),
                settle_delay: Some(Duration::from_secs(2)),
                // login modal that covers the results on first visit
                popup_dismiss: Some("button._2KpZ6l._2doB4z".to_string()),
                results_selector: CARD_SELECTOR.to_string(),
                results_fallback: None,
                selector_timeout: Duration::from_secs(20),
            },
        };

        let selectors = Selectors {
            cards: compile(CARD_SELECTOR)?,
            product_image: compile("img.DByuf4")?,
            any_image: compile("img")?,
            titled_link: compile("a[title]")?,
            title_text: compile(".KzDlHZ, .wjcEIp")?,
            link: compile("a[href]")?,
            price: compile("div.Nx9bqj")?,
            rating: compile("div.XQDdHH")?,
        };

        Ok(Self { config, selectors })
    }

    fn parse_card(&self, card: ElementRef<'_>, term: &str) -> Option<ProductRecord> {
        // badges such as "Assured" are also images; the product shot wins
        let img = card
            .select(&self.selectors.product_image)
            .next()
            .or_else(|| card.select(&self.selectors.any_image).next());

        let title = img
            .and_then(|img| img.value().attr("alt"))
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(str::to_string)
            .or_else(|| {
                card.select(&self.selectors.titled_link)
                    .next()
                    .and_then(|a| a.value().attr("title"))
                    .map(|t| t.trim().to_string())
            })
            .or_else(|| first_text(&card, &self.selectors.title_text))?;

        if !is_relevant(term, &title) {
            return None;
        }

        // the current price sits alone in `Nx9bqj`; there is no fraction node
        let price_text = first_text(&card, &self.selectors.price)?;
        let price = parse_price_text(&price_text)?;

        let link = card
            .select(&self.selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(&self.config.base_url, href));

        let image = img
            .and_then(|img| img.value().attr("src"))
            .map(|src| resolve_url(&self.config.base_url, src));

        let id = card
            .value()
            .attr("data-id")
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| link.as_ref().map(|url| format!("{:x}", md5::compute(url))));

        let rating = first_text(&card, &self.selectors.rating);

        Some(ProductRecord {
            title,
            link,
            image,
            price,
            asin: id,
            rating,
        })
    }
}

impl WebsiteScraper for FlipkartScraper {
    fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn parse_products(&self, html: &str, term: &str) -> Vec<ProductRecord> {
        let document = Html::parse_document(html);

        let mut products = Vec::new();
        for card in document.select(&self.selectors.cards) {
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
