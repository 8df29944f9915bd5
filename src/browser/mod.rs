//! Headless browser sessions for rendering retailer search pages
//!
//! Every extraction launches its own Chromium instance, renders one search
//! page, hands the HTML to the retailer's [`WebsiteScraper`] and closes the
//! browser again, on success and on failure alike. Sessions are never pooled.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::models::ProductRecord;
use crate::traits::{ProductSource, SessionProfile, WebsiteScraper};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);
const POPUP_TIMEOUT: Duration = Duration::from_secs(5);
const POPUP_REFLOW_DELAY: Duration = Duration::from_secs(1);
const BROWSER_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Launch settings shared by all retailer sessions.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub chrome_path: Option<PathBuf>,
    /// Where screenshots and HTML dumps go when a page fails to render
    pub artifact_dir: PathBuf,
}

/// A [`ProductSource`] that renders the retailer's search page in a
/// headless browser and parses it with the site's [`WebsiteScraper`].
pub struct BrowserExtractor<S> {
    site: S,
    settings: BrowserSettings,
}

impl<S: WebsiteScraper> BrowserExtractor<S> {
    pub fn new(site: S, settings: BrowserSettings) -> Self {
        Self { site, settings }
    }

    async fn render(&self, session: &BrowserSession, url: &str) -> Result<String, ScrapeError> {
        let profile = &self.site.config().session;
        let source = &self.site.config().name;

        session.apply_profile(profile).await?;

        if let Err(e) = session.navigate(url, profile.navigation_timeout).await {
            warn!(source = %source, error = %e, "Navigation failed, capturing artifacts");
            session.capture_artifacts(&self.settings.artifact_dir, source, "goto-fail").await;
            return Err(e);
        }

        if let Some(delay) = profile.settle_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(popup) = &profile.popup_dismiss {
            session.dismiss_popup(popup).await;
        }

        if let Err(e) = session
            .wait_for_results(
                &profile.results_selector,
                profile.results_fallback.as_deref(),
                profile.selector_timeout,
            )
            .await
        {
            warn!(source = %source, error = %e, "Results never appeared, capturing artifacts");
            session.capture_artifacts(&self.settings.artifact_dir, source, "debug").await;
            return Err(e);
        }

        session.content().await
    }
}

#[async_trait]
impl<S: WebsiteScraper> ProductSource for BrowserExtractor<S> {
    fn name(&self) -> &str {
        &self.site.config().name
    }

    async fn search_products(&self, term: &str) -> Result<Vec<ProductRecord>, ScrapeError> {
        if term.is_empty() {
            return Err(ScrapeError::EmptyTerm);
        }

        let url = self.site.build_search_url(term);
        info!(source = %self.name(), %url, "Scraping search results");

        let session = BrowserSession::launch(&self.settings).await?;
        let rendered = self.render(&session, &url).await;
        session.close().await;

        let products = self.site.parse_products(&rendered?, term);
        info!(source = %self.name(), count = products.len(), "Extracted products");
        Ok(products)
    }
}

/// One browser process with a single page.
struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(settings: &BrowserSettings) -> Result<Self, ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .window_size(1366, 768);

        if let Some(path) = &settings.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(ScrapeError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        // The handler drives the CDP connection and must be polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let session_error = ScrapeError::Browser(format!("failed to open page: {e}"));
                shutdown(browser, handler).await;
                return Err(session_error);
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    async fn apply_profile(&self, profile: &SessionProfile) -> Result<(), ScrapeError> {
        self.page
            .set_user_agent(profile.user_agent.clone())
            .await
            .map_err(|e| ScrapeError::Browser(format!("failed to set user agent: {e}")))?;

        if !profile.extra_headers.is_empty() {
            let headers: serde_json::Map<String, serde_json::Value> = profile
                .extra_headers
                .iter()
                .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
                .collect();

            self.page
                .execute(SetExtraHttpHeadersParams::new(Headers::new(
                    serde_json::Value::Object(headers),
                )))
                .await
                .map_err(|e| ScrapeError::Browser(format!("failed to set headers: {e}")))?;
        }

        Ok(())
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ScrapeError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    /// Best effort: a missing popup is the common case, not an error.
    async fn dismiss_popup(&self, selector: &str) {
        let clicked = tokio::time::timeout(POPUP_TIMEOUT, async {
            let button = self.page.find_element(selector).await?;
            button.click().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await;

        match clicked {
            Ok(Ok(())) => {
                debug!(selector, "Dismissed popup");
                tokio::time::sleep(POPUP_REFLOW_DELAY).await;
            }
            _ => debug!(selector, "No popup to dismiss"),
        }
    }

    /// Poll until the primary or fallback selector matches.
    async fn wait_for_results(
        &self,
        selector: &str,
        fallback: Option<&str>,
        timeout: Duration,
    ) -> Result<(), ScrapeError> {
        let started = Instant::now();

        loop {
            if self.page.find_element(selector).await.is_ok() {
                debug!(selector, elapsed_ms = started.elapsed().as_millis() as u64, "Results appeared");
                return Ok(());
            }
            if let Some(fallback) = fallback
                && self.page.find_element(fallback).await.is_ok()
            {
                debug!(fallback, "Fallback results container appeared");
                return Ok(());
            }

            if started.elapsed() >= timeout {
                let selector = match fallback {
                    Some(fallback) => format!("{selector}, {fallback}"),
                    None => selector.to_string(),
                };
                return Err(ScrapeError::SelectorTimeout { selector, timeout });
            }

            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(format!("failed to read page content: {e}")))
    }

    /// Dump a screenshot and the page HTML for post-hoc debugging. Failures
    /// here are logged only; the original error is what gets reported.
    async fn capture_artifacts(&self, dir: &Path, source: &str, stage: &str) {
        if let Err(e) = self.try_capture_artifacts(dir, source, stage).await {
            warn!(source, stage, error = %e, "Could not write debug artifacts");
        }
    }

    async fn try_capture_artifacts(
        &self,
        dir: &Path,
        source: &str,
        stage: &str,
    ) -> Result<(), ScrapeError> {
        tokio::fs::create_dir_all(dir).await?;
        let stem = artifact_stem(source, stage, chrono::Utc::now().timestamp_millis());

        match self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(png) => {
                let path = dir.join(format!("{stem}.png"));
                tokio::fs::write(&path, png).await?;
                info!(path = %path.display(), "Saved debug screenshot");
            }
            Err(e) => warn!(source, error = %e, "Screenshot failed"),
        }

        let html = self.content().await?;
        let path = dir.join(format!("{stem}.html"));
        tokio::fs::write(&path, html).await?;
        info!(path = %path.display(), "Saved debug HTML snapshot");

        Ok(())
    }

    async fn close(self) {
        shutdown(self.browser, self.handler).await;
    }
}

async fn shutdown(mut browser: Browser, handler: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        warn!(error = %e, "Browser close failed, killing process");
        kill(&mut browser).await;
    }
    if !exited_within(browser.wait(), BROWSER_EXIT_TIMEOUT).await {
        warn!(timeout_secs = BROWSER_EXIT_TIMEOUT.as_secs(), "Browser did not exit, killing process");
        kill(&mut browser).await;
    }
    handler.abort();
}

async fn kill(browser: &mut Browser) {
    if let Some(Err(e)) = browser.kill().await {
        warn!(error = %e, "Browser kill failed");
    }
}

/// Whether the process wait settled within `limit`. A failed wait counts as
/// settled: there is nothing left to reap.
async fn exited_within<T, E, F>(wait: F, limit: Duration) -> bool
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, wait).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "Browser process wait failed");
            true
        }
        Err(_) => false,
    }
}

/// File stem for debug artifacts: `<source>-<stage>-<unix_millis>`.
pub fn artifact_stem(source: &str, stage: &str, millis: i64) -> String {
    format!("{source}-{stage}-{millis}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::AmazonScraper;

    #[test]
    fn artifact_stem_names_source_and_stage() {
        assert_eq!(artifact_stem("amazon", "debug", 1_700_000_000_000), "amazon-debug-1700000000000");
    }

    #[tokio::test]
    async fn hung_process_wait_is_abandoned_after_the_limit() {
        let hung = std::future::pending::<std::io::Result<()>>();
        let started = Instant::now();

        assert!(!exited_within(hung, Duration::from_millis(50)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn finished_or_failed_wait_counts_as_exited() {
        let exited = async { Ok::<_, std::io::Error>(()) };
        assert!(exited_within(exited, BROWSER_EXIT_TIMEOUT).await);

        let failed = async { Err::<(), _>(std::io::Error::other("no such process")) };
        assert!(exited_within(failed, BROWSER_EXIT_TIMEOUT).await);
    }

    #[tokio::test]
    async fn empty_term_fails_before_launching_a_browser() {
        let extractor = BrowserExtractor::new(
            AmazonScraper::new().unwrap(),
            BrowserSettings {
                chrome_path: Some(PathBuf::from("/nonexistent/chrome")),
                artifact_dir: std::env::temp_dir(),
            },
        );

        let err = extractor.search_products("").await.unwrap_err();
        assert!(matches!(err, ScrapeError::EmptyTerm));
        assert_eq!(extractor.name(), "amazon");
    }
}
