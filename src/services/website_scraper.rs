use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::page_parser::parse_page;
use crate::{
    domain::{business::BusinessProfile, web_url::normalize_url},
    error::ScrapeError,
};

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub use_firecrawl: bool,
    /// Headless browser rendering through WebDriver.
    pub use_browser: bool,
    /// Internal links the browser may follow after the landing page.
    pub max_pages: usize,
    pub navigation_timeout: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        ScrapeOptions {
            use_firecrawl: true,
            use_browser: true,
            max_pages: 3,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrategyKind {
    Firecrawl,
    Browser,
    Http,
}

impl StrategyKind {
    fn enabled(&self, options: &ScrapeOptions) -> bool {
        match self {
            StrategyKind::Firecrawl => options.use_firecrawl,
            StrategyKind::Browser => options.use_browser,
            StrategyKind::Http => true,
        }
    }
}

/// One way of turning a URL into a business profile.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn extract(
        &self,
        url: &Url,
        options: &ScrapeOptions,
    ) -> Result<BusinessProfile, ScrapeError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub business_data: Option<BusinessProfile>,
    pub error: Option<String>,
}

impl ScrapeOutcome {
    fn found(profile: BusinessProfile) -> Self {
        ScrapeOutcome {
            success: true,
            business_data: Some(profile),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        ScrapeOutcome {
            success: false,
            business_data: None,
            error: Some(error),
        }
    }
}

/// Tries each enabled strategy in `StrategyKind` order; the first profile wins.
pub struct WebsiteScraper {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
}

impl WebsiteScraper {
    pub fn new(mut strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        strategies.sort_by_key(|strategy| strategy.kind());
        WebsiteScraper { strategies }
    }

    pub async fn scrape_website(&self, url: &str, options: &ScrapeOptions) -> ScrapeOutcome {
        let url = match normalize_url(url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Not scraping {}: {}", url, e);
                return ScrapeOutcome::failed(e.to_string());
            }
        };

        let mut errors = vec![];

        for strategy in self
            .strategies
            .iter()
            .filter(|strategy| strategy.kind().enabled(options))
        {
            match strategy.extract(&url, options).await {
                Ok(profile) => {
                    log::info!(
                        "Scraped {} with {:?}: {} team members",
                        url,
                        strategy.kind(),
                        profile.team_members.len()
                    );
                    return ScrapeOutcome::found(profile);
                }
                Err(e) => {
                    log::warn!("{:?} strategy failed for {}: {}", strategy.kind(), url, e);
                    errors.push(format!("{:?}: {}", strategy.kind(), e));
                }
            }
        }

        match errors.is_empty() {
            true => ScrapeOutcome::failed(format!("no extraction strategy available for {}", url)),
            false => ScrapeOutcome::failed(errors.join("; ")),
        }
    }
}

/// Plain GET of the landing page with best-effort HTML scraping.
pub struct HttpStrategy {
    client: Client,
}

impl HttpStrategy {
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(fake_user_agent::get_rua())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(HttpStrategy { client })
    }
}

#[async_trait]
impl ExtractionStrategy for HttpStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Http
    }

    async fn extract(
        &self,
        url: &Url,
        _options: &ScrapeOptions,
    ) -> Result<BusinessProfile, ScrapeError> {
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Service(format!("HTTP {} for {}", status, url)));
        }

        let html = response.text().await?;
        if html.trim().is_empty() {
            return Err(ScrapeError::NoData(url.to_string()));
        }

        Ok(parse_page(&html, url).into_profile(url))
    }
}
