use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::website_scraper::{ExtractionStrategy, ScrapeOptions, StrategyKind};
use crate::{
    domain::business::{collect_social_links, BusinessProfile, TeamMember},
    error::ScrapeError,
};

const FIRECRAWL_SCRAPE_URL: &str = "https://api.firecrawl.dev/v1/scrape";

const EXTRACT_PROMPT: &str = "Extract the company name, a one or two sentence description of \
    what the company does, links to its social media profiles, and every person listed as part \
    of the team with their job title.";

#[derive(Debug, Deserialize)]
struct FirecrawlResponse {
    #[serde(default)]
    success: bool,
    data: Option<FirecrawlData>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlData {
    extract: Option<ExtractedBusiness>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractedBusiness {
    company_name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    social_links: Vec<String>,
    #[serde(default)]
    team_members: Vec<ExtractedMember>,
}

#[derive(Debug, Deserialize)]
struct ExtractedMember {
    name: String,
    #[serde(default)]
    title: Option<String>,
}

fn extract_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "company_name": { "type": "string" },
            "description": { "type": "string" },
            "social_links": { "type": "array", "items": { "type": "string" } },
            "team_members": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "title": { "type": "string" }
                    },
                    "required": ["name"]
                }
            }
        },
        "required": ["company_name"]
    })
}

/// Managed extraction through Firecrawl's structured scrape endpoint.
pub struct FirecrawlStrategy {
    client: Client,
    api_key: String,
}

impl FirecrawlStrategy {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(FirecrawlStrategy { client, api_key })
    }
}

#[async_trait]
impl ExtractionStrategy for FirecrawlStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Firecrawl
    }

    async fn extract(
        &self,
        url: &Url,
        _options: &ScrapeOptions,
    ) -> Result<BusinessProfile, ScrapeError> {
        if self.api_key.is_empty() {
            return Err(ScrapeError::NotConfigured("firecrawl api key"));
        }

        let response = self
            .client
            .post(FIRECRAWL_SCRAPE_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "url": url.as_str(),
                "formats": ["extract"],
                "extract": {
                    "schema": extract_schema(),
                    "prompt": EXTRACT_PROMPT,
                }
            }))
            .send()
            .await?;

        let status = response.status();
        let body: FirecrawlResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Service(format!("HTTP {}: {}", status, e)))?;

        into_profile(body, url)
    }
}

fn into_profile(response: FirecrawlResponse, url: &Url) -> Result<BusinessProfile, ScrapeError> {
    if !response.success {
        return Err(ScrapeError::Service(
            response
                .error
                .unwrap_or_else(|| "firecrawl reported failure".to_string()),
        ));
    }

    let extracted = response
        .data
        .and_then(|data| data.extract)
        .ok_or_else(|| ScrapeError::NoData(url.to_string()))?;

    let name = extracted
        .company_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| BusinessProfile::name_from_url(url));

    let mut profile = BusinessProfile::new(&name, url.as_str());
    profile.description = extracted
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    profile.social_links = collect_social_links(&extracted.social_links);
    profile.merge_team_members(
        extracted
            .team_members
            .iter()
            .map(|m| TeamMember::new(&m.name, m.title.as_deref().unwrap_or("")))
            .collect(),
    );

    Ok(profile)
}
