use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{domain::search_result::SearchResult, error::SearchError};

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
const GOOGLE_MAX_RESULTS_PER_PAGE: usize = 10;

const STOP_WORDS: [&str; 16] = [
    "the", "and", "or", "in", "of", "for", "near", "a", "an", "to", "best", "top", "site",
    "inurl", "intitle", "with",
];

/// One attempt against a search backend. Retrying is the client's job.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search_once(
        &self,
        query: &str,
        results_per_query: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub results_per_query: usize,
    /// Total attempts against the provider before falling back, at least one.
    pub retry_attempts: u32,
    pub rate_limit_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            results_per_query: 10,
            retry_attempts: 3,
            rate_limit_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Results plus whether they came from the heuristic fallback instead of the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub degraded: bool,
}

#[derive(Serialize)]
struct GoogleQuery<'a> {
    key: &'a str,
    cx: &'a str,
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Deserialize)]
struct GoogleItem {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

pub struct GoogleSearchProvider {
    client: Client,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchProvider {
    pub fn new(api_key: String, engine_id: String, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .user_agent(fake_user_agent::get_rua())
            .timeout(timeout)
            .build()?;

        Ok(GoogleSearchProvider {
            client,
            api_key,
            engine_id,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn search_once(
        &self,
        query: &str,
        results_per_query: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if self.api_key.is_empty() || self.engine_id.is_empty() {
            return Err(SearchError::NotConfigured);
        }

        let response = self
            .client
            .get(GOOGLE_SEARCH_URL)
            .query(&GoogleQuery {
                key: &self.api_key,
                cx: &self.engine_id,
                q: query,
                num: results_per_query.clamp(1, GOOGLE_MAX_RESULTS_PER_PAGE),
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(SearchError::RateLimited),
            status if !status.is_success() => return Err(SearchError::Status(status.as_u16())),
            _ => {}
        }

        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        Ok(body
            .items
            .into_iter()
            .map(|item| SearchResult {
                url: item.link,
                title: item.title,
                description: item.snippet,
            })
            .collect())
    }
}

/// Query-to-results lookup that never fails: bounded retries, then a guess.
pub struct SearchClient {
    provider: Arc<dyn SearchProvider>,
}

impl SearchClient {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        SearchClient { provider }
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        self.search_detailed(query, options).await.results
    }

    pub async fn search_detailed(&self, query: &str, options: &SearchOptions) -> SearchResponse {
        let attempts = options.retry_attempts.max(1);
        let mut attempt = 0;

        while attempt < attempts {
            attempt += 1;

            let outcome = tokio::time::timeout(
                options.attempt_timeout,
                self.provider.search_once(query, options.results_per_query),
            )
            .await
            .unwrap_or_else(|_| Err(SearchError::Timeout(options.attempt_timeout.as_millis())));

            let error = match outcome {
                Ok(results) => {
                    log::info!("Found {} results for query: {}", results.len(), query);
                    return SearchResponse {
                        results: results
                            .into_iter()
                            .take(options.results_per_query)
                            .collect(),
                        degraded: false,
                    };
                }
                Err(SearchError::NotConfigured) => {
                    log::warn!("Search provider not configured, guessing results for: {}", query);
                    break;
                }
                Err(e) => e,
            };

            log::error!(
                "Search attempt {}/{} failed for query '{}': {}",
                attempt,
                attempts,
                query,
                error
            );

            if attempt < attempts {
                tokio::time::sleep(retry_delay(options.rate_limit_delay, &error)).await;
            }
        }

        let results = heuristic_results(query, options.results_per_query);
        log::warn!(
            "Falling back to {} guessed results for query: {}",
            results.len(),
            query
        );

        SearchResponse {
            results,
            degraded: true,
        }
    }
}

fn retry_delay(base: Duration, error: &SearchError) -> Duration {
    let base = match error {
        SearchError::RateLimited => base * 2,
        _ => base,
    };
    let jitter_ms = rand::thread_rng().gen_range(0..=(base.as_millis() as u64 / 4));
    base + Duration::from_millis(jitter_ms)
}

/// Plausible websites derived from the query's own terms, without touching the network.
pub fn heuristic_results(query: &str, limit: usize) -> Vec<SearchResult> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .filter(|term| !STOP_WORDS.contains(&term.as_str()))
        .collect();

    if terms.is_empty() {
        return vec![];
    }

    let mut candidates = vec![terms.join(""), terms.join("-")];
    if terms.len() > 2 {
        candidates.push(terms[..2].join(""));
    }

    candidates
        .into_iter()
        .unique()
        .take(limit)
        .map(|label| SearchResult {
            url: format!("https://www.{}.com", label),
            title: label.clone(),
            description: format!("Guessed website for \"{}\"", query.trim()),
        })
        .collect()
}
