//! Scripted collaborators shared by service tests.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use url::Url;

use super::{
    openai_client::{CompletionModel, Prompt},
    search_client::SearchProvider,
    website_scraper::{ExtractionStrategy, ScrapeOptions, StrategyKind},
};
use crate::{
    domain::{business::BusinessProfile, search_result::SearchResult},
    error::{AiError, ScrapeError, SearchError},
};

type SearchResponder = dyn Fn(&str) -> Result<Vec<SearchResult>, SearchError> + Send + Sync;

pub struct ScriptedSearch {
    responder: Box<SearchResponder>,
    pub queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<Vec<SearchResult>, SearchError> + Send + Sync + 'static,
    {
        Arc::new(ScriptedSearch {
            responder: Box::new(responder),
            queries: Mutex::new(vec![]),
        })
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search_once(
        &self,
        query: &str,
        _results_per_query: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        (self.responder)(query)
    }
}

type ModelResponder = dyn Fn(&Prompt) -> Result<String, AiError> + Send + Sync;

pub struct ScriptedModel {
    responder: Box<ModelResponder>,
    pub calls: AtomicU32,
}

impl ScriptedModel {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Prompt) -> Result<String, AiError> + Send + Sync + 'static,
    {
        Arc::new(ScriptedModel {
            responder: Box::new(responder),
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        ScriptedModel::new(|_| Err(AiError::EmptyResponse))
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(prompt)
    }
}

type ProfileResponder = dyn Fn(&Url) -> Result<BusinessProfile, ScrapeError> + Send + Sync;

/// Extraction strategy answering from a closure, registered as the HTTP fallback.
pub struct ScriptedStrategy {
    responder: Box<ProfileResponder>,
}

impl ScriptedStrategy {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Url) -> Result<BusinessProfile, ScrapeError> + Send + Sync + 'static,
    {
        Arc::new(ScriptedStrategy {
            responder: Box::new(responder),
        })
    }
}

#[async_trait]
impl ExtractionStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Http
    }

    async fn extract(
        &self,
        url: &Url,
        _options: &ScrapeOptions,
    ) -> Result<BusinessProfile, ScrapeError> {
        (self.responder)(url)
    }
}
