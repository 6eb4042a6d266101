//! Typed errors for each collaborator.
//!
//! None of these cross a component's public contract under expected failure modes:
//! components log them and degrade. They exist so that the degraded value can say why.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search provider rate limited the request")]
    RateLimited,

    #[error("search provider returned status {0}")]
    Status(u16),

    #[error("search response could not be decoded: {0}")]
    Decode(String),

    #[error("search request timed out after {0}ms")]
    Timeout(u128),

    #[error("search provider is not configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction service error: {0}")]
    Service(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("navigation to {url} timed out")]
    NavigationTimeout { url: String },

    #[error("no business data found on {0}")]
    NoData(String),

    #[error("strategy is not configured: {0}")]
    NotConfigured(&'static str),
}

impl From<thirtyfour::error::WebDriverError> for ScrapeError {
    fn from(value: thirtyfour::error::WebDriverError) -> Self {
        ScrapeError::Browser(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("openai error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("completion timed out")]
    Timeout,

    #[error("no content in completion response")]
    EmptyResponse,
}

/// Why a model response could not be turned into contact data.
#[derive(Debug, Error, PartialEq)]
pub enum ContactParseError {
    #[error("response contains no json object")]
    NoJsonObject,

    #[error("response json is malformed: {0}")]
    Malformed(String),

    #[error("email field is not a valid address: {0}")]
    InvalidEmail(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage rejected record: {0}")]
    Rejected(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("a run is already active for user {0}")]
    AlreadyRunning(String),

    #[error("run was cancelled")]
    Cancelled,
}
