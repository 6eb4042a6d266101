use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// What the caller is prospecting for. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub business_type: String,
    pub location: Option<String>,
    pub max_results: Option<usize>,
}

impl SearchCriteria {
    pub fn new(business_type: &str) -> Self {
        SearchCriteria {
            business_type: business_type.to_string(),
            location: None,
            max_results: None,
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Rejects criteria that cannot produce a meaningful run before any network work starts.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.business_type.trim().is_empty() {
            return Err(PipelineError::InvalidCriteria(
                "business_type must not be empty".to_string(),
            ));
        }
        if self.max_results == Some(0) {
            return Err(PipelineError::InvalidCriteria(
                "max_results must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `business_type` and `location` verbatim, used when no generated query is available.
    pub fn fallback_query(&self) -> String {
        match self.location.as_deref().map(str::trim) {
            Some(location) if !location.is_empty() => {
                format!("{} {}", self.business_type.trim(), location)
            }
            _ => self.business_type.trim().to_string(),
        }
    }

    pub fn result_limit(&self, default_max_results: usize) -> usize {
        self.max_results.unwrap_or(default_max_results).max(1)
    }
}
