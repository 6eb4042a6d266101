use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub description: String,
}

impl SearchResult {
    pub fn new(url: &str, title: &str, description: &str) -> Self {
        SearchResult {
            url: url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}
