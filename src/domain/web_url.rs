use std::collections::HashSet;

use url::Url;

use super::search_result::SearchResult;
use crate::error::ScrapeError;

/// Hosts that show up in search results but never are the business's own site.
pub const BLACK_LIST_DOMAINS: [&str; 9] = [
    "google.com",
    "amazon.com",
    "facebook.com",
    "linkedin.com",
    "instagram.com",
    "twitter.com",
    "youtube.com",
    "yelp.com",
    "wikipedia.org",
];

const NON_WEB_SCHEMES: [&str; 5] = ["mailto:", "tel:", "javascript:", "data:", "sms:"];

/// Brings a caller- or page-supplied URL into the single form used for navigation.
///
/// Adds `https://` when the scheme is missing, drops the fragment and any trailing slash
/// on a non-root path. Only http(s) URLs with a host are accepted.
pub fn normalize_url(raw: &str) -> Result<Url, ScrapeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::InvalidUrl(raw.to_string()));
    }

    let lowered = trimmed.to_lowercase();
    if NON_WEB_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return Err(ScrapeError::InvalidUrl(raw.to_string()));
    }

    let with_scheme = match trimmed.contains("://") {
        true => trimmed.to_string(),
        false => format!("https://{}", trimmed.trim_start_matches("//")),
    };

    let mut url =
        Url::parse(&with_scheme).map_err(|_| ScrapeError::InvalidUrl(raw.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScrapeError::InvalidUrl(raw.to_string()));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(ScrapeError::InvalidUrl(raw.to_string())),
    }

    url.set_fragment(None);
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url)
}

/// Scheme- and `www.`-insensitive identity of a page.
pub fn dedupe_key(url: &Url) -> String {
    let host = url
        .host_str()
        .map(|h| h.strip_prefix("www.").unwrap_or(h).to_lowercase())
        .unwrap_or_default();
    let path = url.path().trim_end_matches('/');

    match url.query() {
        Some(query) if !query.is_empty() => format!("{}{}?{}", host, path, query),
        _ => format!("{}{}", host, path),
    }
}

pub fn get_domain_from_url(url: &Url) -> Option<String> {
    url.host_str().map(|host| match host.strip_prefix("www.") {
        Some(h) => h.to_lowercase(),
        None => host.to_lowercase(),
    })
}

pub fn is_same_domain(a: &Url, b: &Url) -> bool {
    match (get_domain_from_url(a), get_domain_from_url(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn is_black_listed(url: &Url) -> bool {
    match get_domain_from_url(url) {
        Some(domain) => BLACK_LIST_DOMAINS
            .iter()
            .any(|&blacklist| domain == blacklist || domain.ends_with(&format!(".{}", blacklist))),
        None => true,
    }
}

/// Normalizes, filters and deduplicates search results, keeping first occurrences in order.
///
/// Applying it to its own output returns the same list.
pub fn dedupe_results(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();

    results
        .into_iter()
        .filter_map(|result| {
            let url = normalize_url(&result.url).ok()?;
            if is_black_listed(&url) || !seen.insert(dedupe_key(&url)) {
                return None;
            }
            Some(SearchResult {
                url: url.to_string(),
                ..result
            })
        })
        .take(limit)
        .collect()
}
