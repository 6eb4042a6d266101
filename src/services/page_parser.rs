use std::collections::BTreeMap;

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::{
    business::{collect_social_links, BusinessProfile, TeamMember},
    html_tag::{extract_company_name, extract_team_member, HtmlTag},
    web_url::{dedupe_key, is_same_domain, normalize_url},
};

/// Paths containing these are visited first, in this order.
const PRIORITY_KEYWORDS: [&str; 5] = ["about", "team", "contact", "leadership", "staff"];

const SKIPPED_EXTENSIONS: [&str; 9] = [
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".zip", ".mp4", ".webp",
];

const TEAM_CARD_SELECTOR: &str = "[class*='team'] [class*='member'], [class*='team-member'], \
    [class*='staff'], [class*='person'], [class*='leader'], [class*='bio'], [class*='profile-card']";

const MIN_DESCRIPTION_LEN: usize = 40;

/// What one rendered page tells us about a business.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub social_links: BTreeMap<String, String>,
    pub team_members: Vec<TeamMember>,
    pub internal_links: Vec<Url>,
}

impl PageData {
    pub fn into_profile(self, url: &Url) -> BusinessProfile {
        let name = self
            .name
            .unwrap_or_else(|| BusinessProfile::name_from_url(url));

        let mut profile = BusinessProfile::new(&name, url.as_str());
        profile.description = self.description;
        profile.social_links = self.social_links;
        profile.merge_team_members(self.team_members);
        profile
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .join(separator)
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

fn extract_name(document: &Html) -> Option<String> {
    if let Some(site_name) = meta_content(document, "meta[property='og:site_name']") {
        return Some(site_name);
    }

    let title = selector("title")?;
    document
        .select(&title)
        .next()
        .map(|el| HtmlTag::TitleTag(element_text(el, " ")))
        .and_then(|tag| extract_company_name(&tag))
}

fn extract_description(document: &Html) -> Option<String> {
    meta_content(document, "meta[name='description']")
        .or_else(|| meta_content(document, "meta[property='og:description']"))
        .or_else(|| {
            let paragraph = selector("p")?;
            document
                .select(&paragraph)
                .map(|el| element_text(el, " "))
                .find(|text| text.len() >= MIN_DESCRIPTION_LEN)
        })
}

fn extract_team_members(document: &Html) -> Vec<TeamMember> {
    let mut tags = vec![];

    if let Some(cards) = selector(TEAM_CARD_SELECTOR) {
        tags.extend(
            document
                .select(&cards)
                .map(|el| HtmlTag::TeamCardTag(element_text(el, "\n"))),
        );
    }
    if let Some(headings) = selector("h2, h3, h4") {
        tags.extend(
            document
                .select(&headings)
                .map(|el| HtmlTag::HeadingTag(element_text(el, " "))),
        );
    }

    let mut profile = BusinessProfile::new("", "");
    profile.merge_team_members(tags.iter().filter_map(extract_team_member).collect());
    profile.team_members
}

fn extract_links(document: &Html, base: &Url) -> Vec<Url> {
    let Some(anchors) = selector("a[href]") else {
        return vec![];
    };

    document
        .select(&anchors)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
}

/// Parses a page's HTML into business signals. Relative links resolve against `base`.
pub fn parse_page(html: &str, base: &Url) -> PageData {
    let document = Html::parse_document(html);
    let links = extract_links(&document, base);

    let internal_links = links
        .iter()
        .filter(|link| is_same_domain(link, base))
        .filter_map(|link| normalize_url(link.as_str()).ok())
        .unique_by(dedupe_key)
        .collect();

    PageData {
        name: extract_name(&document),
        description: extract_description(&document),
        social_links: collect_social_links(links.iter().map(Url::as_str)),
        team_members: extract_team_members(&document),
        internal_links,
    }
}

fn priority(url: &Url) -> usize {
    let path = url.path().to_lowercase();
    PRIORITY_KEYWORDS
        .iter()
        .position(|keyword| path.contains(keyword))
        .unwrap_or(PRIORITY_KEYWORDS.len())
}

/// Internal links worth following from `landing`, most promising first, never the landing page itself.
pub fn prioritized_links(landing: &Url, links: &[Url], max_pages: usize) -> Vec<Url> {
    let landing_key = dedupe_key(landing);

    links
        .iter()
        .filter(|link| is_same_domain(link, landing))
        .filter(|link| {
            let path = link.path().to_lowercase();
            !SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        })
        .filter(|link| dedupe_key(link) != landing_key)
        .unique_by(|link| dedupe_key(link))
        .sorted_by_key(|link| priority(link))
        .take(max_pages)
        .cloned()
        .collect()
}
