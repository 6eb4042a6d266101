use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use url::Url;

use super::web_url::get_domain_from_url;

/// Names closer than this are treated as the same person found on two pages.
const SAME_PERSON_SIMILARITY: f64 = 0.93;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    #[serde(default)]
    pub title: String,
}

impl TeamMember {
    pub fn new(name: &str, title: &str) -> Self {
        TeamMember {
            name: name.trim().to_string(),
            title: title.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub name: String,
    pub website_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
}

impl BusinessProfile {
    pub fn new(name: &str, website_url: &str) -> Self {
        BusinessProfile {
            name: name.to_string(),
            website_url: website_url.to_string(),
            description: None,
            social_links: BTreeMap::new(),
            team_members: vec![],
        }
    }

    /// Adds members not already present, keeping the existing entry on conflicts.
    pub fn merge_team_members(&mut self, members: Vec<TeamMember>) {
        for member in members {
            if member.name.is_empty() {
                continue;
            }
            let duplicate = self
                .team_members
                .iter_mut()
                .find(|existing| is_same_person(&existing.name, &member.name));

            match duplicate {
                Some(existing) => {
                    if existing.title.is_empty() && !member.title.is_empty() {
                        existing.title = member.title;
                    }
                }
                None => self.team_members.push(member),
            }
        }
    }

    pub fn merge_social_links(&mut self, links: BTreeMap<String, String>) {
        for (platform, link) in links {
            self.social_links.entry(platform).or_insert(link);
        }
    }

    /// Name derived from the domain when a page gives nothing better.
    pub fn name_from_url(url: &Url) -> String {
        get_domain_from_url(url)
            .and_then(|domain| domain.split('.').next().map(str::to_string))
            .map(|label| {
                label
                    .split('-')
                    .filter(|part| !part.is_empty())
                    .map(capitalize)
                    .collect::<Vec<String>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn is_same_person(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    a == b || jaro_winkler(&a, &b) >= SAME_PERSON_SIMILARITY
}

/// Maps a profile link to the platform it belongs to.
pub fn social_platform(link: &str) -> Option<&'static str> {
    let url = Url::parse(link).ok()?;
    let domain = get_domain_from_url(&url)?;

    match domain.as_str() {
        "facebook.com" | "fb.com" | "m.facebook.com" => Some("facebook"),
        "twitter.com" | "x.com" | "mobile.twitter.com" => Some("twitter"),
        "linkedin.com" => Some("linkedin"),
        "instagram.com" => Some("instagram"),
        "youtube.com" | "youtu.be" => Some("youtube"),
        "tiktok.com" => Some("tiktok"),
        d if d.ends_with(".linkedin.com") => Some("linkedin"),
        _ => None,
    }
}

/// Keeps the first link seen per platform.
pub fn collect_social_links<I, S>(links: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut social_links = BTreeMap::new();
    for link in links {
        let link = link.as_ref();
        if let Some(platform) = social_platform(link) {
            social_links
                .entry(platform.to_string())
                .or_insert_with(|| link.to_string());
        }
    }
    social_links
}
