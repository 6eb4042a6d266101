use serde::Serialize;

use super::{business::BusinessProfile, contact::EnrichedTeamMember};

/// A researched person persisted for later outreach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    pub user_id: String,
    pub business_name: String,
    pub website_url: String,
    pub name: String,
    pub title: String,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub sources: Vec<String>,
    pub research_summary: String,
}

impl Lead {
    pub fn from_member(user_id: &str, business: &BusinessProfile, member: &EnrichedTeamMember) -> Self {
        Lead {
            user_id: user_id.to_string(),
            business_name: business.name.clone(),
            website_url: business.website_url.clone(),
            name: member.name.clone(),
            title: member.title.clone(),
            email: member.usable_email().map(str::to_string),
            linkedin: member.contact_info.linkedin.clone(),
            sources: member.contact_info.sources.clone(),
            research_summary: member.research_summary.clone(),
        }
    }
}
