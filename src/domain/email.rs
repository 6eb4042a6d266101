use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{business::BusinessProfile, contact::EnrichedTeamMember};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
    pub recipient_email: String,
    pub recipient_name: String,
    pub variables: BTreeMap<String, String>,
}

/// Template variables describing the recipient and their business.
pub fn email_variables(
    member: &EnrichedTeamMember,
    business: &BusinessProfile,
) -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();

    let first_name = member
        .name
        .split_whitespace()
        .next()
        .unwrap_or(&member.name)
        .to_string();

    variables.insert("first_name".to_string(), first_name);
    variables.insert("full_name".to_string(), member.name.clone());
    variables.insert("title".to_string(), member.title.clone());
    variables.insert("company_name".to_string(), business.name.clone());
    variables.insert("company_website".to_string(), business.website_url.clone());
    if let Some(description) = &business.description {
        variables.insert("company_description".to_string(), description.clone());
    }
    if let Some(linkedin) = &member.contact_info.linkedin {
        variables.insert("linkedin".to_string(), linkedin.clone());
    }

    variables
}

/// Deterministic draft used whenever the drafting call fails.
pub fn fallback_content(variables: &BTreeMap<String, String>) -> (String, String) {
    let get = |key: &str| variables.get(key).map(String::as_str).unwrap_or("");

    let subject = format!("Quick question for {}", get("company_name"));

    let role_line = match get("title") {
        "" => format!("I came across {} and", get("company_name")),
        title => format!(
            "I came across {} and your work as {}, and",
            get("company_name"),
            title
        ),
    };
    let body = format!(
        "Hi {},\n\n{} wanted to reach out directly. I'd love to share a few ideas that could help {} grow.\n\nWould you be open to a short call next week?\n\nBest regards",
        get("first_name"),
        role_line,
        get("company_name"),
    );

    (subject, body)
}
