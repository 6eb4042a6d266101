use serde::{Deserialize, Serialize};

use super::business::TeamMember;
use crate::error::ContactParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalDetails {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub experience: Vec<String>,
}

/// A team member after research. Always carries the discovered name and title,
/// whatever happened during enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTeamMember {
    pub name: String,
    pub title: String,
    pub company_name: String,
    pub email: Option<String>,
    pub contact_info: ContactInfo,
    pub professional_details: Option<ProfessionalDetails>,
    pub research_summary: String,
    pub confidence: ResearchConfidence,
}

impl EnrichedTeamMember {
    pub fn from_parsed(member: &TeamMember, company_name: &str, parsed: ParsedContact) -> Self {
        let confidence = match (&parsed.email, &parsed.linkedin) {
            (Some(_), _) if !parsed.sources.is_empty() => ResearchConfidence::High,
            (Some(_), _) | (None, Some(_)) => ResearchConfidence::Medium,
            (None, None) => ResearchConfidence::Low,
        };
        let research_summary = parsed.summary.clone().unwrap_or_else(|| {
            format!(
                "Found {} source(s) for {} at {}",
                parsed.sources.len(),
                member.name,
                company_name
            )
        });

        EnrichedTeamMember {
            name: member.name.clone(),
            title: member.title.clone(),
            company_name: company_name.to_string(),
            email: parsed.email.clone(),
            contact_info: ContactInfo {
                email: parsed.email,
                linkedin: parsed.linkedin,
                sources: parsed.sources,
            },
            professional_details: parsed.professional_details,
            research_summary,
            confidence,
        }
    }

    /// Low-confidence record used when research could not produce anything trustworthy.
    pub fn fallback(
        member: &TeamMember,
        company_name: &str,
        reason: &str,
        sources: Vec<String>,
    ) -> Self {
        EnrichedTeamMember {
            name: member.name.clone(),
            title: member.title.clone(),
            company_name: company_name.to_string(),
            email: None,
            contact_info: ContactInfo {
                email: None,
                linkedin: None,
                sources,
            },
            professional_details: None,
            research_summary: format!("Research failed for {}: {}", member.name, reason),
            confidence: ResearchConfidence::Low,
        }
    }

    pub fn usable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.contact_info.email.as_deref())
            .filter(|email| is_valid_email(email))
    }
}

/// Contact fields the language model claims to have verified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContact {
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub professional_details: Option<ProfessionalDetails>,
    pub sources: Vec<String>,
    pub summary: Option<String>,
}

#[derive(Deserialize)]
struct RawContactResponse {
    email: Option<String>,
    linkedin: Option<String>,
    professional_details: Option<ProfessionalDetails>,
    #[serde(default)]
    sources: Vec<String>,
    summary: Option<String>,
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Cuts the outermost `{...}` out of free text, ignoring markdown fences and chatter.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    match end > start {
        true => Some(&text[start..=end]),
        false => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v.to_lowercase() != "null" && v.to_lowercase() != "unknown")
}

/// Validated decode of a model response into contact fields.
///
/// An email that is present but malformed is an error, since the rest of the record
/// was produced by the same confused completion.
pub fn parse_contact_response(text: &str) -> Result<ParsedContact, ContactParseError> {
    let json = extract_json_object(text).ok_or(ContactParseError::NoJsonObject)?;
    let raw: RawContactResponse = serde_json::from_str(json)
        .map_err(|e| ContactParseError::Malformed(e.to_string()))?;

    let email = match non_empty(raw.email) {
        Some(email) if is_valid_email(&email) => Some(email.to_lowercase()),
        Some(email) => return Err(ContactParseError::InvalidEmail(email)),
        None => None,
    };
    let linkedin = non_empty(raw.linkedin).filter(|link| link.contains("linkedin.com"));
    let sources = raw
        .sources
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(ParsedContact {
        email,
        linkedin,
        professional_details: raw.professional_details,
        sources,
        summary: non_empty(raw.summary),
    })
}

#[cfg(test)]
mod tests {
    use super::{is_valid_email, parse_contact_response, EnrichedTeamMember, ResearchConfidence};
    use crate::{domain::business::TeamMember, error::ContactParseError};

    #[test]
    fn parses_fenced_json() {
        let text = r#"Here you go:
```json
{
  "email": "Jane@Acme.io",
  "linkedin": "https://www.linkedin.com/in/janedoe",
  "professional_details": {"role": "CEO", "company": "Acme", "experience": ["Globex"]},
  "sources": ["https://acme.io/team"]
}
```"#;
        let parsed = parse_contact_response(text).unwrap();

        assert_eq!(parsed.email.as_deref(), Some("jane@acme.io"));
        assert_eq!(
            parsed.linkedin.as_deref(),
            Some("https://www.linkedin.com/in/janedoe")
        );
        assert_eq!(parsed.professional_details.unwrap().role, "CEO");
        assert_eq!(parsed.sources, vec!["https://acme.io/team"]);
    }

    #[test]
    fn null_fields_are_allowed() {
        let parsed =
            parse_contact_response(r#"{"email": null, "linkedin": "", "sources": []}"#).unwrap();
        assert_eq!(parsed.email, None);
        assert_eq!(parsed.linkedin, None);
    }

    #[test]
    fn rejects_prose_and_bad_shapes() {
        assert_eq!(
            parse_contact_response("I could not find anything."),
            Err(ContactParseError::NoJsonObject)
        );
        assert!(matches!(
            parse_contact_response(r#"{"email": 42}"#),
            Err(ContactParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_contact_response(r#"{"email": "jane at acme"}"#),
            Err(ContactParseError::InvalidEmail(_))
        ));
    }

    #[test]
    fn fallback_keeps_identity() {
        let member = TeamMember::new("Jane Doe", "CEO");
        let enriched = EnrichedTeamMember::fallback(&member, "Acme", "timeout", vec![]);

        assert_eq!(enriched.name, "Jane Doe");
        assert_eq!(enriched.title, "CEO");
        assert_eq!(enriched.confidence, ResearchConfidence::Low);
        assert!(enriched.usable_email().is_none());
        assert!(enriched.research_summary.contains("timeout"));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jane.doe@acme.io"));
        assert!(!is_valid_email("jane@acme"));
        assert!(!is_valid_email("@acme.io"));
        assert!(!is_valid_email("jane@@acme.io"));
        assert!(!is_valid_email("jane doe@acme.io"));
    }
}
