use std::{collections::BTreeMap, sync::Arc};

use serde::Deserialize;

use super::openai_client::{CompletionModel, Prompt};
use crate::domain::{
    business::BusinessProfile,
    contact::EnrichedTeamMember,
    email::{email_variables, fallback_content, GeneratedEmail},
};

const DRAFT_SYSTEM_PROMPT: &str = "You write short, friendly B2B cold outreach emails. Keep the \
    body under 120 words, address the recipient by first name, reference their company \
    specifically and end with a single low-pressure call to action. Respond with a JSON object \
    with the keys \"subject\" and \"body\" only.";

#[derive(Deserialize)]
struct Draft {
    subject: String,
    body: String,
}

fn draft_prompt(variables: &BTreeMap<String, String>) -> String {
    variables
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<String>>()
        .join("\n")
}

fn parse_draft(content: &str) -> Option<(String, String)> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    let draft: Draft = serde_json::from_str(content.get(start..=end)?).ok()?;

    let subject = draft.subject.trim().to_string();
    let body = draft.body.trim().to_string();
    match subject.is_empty() || body.is_empty() {
        true => None,
        false => Some((subject, body)),
    }
}

pub struct EmailContentGenerator {
    model: Arc<dyn CompletionModel>,
}

impl EmailContentGenerator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        EmailContentGenerator { model }
    }

    /// Drafts an outreach email, or `None` when the member has no address to send to.
    pub async fn generate_email_content(
        &self,
        member: &EnrichedTeamMember,
        business: &BusinessProfile,
    ) -> Option<GeneratedEmail> {
        let recipient_email = member.usable_email()?.to_string();
        let variables = email_variables(member, business);

        let prompt = Prompt::json(DRAFT_SYSTEM_PROMPT, &draft_prompt(&variables));
        let drafted = match self.model.complete(&prompt).await {
            Ok(content) => parse_draft(&content),
            Err(e) => {
                log::error!("Email draft failed for {}: {}", member.name, e);
                None
            }
        };

        let (subject, body) = drafted.unwrap_or_else(|| {
            log::warn!("Using template email for {}", member.name);
            fallback_content(&variables)
        });

        Some(GeneratedEmail {
            subject,
            body,
            recipient_email,
            recipient_name: member.name.clone(),
            variables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_draft, EmailContentGenerator};
    use crate::{
        domain::{
            business::{BusinessProfile, TeamMember},
            contact::EnrichedTeamMember,
        },
        services::testing::ScriptedModel,
    };

    fn member(email: Option<&str>) -> EnrichedTeamMember {
        let mut member =
            EnrichedTeamMember::fallback(&TeamMember::new("Jane Doe", "CEO"), "Acme", "n/a", vec![]);
        member.email = email.map(str::to_string);
        member
    }

    #[tokio::test]
    async fn no_email_no_draft() {
        let model = ScriptedModel::failing();
        let generator = EmailContentGenerator::new(model.clone());
        let business = BusinessProfile::new("Acme", "https://acme.io/");

        assert_eq!(generator.generate_email_content(&member(None), &business).await, None);
        assert_eq!(
            generator
                .generate_email_content(&member(Some("not-an-email")), &business)
                .await,
            None
        );
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn drafting_failure_uses_template_once() {
        let model = ScriptedModel::failing();
        let generator = EmailContentGenerator::new(model.clone());
        let business = BusinessProfile::new("Acme", "https://acme.io/");

        let email = generator
            .generate_email_content(&member(Some("jane@acme.io")), &business)
            .await
            .unwrap();

        assert_eq!(model.call_count(), 1);
        assert_eq!(email.subject, "Quick question for Acme");
        assert_eq!(email.recipient_email, "jane@acme.io");
        assert_eq!(email.recipient_name, "Jane Doe");
        assert_eq!(email.variables["company_website"], "https://acme.io/");
    }

    #[tokio::test]
    async fn model_draft_is_used() {
        let model = ScriptedModel::new(|_| {
            Ok(r#"{"subject": "Hello Acme", "body": "Hi Jane, ..."}"#.to_string())
        });
        let generator = EmailContentGenerator::new(model);
        let business = BusinessProfile::new("Acme", "https://acme.io/");

        let email = generator
            .generate_email_content(&member(Some("jane@acme.io")), &business)
            .await
            .unwrap();

        assert_eq!(email.subject, "Hello Acme");
        assert_eq!(email.body, "Hi Jane, ...");
    }

    #[test]
    fn blank_draft_is_rejected() {
        assert_eq!(parse_draft(r#"{"subject": " ", "body": "x"}"#), None);
        assert_eq!(parse_draft("no json"), None);
    }
}
