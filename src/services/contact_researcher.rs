use std::{collections::HashSet, sync::Arc};

use futures::{stream, StreamExt};

use super::{
    openai_client::{CompletionModel, Prompt},
    search_client::{SearchClient, SearchOptions},
};
use crate::domain::{
    business::TeamMember,
    contact::{parse_contact_response, EnrichedTeamMember},
    search_result::SearchResult,
};

const RESEARCH_SYSTEM_PROMPT: &str = "You are a B2B research assistant. Using only the search \
    evidence provided, find the professional contact details of the person described. Respond \
    with a single JSON object and nothing else, with the keys: \"email\" (string or null), \
    \"linkedin\" (profile URL or null), \"professional_details\" (object with \"role\", \
    \"company\", \"experience\" as a list of strings), \"sources\" (list of URLs you relied on) \
    and \"summary\" (one sentence). Never invent an email address that is not supported by the \
    evidence.";

#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub max_search_queries_per_member: usize,
    /// One attempt per query instead of the search client's bounded retry.
    pub skip_retries: bool,
    pub search: SearchOptions,
    /// Members researched at the same time.
    pub concurrency: usize,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        ResearchOptions {
            max_search_queries_per_member: 3,
            skip_retries: true,
            search: SearchOptions::default(),
            concurrency: 4,
        }
    }
}

impl ResearchOptions {
    fn search_options(&self) -> SearchOptions {
        match self.skip_retries {
            true => SearchOptions {
                retry_attempts: 1,
                ..self.search.clone()
            },
            false => self.search.clone(),
        }
    }
}

pub fn build_research_queries(member: &TeamMember, company_name: &str, max: usize) -> Vec<String> {
    let mut queries = vec![
        format!("\"{}\" \"{}\"", member.name, company_name),
        format!("\"{}\" linkedin", member.name),
        format!("\"{}\" \"{}\" email", member.name, company_name),
    ];
    if !member.title.is_empty() {
        queries.push(format!("\"{}\" {} {}", member.name, member.title, company_name));
    }

    queries.truncate(max);
    queries
}

fn evidence_prompt(member: &TeamMember, company_name: &str, evidence: &[SearchResult]) -> String {
    let mut prompt = format!(
        "Person: {}\nTitle: {}\nCompany: {}\n\nSearch evidence:\n",
        member.name,
        match member.title.is_empty() {
            true => "unknown",
            false => member.title.as_str(),
        },
        company_name
    );

    for (index, result) in evidence.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {}\n   {}\n   {}\n",
            index + 1,
            result.title,
            result.url,
            result.description
        ));
    }

    prompt
}

/// Turns bare team members into contactable records from search evidence and one model call each.
pub struct ContactResearcher {
    search: Arc<SearchClient>,
    model: Arc<dyn CompletionModel>,
}

impl ContactResearcher {
    pub fn new(search: Arc<SearchClient>, model: Arc<dyn CompletionModel>) -> Self {
        ContactResearcher { search, model }
    }

    /// One record per member, in input order, whatever fails along the way.
    pub async fn research_team_members(
        &self,
        members: &[TeamMember],
        company_name: &str,
        options: &ResearchOptions,
    ) -> Vec<EnrichedTeamMember> {
        stream::iter(members.to_vec())
            .map(|member| async move {
                self.research_member(&member, company_name, options).await
            })
            .buffered(options.concurrency.max(1))
            .collect()
            .await
    }

    pub async fn research_member(
        &self,
        member: &TeamMember,
        company_name: &str,
        options: &ResearchOptions,
    ) -> EnrichedTeamMember {
        let evidence = self.gather_evidence(member, company_name, options).await;
        let sources: Vec<String> = evidence.iter().map(|r| r.url.clone()).collect();

        if evidence.is_empty() {
            log::warn!("No search evidence for {} at {}", member.name, company_name);
            return EnrichedTeamMember::fallback(
                member,
                company_name,
                "no search evidence found",
                sources,
            );
        }

        let prompt = Prompt::json(
            RESEARCH_SYSTEM_PROMPT,
            &evidence_prompt(member, company_name, &evidence),
        );

        let response = match self.model.complete(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Research completion failed for {}: {}", member.name, e);
                return EnrichedTeamMember::fallback(member, company_name, &e.to_string(), sources);
            }
        };

        match parse_contact_response(&response) {
            Ok(mut parsed) => {
                if parsed.sources.is_empty() {
                    parsed.sources = sources;
                }
                log::info!(
                    "Researched {} at {}: email found: {}",
                    member.name,
                    company_name,
                    parsed.email.is_some()
                );
                EnrichedTeamMember::from_parsed(member, company_name, parsed)
            }
            Err(e) => {
                log::warn!("Unusable research response for {}: {}", member.name, e);
                EnrichedTeamMember::fallback(member, company_name, &e.to_string(), sources)
            }
        }
    }

    async fn gather_evidence(
        &self,
        member: &TeamMember,
        company_name: &str,
        options: &ResearchOptions,
    ) -> Vec<SearchResult> {
        let search_options = options.search_options();
        let mut seen = HashSet::new();
        let mut evidence = vec![];

        for query in
            build_research_queries(member, company_name, options.max_search_queries_per_member)
        {
            let response = self.search.search_detailed(&query, &search_options).await;
            if response.degraded {
                log::warn!("Skipping research query without live results: {}", query);
                continue;
            }
            evidence.extend(
                response
                    .results
                    .into_iter()
                    .filter(|result| seen.insert(result.url.clone())),
            );
        }

        evidence
    }
}
