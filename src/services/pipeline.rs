use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::{stream, FutureExt, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    contact_researcher::{ContactResearcher, ResearchOptions},
    email_generator::EmailContentGenerator,
    openai_client::{parse_lines, CompletionModel, Prompt},
    progress_tracker::{ProgressCallback, ProgressTracker},
    search_client::{SearchClient, SearchOptions},
    website_scraper::{ScrapeOptions, WebsiteScraper},
};
use crate::{
    configuration::{PipelineSettings, WebdriverSettings},
    dal::Storage,
    domain::{
        business::BusinessProfile,
        contact::EnrichedTeamMember,
        criteria::SearchCriteria,
        email::GeneratedEmail,
        lead::Lead,
        progress::{PipelinePhase, ScrapeProcessProgress},
        web_url::dedupe_results,
    },
    error::PipelineError,
};

const MAX_GENERATED_QUERIES: usize = 5;

const QUERY_SYSTEM_PROMPT: &str = "You generate web search queries that find the websites of \
    small and medium businesses. Reply with one query per line and nothing else.";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub default_max_results: usize,
    pub search: SearchOptions,
    pub scrape: ScrapeOptions,
    pub research: ResearchOptions,
    pub scrape_concurrency: usize,
}

impl PipelineOptions {
    pub fn from_settings(pipeline: &PipelineSettings, webdriver: &WebdriverSettings) -> Self {
        let search = SearchOptions {
            results_per_query: pipeline.results_per_query,
            retry_attempts: pipeline.retry_attempts,
            rate_limit_delay: pipeline.rate_limit_delay(),
            attempt_timeout: pipeline.http_timeout(),
        };

        PipelineOptions {
            default_max_results: pipeline.default_max_results,
            scrape: ScrapeOptions {
                use_firecrawl: true,
                use_browser: true,
                max_pages: pipeline.max_pages,
                navigation_timeout: webdriver.navigation_timeout(),
            },
            research: ResearchOptions {
                max_search_queries_per_member: pipeline.max_search_queries_per_member,
                skip_retries: pipeline.skip_research_retries,
                search: search.clone(),
                concurrency: pipeline.research_concurrency,
            },
            search,
            scrape_concurrency: pipeline.scrape_concurrency,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            default_max_results: 10,
            search: SearchOptions::default(),
            scrape: ScrapeOptions::default(),
            research: ResearchOptions::default(),
            scrape_concurrency: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub businesses: Vec<BusinessProfile>,
    pub team_members: Vec<EnrichedTeamMember>,
    pub emails: Vec<GeneratedEmail>,
    pub progress: ScrapeProcessProgress,
}

/// Whatever a run has produced so far. Survives a panicking stage.
#[derive(Default)]
struct Findings {
    businesses: Vec<BusinessProfile>,
    /// Each member with the index of the business it was found on.
    team_members: Vec<(usize, EnrichedTeamMember)>,
    emails: Vec<GeneratedEmail>,
}

/// Per-run context handed to every stage.
struct Run<'a> {
    user_id: &'a str,
    criteria: &'a SearchCriteria,
    tracker: &'a ProgressTracker,
    cancel: &'a CancellationToken,
}

impl Run<'_> {
    fn check_cancelled(&self) -> Result<(), PipelineError> {
        match self.cancel.is_cancelled() {
            true => Err(PipelineError::Cancelled),
            false => Ok(()),
        }
    }
}

pub struct Pipeline {
    search: Arc<SearchClient>,
    scraper: Arc<WebsiteScraper>,
    researcher: Arc<ContactResearcher>,
    generator: Arc<EmailContentGenerator>,
    model: Arc<dyn CompletionModel>,
    storage: Arc<dyn Storage>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        search: Arc<SearchClient>,
        scraper: Arc<WebsiteScraper>,
        model: Arc<dyn CompletionModel>,
        storage: Arc<dyn Storage>,
        options: PipelineOptions,
    ) -> Self {
        Pipeline {
            researcher: Arc::new(ContactResearcher::new(search.clone(), model.clone())),
            generator: Arc::new(EmailContentGenerator::new(model.clone())),
            search,
            scraper,
            model,
            storage,
            options,
        }
    }

    /// Runs search, scrape, enrichment and drafting for one set of criteria.
    ///
    /// Never fails: an invalid input, a cancellation or a panicking stage leave the run
    /// `failed` with whatever was found before.
    pub async fn run(
        &self,
        run_id: Uuid,
        user_id: &str,
        criteria: &SearchCriteria,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> PipelineOutput {
        let tracker = ProgressTracker::new(run_id, on_progress);
        let mut findings = Findings::default();

        log::info!(
            "Starting run {} for user {}: {:?}",
            run_id,
            user_id,
            criteria
        );

        let run = Run {
            user_id,
            criteria,
            tracker: &tracker,
            cancel: &cancel,
        };

        let outcome = match criteria.validate() {
            Ok(()) => {
                AssertUnwindSafe(self.execute(&run, &mut findings))
                    .catch_unwind()
                    .await
            }
            Err(e) => Ok(Err(e)),
        };

        match outcome {
            Ok(Ok(())) => {
                tracker.advance(PipelinePhase::Completed);
            }
            Ok(Err(e)) => {
                log::warn!("Run {} stopped: {}", run_id, e);
                tracker.fail(&e.to_string());
            }
            Err(panic) => {
                let message = panic_message(panic);
                log::error!("Run {} crashed: {}", run_id, message);
                tracker.fail(&message);
            }
        }

        let progress = tracker.snapshot();
        log::info!(
            "Run {} finished as {}: {} businesses, {} team members, {} emails",
            run_id,
            progress.status.as_str(),
            findings.businesses.len(),
            findings.team_members.len(),
            findings.emails.len()
        );

        PipelineOutput {
            businesses: findings.businesses,
            team_members: findings
                .team_members
                .into_iter()
                .map(|(_, member)| member)
                .collect(),
            emails: findings.emails,
            progress,
        }
    }

    async fn execute(&self, run: &Run<'_>, findings: &mut Findings) -> Result<(), PipelineError> {
        run.check_cancelled()?;
        run.tracker.advance(PipelinePhase::GeneratingQueries);
        let queries = self.generate_queries(run.criteria).await;

        run.check_cancelled()?;
        run.tracker.advance(PipelinePhase::Searching);
        let urls = self.search_websites(run, &queries).await?;
        run.tracker.set_total_sites(urls.len());

        run.check_cancelled()?;
        run.tracker.advance(PipelinePhase::Scraping);
        self.scrape_websites(run, &urls, findings).await?;

        run.check_cancelled()?;
        run.tracker.advance(PipelinePhase::Enriching);
        self.enrich_team_members(run, findings).await?;

        run.check_cancelled()?;
        run.tracker.advance(PipelinePhase::GeneratingEmails);
        self.generate_emails(run, findings).await
    }

    async fn generate_queries(&self, criteria: &SearchCriteria) -> Vec<String> {
        let mut user = format!("Business type: {}\n", criteria.business_type.trim());
        if let Some(location) = &criteria.location {
            user.push_str(&format!("Location: {}\n", location.trim()));
        }
        user.push_str(&format!(
            "Write up to {} different search queries.",
            MAX_GENERATED_QUERIES
        ));

        match self
            .model
            .complete(&Prompt::text(QUERY_SYSTEM_PROMPT, &user))
            .await
        {
            Ok(content) => {
                let queries = parse_lines(&content, MAX_GENERATED_QUERIES);
                if !queries.is_empty() {
                    log::info!("Generated search queries: {:?}", queries);
                    return queries;
                }
                log::warn!("Query generation returned nothing usable");
            }
            Err(e) => log::error!("Query generation failed: {}", e),
        }

        vec![criteria.fallback_query()]
    }

    async fn search_websites(
        &self,
        run: &Run<'_>,
        queries: &[String],
    ) -> Result<Vec<String>, PipelineError> {
        let limit = run.criteria.result_limit(self.options.default_max_results);
        let mut results = vec![];

        for query in queries {
            run.check_cancelled()?;
            results.extend(self.search.search(query, &self.options.search).await);
            results = dedupe_results(results, limit);
            if results.len() >= limit {
                break;
            }
        }

        Ok(results.into_iter().map(|result| result.url).collect())
    }

    async fn scrape_websites(
        &self,
        run: &Run<'_>,
        urls: &[String],
        findings: &mut Findings,
    ) -> Result<(), PipelineError> {
        let mut profiles = stream::iter(urls.to_vec())
            .map(|url| async move { self.scrape_one(run, &url).await })
            .buffered(self.options.scrape_concurrency.max(1));

        // Each profile lands in the findings as soon as it is ready so a later panic keeps it.
        while let Some(profile) = profiles.next().await {
            findings.businesses.extend(profile);
        }

        run.check_cancelled()
    }

    async fn scrape_one(&self, run: &Run<'_>, url: &str) -> Option<BusinessProfile> {
        if run.cancel.is_cancelled() {
            return None;
        }
        run.tracker.begin_site(url);

        let outcome = self.scraper.scrape_website(url, &self.options.scrape).await;
        match (outcome.success, outcome.business_data) {
            (true, Some(profile)) => {
                let stored = self
                    .storage
                    .create_business_profile(run.user_id, &profile)
                    .await;
                if !stored.success {
                    log::error!(
                        "Failed to store business profile {}: {:?}",
                        profile.website_url,
                        stored.error
                    );
                }
                run.tracker.record_scrape(true, profile.team_members.len());
                Some(profile)
            }
            _ => {
                log::warn!("Scrape failed for {}: {:?}", url, outcome.error);
                run.tracker.record_scrape(false, 0);
                None
            }
        }
    }

    async fn enrich_team_members(
        &self,
        run: &Run<'_>,
        findings: &mut Findings,
    ) -> Result<(), PipelineError> {
        for (index, business) in findings.businesses.iter().enumerate() {
            run.check_cancelled()?;
            if business.team_members.is_empty() {
                continue;
            }

            let enriched = self
                .researcher
                .research_team_members(
                    &business.team_members,
                    &business.name,
                    &self.options.research,
                )
                .await;

            run.tracker.add_enriched(
                enriched
                    .iter()
                    .filter(|member| member.usable_email().is_some())
                    .count(),
            );

            for member in enriched {
                let stored = self
                    .storage
                    .create_lead(&Lead::from_member(run.user_id, business, &member))
                    .await;
                if !stored.success {
                    log::error!("Failed to store lead {}: {:?}", member.name, stored.error);
                }
                findings.team_members.push((index, member));
            }
        }

        Ok(())
    }

    async fn generate_emails(
        &self,
        run: &Run<'_>,
        findings: &mut Findings,
    ) -> Result<(), PipelineError> {
        for (index, member) in findings.team_members.iter() {
            if member.usable_email().is_none() {
                continue;
            }
            run.check_cancelled()?;

            let business = &findings.businesses[*index];
            if let Some(email) = self.generator.generate_email_content(member, business).await {
                findings.emails.push(email);
                run.tracker.add_email();
            }
        }

        Ok(())
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "pipeline stage panicked".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use tokio_util::sync::CancellationToken;
    use url::Url;
    use uuid::Uuid;

    use super::{Pipeline, PipelineOptions, PipelineOutput};
    use crate::{
        dal::MemoryStorage,
        domain::{
            business::{BusinessProfile, TeamMember},
            criteria::SearchCriteria,
            progress::{PipelinePhase, ScrapeProcessProgress},
            search_result::SearchResult,
        },
        error::{AiError, ScrapeError},
        services::{
            openai_client::{CompletionModel, Prompt},
            progress_tracker::ProgressCallback,
            search_client::{SearchClient, SearchOptions},
            testing::{ScriptedModel, ScriptedSearch, ScriptedStrategy},
            website_scraper::{ExtractionStrategy, ScrapeOptions, WebsiteScraper},
        },
    };

    fn options() -> PipelineOptions {
        let search = SearchOptions {
            results_per_query: 5,
            retry_attempts: 1,
            rate_limit_delay: Duration::from_millis(1),
            attempt_timeout: Duration::from_millis(200),
        };
        let mut options = PipelineOptions {
            search: search.clone(),
            scrape: ScrapeOptions {
                use_firecrawl: false,
                use_browser: false,
                ..ScrapeOptions::default()
            },
            ..PipelineOptions::default()
        };
        options.research.search = search;
        options
    }

    fn criteria() -> SearchCriteria {
        SearchCriteria::new("marketing agency")
            .with_location("New York")
            .with_max_results(1)
    }

    fn happy_model(prompt: &Prompt) -> Result<String, AiError> {
        if prompt.user.starts_with("Person:") {
            Ok(r#"{"email": "jane@acme.io", "linkedin": null, "sources": ["https://acme.io/team"]}"#
                .to_string())
        } else if prompt.user.contains("first_name:") {
            Ok(r#"{"subject": "Hi from us", "body": "Hello Jane"}"#.to_string())
        } else {
            Ok("marketing agency New York\nNYC marketing firm".to_string())
        }
    }

    fn acme_search() -> Arc<ScriptedSearch> {
        ScriptedSearch::new(|query| {
            Ok(vec![SearchResult::new("https://acme.io/", "Acme", query)])
        })
    }

    fn acme_profile(url: &Url) -> Result<BusinessProfile, ScrapeError> {
        let mut profile = BusinessProfile::new("Acme", url.as_str());
        profile.team_members.push(TeamMember::new("Jane Doe", "CEO"));
        Ok(profile)
    }

    fn pipeline(
        search: Arc<ScriptedSearch>,
        strategy: Arc<dyn ExtractionStrategy>,
        model: Arc<dyn CompletionModel>,
        storage: Arc<MemoryStorage>,
    ) -> Pipeline {
        pipeline_with(search, strategy, model, storage, options())
    }

    fn pipeline_with(
        search: Arc<ScriptedSearch>,
        strategy: Arc<dyn ExtractionStrategy>,
        model: Arc<dyn CompletionModel>,
        storage: Arc<MemoryStorage>,
        options: PipelineOptions,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(SearchClient::new(search)),
            Arc::new(WebsiteScraper::new(vec![strategy])),
            model,
            storage,
            options,
        )
    }

    const SITES: [&str; 4] = [
        "https://a-site.io/",
        "https://b-site.io/",
        "https://c-site.io/",
        "https://d-site.io/",
    ];

    fn many_sites_search() -> Arc<ScriptedSearch> {
        ScriptedSearch::new(|query| {
            Ok(SITES
                .iter()
                .map(|url| SearchResult::new(url, "Site", query))
                .collect())
        })
    }

    fn recording() -> (ProgressCallback, Arc<Mutex<Vec<ScrapeProcessProgress>>>) {
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |progress: &ScrapeProcessProgress| {
            sink.lock().unwrap().push(progress.clone())
        });
        (callback, seen)
    }

    async fn run(pipeline: &Pipeline, callback: Option<ProgressCallback>) -> PipelineOutput {
        pipeline
            .run(
                Uuid::new_v4(),
                "user-1",
                &criteria(),
                callback,
                CancellationToken::new(),
            )
            .await
    }

    #[tokio::test]
    async fn end_to_end_success() {
        let storage = Arc::new(MemoryStorage::new());
        let pipeline = pipeline(
            acme_search(),
            ScriptedStrategy::new(acme_profile),
            ScriptedModel::new(happy_model),
            storage.clone(),
        );
        let (callback, seen) = recording();

        let output = run(&pipeline, Some(callback)).await;

        assert_eq!(output.businesses.len(), 1);
        assert_eq!(output.team_members.len(), 1);
        assert_eq!(output.emails.len(), 1);
        assert_eq!(output.emails[0].recipient_email, "jane@acme.io");
        assert_eq!(output.progress.status, PipelinePhase::Completed);
        assert_eq!(output.progress.enriched_contacts, 1);
        assert_eq!(output.progress.generated_emails, 1);

        assert_eq!(storage.business_profiles("user-1").len(), 1);
        assert_eq!(
            storage.leads("user-1")[0].email.as_deref(),
            Some("jane@acme.io")
        );

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0].status <= w[1].status));
        assert!(seen.iter().all(|p| p.processed_sites <= p.total_sites));
        assert!(seen
            .iter()
            .all(|p| p.successful_scrapes + p.failed_scrapes == p.processed_sites));
    }

    #[tokio::test]
    async fn end_to_end_scrape_failure() {
        let pipeline = pipeline(
            acme_search(),
            ScriptedStrategy::new(|_| Err(ScrapeError::Service("boom".to_string()))),
            ScriptedModel::new(happy_model),
            Arc::new(MemoryStorage::new()),
        );

        let output = run(&pipeline, None).await;

        assert!(output.businesses.is_empty());
        assert!(output.team_members.is_empty());
        assert!(output.emails.is_empty());
        assert_eq!(output.progress.failed_scrapes, 1);
        assert_eq!(output.progress.processed_sites, output.progress.total_sites);
        assert_eq!(output.progress.status, PipelinePhase::Completed);
    }

    #[tokio::test]
    async fn query_generation_failure_uses_criteria() {
        let search = acme_search();
        let pipeline = pipeline(
            search.clone(),
            ScriptedStrategy::new(|_| Err(ScrapeError::NoData("x".to_string()))),
            ScriptedModel::failing(),
            Arc::new(MemoryStorage::new()),
        );

        run(&pipeline, None).await;

        assert_eq!(
            search.queries.lock().unwrap().first().map(String::as_str),
            Some("marketing agency New York")
        );
    }

    #[tokio::test]
    async fn panicking_stage_fails_the_run() {
        let pipeline = pipeline(
            acme_search(),
            ScriptedStrategy::new(|_| panic!("scraper bug")),
            ScriptedModel::new(happy_model),
            Arc::new(MemoryStorage::new()),
        );

        let output = run(&pipeline, None).await;

        assert_eq!(output.progress.status, PipelinePhase::Failed);
        assert_eq!(output.progress.failed_at, Some(PipelinePhase::Scraping));
        assert_eq!(output.progress.error.as_deref(), Some("scraper bug"));
        assert!(output.businesses.is_empty());
    }

    #[tokio::test]
    async fn panic_after_scraped_sites_keeps_them() {
        let storage = Arc::new(MemoryStorage::new());
        let pipeline = pipeline_with(
            many_sites_search(),
            ScriptedStrategy::new(|url| match url.host_str() {
                Some("c-site.io") => panic!("scraper bug"),
                _ => Ok(BusinessProfile::new("Site", url.as_str())),
            }),
            ScriptedModel::new(happy_model),
            storage.clone(),
            PipelineOptions {
                scrape_concurrency: 1,
                ..options()
            },
        );

        let output = pipeline
            .run(
                Uuid::new_v4(),
                "user-1",
                &criteria().with_max_results(4),
                None,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(output.progress.status, PipelinePhase::Failed);
        assert_eq!(output.progress.failed_at, Some(PipelinePhase::Scraping));
        assert_eq!(output.progress.successful_scrapes, 2);
        assert_eq!(output.businesses.len(), output.progress.successful_scrapes);
        assert_eq!(
            output
                .businesses
                .iter()
                .map(|b| b.website_url.as_str())
                .collect::<Vec<_>>(),
            vec![SITES[0], SITES[1]]
        );
        assert_eq!(storage.business_profiles("user-1").len(), 2);
    }

    #[tokio::test]
    async fn parallel_scraping_keeps_counters_consistent() {
        let pipeline = Arc::new(pipeline_with(
            many_sites_search(),
            ScriptedStrategy::new(|url| match url.host_str() {
                Some("a-site.io") | Some("c-site.io") => {
                    Ok(BusinessProfile::new("Site", url.as_str()))
                }
                _ => Err(ScrapeError::NoData(url.to_string())),
            }),
            ScriptedModel::new(happy_model),
            Arc::new(MemoryStorage::new()),
            PipelineOptions {
                scrape_concurrency: 3,
                ..options()
            },
        ));
        let (callback, seen) = recording();

        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move {
                pipeline
                    .run(
                        Uuid::new_v4(),
                        "user-1",
                        &criteria().with_max_results(4),
                        Some(callback),
                        CancellationToken::new(),
                    )
                    .await
            }
        });
        let output = task.await.unwrap();

        let progress = &output.progress;
        assert_eq!(progress.status, PipelinePhase::Completed);
        assert_eq!(progress.total_sites, 4);
        assert_eq!(progress.successful_scrapes, 2);
        assert_eq!(progress.failed_scrapes, 2);
        assert_eq!(
            progress.successful_scrapes + progress.failed_scrapes,
            progress.total_sites
        );
        assert_eq!(output.businesses.len(), 2);

        let seen = seen.lock().unwrap();
        assert!(seen
            .windows(2)
            .all(|w| w[0].processed_sites <= w[1].processed_sites));
        assert!(seen.iter().all(|p| {
            p.successful_scrapes + p.failed_scrapes == p.processed_sites
                && p.processed_sites <= p.total_sites
        }));
    }

    #[tokio::test]
    async fn cancelled_run_fails_without_work() {
        let search = acme_search();
        let model = ScriptedModel::new(happy_model);
        let pipeline = pipeline(
            search.clone(),
            ScriptedStrategy::new(acme_profile),
            model.clone(),
            Arc::new(MemoryStorage::new()),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let output = pipeline
            .run(Uuid::new_v4(), "user-1", &criteria(), None, cancel)
            .await;

        assert_eq!(output.progress.status, PipelinePhase::Failed);
        assert_eq!(output.progress.error.as_deref(), Some("run was cancelled"));
        assert_eq!(model.call_count(), 0);
        assert_eq!(search.query_count(), 0);
    }

    #[tokio::test]
    async fn invalid_criteria_rejected_before_network() {
        let search = acme_search();
        let pipeline = pipeline(
            search.clone(),
            ScriptedStrategy::new(acme_profile),
            ScriptedModel::new(happy_model),
            Arc::new(MemoryStorage::new()),
        );

        let output = pipeline
            .run(
                Uuid::new_v4(),
                "user-1",
                &SearchCriteria::new(" "),
                None,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(output.progress.status, PipelinePhase::Failed);
        assert_eq!(output.progress.failed_at, Some(PipelinePhase::Initializing));
        assert_eq!(search.query_count(), 0);
    }
}
