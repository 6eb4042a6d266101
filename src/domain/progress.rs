use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stages of a pipeline run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Initializing,
    GeneratingQueries,
    Searching,
    Scraping,
    Enriching,
    GeneratingEmails,
    Completed,
    Failed,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Completed | PipelinePhase::Failed)
    }

    /// `Failed` is reachable from any live phase, everything else only moves forward.
    pub fn can_advance_to(&self, next: PipelinePhase) -> bool {
        match (self, next) {
            (current, _) if current.is_terminal() => false,
            (_, PipelinePhase::Failed) => true,
            (current, next) => next > *current,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Initializing => "initializing",
            PipelinePhase::GeneratingQueries => "generating_queries",
            PipelinePhase::Searching => "searching",
            PipelinePhase::Scraping => "scraping",
            PipelinePhase::Enriching => "enriching",
            PipelinePhase::GeneratingEmails => "generating_emails",
            PipelinePhase::Completed => "completed",
            PipelinePhase::Failed => "failed",
        }
    }

    pub fn processing_step(&self) -> &'static str {
        match self {
            PipelinePhase::Initializing => "Initializing search process",
            PipelinePhase::GeneratingQueries => "Generating search queries",
            PipelinePhase::Searching => "Searching for businesses",
            PipelinePhase::Scraping => "Scraping business websites",
            PipelinePhase::Enriching => "Researching team members",
            PipelinePhase::GeneratingEmails => "Generating personalized emails",
            PipelinePhase::Completed => "Process completed",
            PipelinePhase::Failed => "Process failed",
        }
    }
}

/// Live, run-scoped state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeProcessProgress {
    pub run_id: Uuid,
    pub status: PipelinePhase,
    pub total_sites: usize,
    pub processed_sites: usize,
    pub successful_scrapes: usize,
    pub failed_scrapes: usize,
    pub found_business_profiles: usize,
    pub found_team_members: usize,
    pub enriched_contacts: usize,
    pub generated_emails: usize,
    pub current_site: Option<String>,
    pub error: Option<String>,
    /// Phase the run was in when it failed.
    pub failed_at: Option<PipelinePhase>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeProcessProgress {
    pub fn new(run_id: Uuid) -> Self {
        let now = Utc::now();
        ScrapeProcessProgress {
            run_id,
            status: PipelinePhase::Initializing,
            total_sites: 0,
            processed_sites: 0,
            successful_scrapes: 0,
            failed_scrapes: 0,
            found_business_profiles: 0,
            found_team_members: 0,
            enriched_contacts: 0,
            generated_emails: 0,
            current_site: None,
            error: None,
            failed_at: None,
            started_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedProgress {
    pub status: PipelinePhase,
    pub processing_step: String,
    pub completion: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ratio(done: usize, total: usize) -> f64 {
    (done as f64 / total.max(1) as f64).clamp(0.0, 1.0)
}

fn span(start: f64, end: f64, fraction: f64) -> f64 {
    start + (end - start) * fraction
}

fn completion_for(phase: PipelinePhase, progress: &ScrapeProcessProgress) -> f64 {
    match phase {
        PipelinePhase::Initializing => 0.0,
        PipelinePhase::GeneratingQueries => 5.0,
        PipelinePhase::Searching => match progress.total_sites {
            0 => 10.0,
            _ => 20.0,
        },
        PipelinePhase::Scraping => span(
            20.0,
            50.0,
            ratio(progress.processed_sites, progress.total_sites),
        ),
        PipelinePhase::Enriching => span(
            50.0,
            80.0,
            ratio(progress.enriched_contacts, progress.found_team_members),
        ),
        PipelinePhase::GeneratingEmails => span(
            80.0,
            99.0,
            ratio(progress.generated_emails, progress.enriched_contacts),
        ),
        PipelinePhase::Completed => 100.0,
        PipelinePhase::Failed => progress
            .failed_at
            .filter(|phase| *phase != PipelinePhase::Failed)
            .map(|phase| completion_for(phase, progress))
            .unwrap_or(0.0),
    }
}

fn detail_for(progress: &ScrapeProcessProgress) -> Option<String> {
    match progress.status {
        PipelinePhase::Searching if progress.total_sites > 0 => {
            Some(format!("Found {} websites to scrape", progress.total_sites))
        }
        PipelinePhase::Scraping => {
            let mut detail = format!(
                "Processed {} of {} sites ({} successful, {} failed)",
                progress.processed_sites,
                progress.total_sites,
                progress.successful_scrapes,
                progress.failed_scrapes
            );
            if let Some(site) = &progress.current_site {
                detail.push_str(&format!(", currently scraping {}", site));
            }
            Some(detail)
        }
        PipelinePhase::Enriching => Some(format!(
            "Enriched {} of {} team members",
            progress.enriched_contacts, progress.found_team_members
        )),
        PipelinePhase::GeneratingEmails => Some(format!(
            "Generated {} of {} emails",
            progress.generated_emails, progress.enriched_contacts
        )),
        PipelinePhase::Completed => Some(format!(
            "Found {} businesses, {} team members, generated {} emails",
            progress.found_business_profiles, progress.found_team_members, progress.generated_emails
        )),
        _ => None,
    }
}

/// User-facing view of a run's progress with a 0-100 completion estimate.
pub fn format_progress(progress: &ScrapeProcessProgress) -> FormattedProgress {
    let completion = completion_for(progress.status, progress).round().clamp(0.0, 100.0) as u8;

    FormattedProgress {
        status: progress.status,
        processing_step: progress.status.processing_step().to_string(),
        completion,
        detail: detail_for(progress),
        error: progress.error.clone(),
    }
}
