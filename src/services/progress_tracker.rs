use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::progress::{PipelinePhase, ScrapeProcessProgress};

pub type ProgressCallback = Arc<dyn Fn(&ScrapeProcessProgress) + Send + Sync>;

/// Single writer of one run's progress record.
///
/// The callback runs under the tracker's lock after every change, so observers see changes
/// in the order they happened. It must not call back into the tracker.
pub struct ProgressTracker {
    state: Mutex<ScrapeProcessProgress>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(run_id: Uuid, callback: Option<ProgressCallback>) -> Self {
        ProgressTracker {
            state: Mutex::new(ScrapeProcessProgress::new(run_id)),
            callback,
        }
    }

    pub fn snapshot(&self) -> ScrapeProcessProgress {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut ScrapeProcessProgress) -> bool,
    {
        let mut progress = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !mutate(&mut progress) {
            return false;
        }
        progress.updated_at = Utc::now();

        if let Some(callback) = &self.callback {
            if catch_unwind(AssertUnwindSafe(|| callback(&*progress))).is_err() {
                log::warn!("Progress callback panicked for run {}", progress.run_id);
            }
        }
        true
    }

    /// Counter updates are ignored once the run is terminal.
    fn update_live<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut ScrapeProcessProgress),
    {
        self.update(|progress| match progress.status.is_terminal() {
            true => false,
            false => {
                mutate(progress);
                true
            }
        })
    }

    pub fn advance(&self, phase: PipelinePhase) -> bool {
        let advanced = self.update(|progress| match progress.status.can_advance_to(phase) {
            true => {
                progress.status = phase;
                if phase.is_terminal() {
                    progress.current_site = None;
                }
                true
            }
            false => false,
        });

        if !advanced {
            log::debug!("Ignoring phase change to {}", phase.as_str());
        }
        advanced
    }

    pub fn set_total_sites(&self, total: usize) {
        self.update_live(|progress| progress.total_sites = total);
    }

    pub fn begin_site(&self, url: &str) {
        self.update_live(|progress| progress.current_site = Some(url.to_string()));
    }

    /// Records one finished site. Never counts past `total_sites`.
    pub fn record_scrape(&self, success: bool, team_members: usize) {
        self.update(|progress| {
            if progress.status.is_terminal() || progress.processed_sites >= progress.total_sites {
                return false;
            }
            progress.processed_sites += 1;
            match success {
                true => {
                    progress.successful_scrapes += 1;
                    progress.found_business_profiles += 1;
                    progress.found_team_members += team_members;
                }
                false => progress.failed_scrapes += 1,
            }
            true
        });
    }

    pub fn add_enriched(&self, contacts: usize) {
        if contacts > 0 {
            self.update_live(|progress| progress.enriched_contacts += contacts);
        }
    }

    pub fn add_email(&self) {
        self.update_live(|progress| progress.generated_emails += 1);
    }

    /// Moves to `Failed`, remembering the phase the run was in.
    pub fn fail(&self, error: &str) {
        self.update(|progress| {
            if progress.status.is_terminal() {
                return false;
            }
            progress.failed_at = Some(progress.status);
            progress.status = PipelinePhase::Failed;
            progress.error = Some(error.to_string());
            progress.current_site = None;
            true
        });
    }
}
