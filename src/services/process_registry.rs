use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    pipeline::{Pipeline, PipelineOutput},
    progress_tracker::ProgressCallback,
};
use crate::{
    domain::{
        criteria::SearchCriteria,
        progress::{PipelinePhase, ScrapeProcessProgress},
    },
    error::PipelineError,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub user_id: String,
}

struct RunSlot {
    run_id: Uuid,
    progress: ScrapeProcessProgress,
    output: Option<PipelineOutput>,
    cancel: CancellationToken,
}

type Slots = Arc<RwLock<HashMap<String, RunSlot>>>;

/// Background pipeline runs, one slot per user.
///
/// A slot is created when a run starts and kept after it ends so its progress and
/// result can still be read. The next `start` for that user replaces it.
#[derive(Clone)]
pub struct ProcessRegistry {
    pipeline: Arc<Pipeline>,
    slots: Slots,
}

impl ProcessRegistry {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        ProcessRegistry {
            pipeline,
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawns a run and returns without waiting for it.
    pub fn start(
        &self,
        user_id: &str,
        criteria: SearchCriteria,
    ) -> Result<RunHandle, PipelineError> {
        criteria.validate()?;

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get(user_id) {
                if !slot.progress.status.is_terminal() {
                    return Err(PipelineError::AlreadyRunning(user_id.to_string()));
                }
            }
            slots.insert(
                user_id.to_string(),
                RunSlot {
                    run_id,
                    progress: ScrapeProcessProgress::new(run_id),
                    output: None,
                    cancel: cancel.clone(),
                },
            );
        }

        let callback: ProgressCallback = {
            let slots = self.slots.clone();
            let user_id = user_id.to_string();
            Arc::new(move |progress: &ScrapeProcessProgress| {
                let mut slots = slots.write().unwrap_or_else(PoisonError::into_inner);
                if let Some(slot) = slots.get_mut(&user_id) {
                    if slot.run_id == progress.run_id {
                        slot.progress = progress.clone();
                    }
                }
            })
        };

        let pipeline = self.pipeline.clone();
        let owner = user_id.to_string();
        let task = tokio::spawn(async move {
            pipeline
                .run(run_id, &owner, &criteria, Some(callback), cancel)
                .await
        });

        let slots = self.slots.clone();
        let owner = user_id.to_string();
        tokio::spawn(async move {
            let outcome = task.await.map_err(|e| match e.is_cancelled() {
                true => "run task was aborted".to_string(),
                false => "run task panicked".to_string(),
            });
            settle(&slots, &owner, run_id, outcome);
        });

        log::info!("Started run {} for user {}", run_id, user_id);
        Ok(RunHandle {
            run_id,
            user_id: user_id.to_string(),
        })
    }

    pub fn progress(&self, user_id: &str) -> Option<ScrapeProcessProgress> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .map(|slot| slot.progress.clone())
    }

    /// Output of the user's last finished run.
    pub fn result(&self, user_id: &str) -> Option<PipelineOutput> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .and_then(|slot| slot.output.clone())
    }

    /// Asks the user's live run to stop at its next checkpoint.
    pub fn cancel(&self, user_id: &str) -> bool {
        match self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
        {
            Some(slot) if !slot.progress.status.is_terminal() => {
                slot.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drops a finished slot. Live runs are left alone.
    pub fn clear(&self, user_id: &str) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match slots.get(user_id) {
            Some(slot) if slot.progress.status.is_terminal() => {
                slots.remove(user_id);
                true
            }
            _ => false,
        }
    }
}

/// Records how a run task ended. A task that died leaves the slot `failed`.
fn settle(slots: &Slots, user_id: &str, run_id: Uuid, outcome: Result<PipelineOutput, String>) {
    let mut slots = slots.write().unwrap_or_else(PoisonError::into_inner);
    let Some(slot) = slots.get_mut(user_id).filter(|slot| slot.run_id == run_id) else {
        return;
    };

    match outcome {
        Ok(output) => {
            slot.progress = output.progress.clone();
            slot.output = Some(output);
        }
        Err(error) => {
            log::error!("Run {} for user {} died: {}", run_id, user_id, error);
            if !slot.progress.status.is_terminal() {
                slot.progress.failed_at = Some(slot.progress.status);
                slot.progress.status = PipelinePhase::Failed;
                slot.progress.error = Some(error);
            }
        }
    }
}
