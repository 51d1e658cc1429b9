//! Registry of in-flight summary generation jobs.

use dashmap::DashMap;
use std::sync::Arc;
use summary_flow::{Result as FlowResult, TaskHandle};
use uuid::Uuid;

/// A background summary generation in flight, together with the request
/// that started it (needed to build the session once the outcome arrives).
pub struct SummaryJob {
    pub text: String,
    pub image_path: Option<String>,
    pub handle: TaskHandle<FlowResult<String>>,
}

/// In-memory registry of running jobs, keyed by job id. A job is removed
/// the moment its outcome is consumed, so the outcome is delivered exactly
/// once; polls after that see an unknown id.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<DashMap<String, SummaryJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(
        &self,
        text: String,
        image_path: Option<String>,
        handle: TaskHandle<FlowResult<String>>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.jobs.insert(
            id.clone(),
            SummaryJob {
                text,
                image_path,
                handle,
            },
        );
        id
    }

    /// `None` for an unknown id, otherwise whether the task still runs.
    pub fn is_running(&self, id: &str) -> Option<bool> {
        self.jobs.get(id).map(|job| job.handle.is_running())
    }

    /// Remove a job so its outcome can be consumed.
    pub fn take(&self, id: &str) -> Option<SummaryJob> {
        self.jobs.remove(id).map(|(_, job)| job)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
