//! Job persistence on top of a [`DocumentBackend`].

use std::sync::Arc;

use crate::queue::job::{Job, JobStatus};
use crate::storage::{read_document, write_document, DocumentBackend};

pub const JOBS_KEY: &str = "callscore.jobs";

/// Reads and writes the whole job list as one document.
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn DocumentBackend>,
}

impl JobStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Loads persisted jobs, oldest first.
    ///
    /// Jobs saved mid-upload are put back in the queue: their upload timers
    /// did not survive the restart.
    pub fn load(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = read_document(self.backend.as_ref(), JOBS_KEY);

        for job in jobs.iter_mut() {
            if job.status == JobStatus::Uploading {
                log::info!("Requeueing interrupted upload {} ({})", job.id, job.file_name);
                job.status = JobStatus::Queued;
                job.progress = 0;
                job.uploaded_at = None;
            }
        }

        jobs.sort_by_key(|job| job.created_at);
        log::debug!("Loaded {} jobs", jobs.len());
        jobs
    }

    /// Replaces the stored job list. Failures are logged and swallowed so the
    /// pipeline keeps running on its in-memory state.
    pub fn persist<'a, I>(&self, jobs: I)
    where
        I: IntoIterator<Item = &'a Job>,
    {
        let jobs: Vec<&Job> = jobs.into_iter().collect();
        if let Err(e) = write_document(self.backend.as_ref(), JOBS_KEY, &jobs) {
            log::error!("Failed to persist {} jobs: {}", jobs.len(), e);
        }
    }
}
