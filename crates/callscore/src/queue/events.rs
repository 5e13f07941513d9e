//! Job event broadcaster for live status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::queue::job::{Job, JobStatus};

/// What happened to a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Added,
    StatusChanged,
    Progress,
    TranscriptUpdated,
    Deleted,
}

impl std::fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEventKind::Added => write!(f, "Added"),
            JobEventKind::StatusChanged => write!(f, "Status changed"),
            JobEventKind::Progress => write!(f, "Progress"),
            JobEventKind::TranscriptUpdated => write!(f, "Transcript updated"),
            JobEventKind::Deleted => write!(f, "Deleted"),
        }
    }
}

/// Snapshot of a job right after a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub file_name: String,
    pub kind: JobEventKind,
    pub status: JobStatus,
    pub progress: u8,
    /// Failure or cancellation message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Score, once analysed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job: &Job, kind: JobEventKind) -> Self {
        Self {
            job_id: job.id.clone(),
            file_name: job.file_name.clone(),
            kind,
            status: job.status,
            progress: job.progress,
            error: job.error.clone(),
            score: job.analysis.as_ref().map(|a| a.score),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts job events to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
