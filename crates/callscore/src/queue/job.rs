use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::messages::FailureKind;
use crate::queue::preview::PreviewHandle;

/// Pipeline state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Uploading,
    Processing,
    Success,
    Failed,
    Canceled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Queued,
        JobStatus::Uploading,
        JobStatus::Processing,
        JobStatus::Success,
        JobStatus::Failed,
        JobStatus::Canceled,
    ];

    /// Still moving through the pipeline; the only states that can be canceled.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Uploading | JobStatus::Processing
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Uploading => write!(f, "uploading"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// One submitted transcript file and everything the pipeline learned about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub file_name: String,
    /// Lower-cased extension including the dot, or `unknown`.
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    #[serde(rename = "createdAtISO")]
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(
        rename = "uploadedAtISO",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_text: Option<String>,
    /// In-memory only; gone after a reload.
    #[serde(skip)]
    pub preview: Option<PreviewHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
}

impl Job {
    /// A fresh `queued` job for `file`.
    pub fn new(file: &IncomingFile) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file.name.clone(),
            file_type: file_type_of(&file.name),
            mime_type: mime_guess::from_path(&file.name)
                .first()
                .map(|m| m.essence_str().to_string()),
            size_bytes: file.size_bytes,
            created_at: Utc::now(),
            status: JobStatus::Queued,
            progress: 0,
            error: None,
            error_kind: None,
            uploaded_at: None,
            transcript_text: None,
            preview: None,
            analysis: None,
        }
    }

    /// Marks the job `failed` (or `canceled`) with a rendered message.
    pub fn set_failure(&mut self, status: JobStatus, kind: FailureKind, message: String) {
        self.status = status;
        self.error = Some(message);
        self.error_kind = Some(kind);
        self.analysis = None;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
        self.error_kind = None;
    }

    /// Trimmed transcript text, if any non-whitespace text is attached.
    pub fn transcript(&self) -> Option<&str> {
        self.transcript_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Lower-cased extension with its dot, `unknown` when the name has none.
pub fn file_type_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// A file handed to ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size_bytes,
        }
    }

    /// Describes a file on disk, taking its name and size from the filesystem.
    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, path, metadata.len()))
    }
}
