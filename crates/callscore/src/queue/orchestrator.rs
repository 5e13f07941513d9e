//! The job pipeline: ingestion, simulated upload and analysis.
//!
//! All job state lives in one [`JobTable`] behind a mutex that is never held
//! across an `.await`. Background work (extraction, upload timers, analysis
//! attempts) runs in spawned tasks that write back through guarded updates:
//! a write only lands if the job still exists and is still in the state the
//! task was started for.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::analysis::{AnalysisGateway, AnalysisResult, GatewayRequest, HeuristicEngine, HttpGateway};
use crate::config::{Settings, SettingsStore};
use crate::error::QueueError;
use crate::messages::FailureKind;
use crate::processor::{DocumentFormat, ProcessorRegistry};
use crate::queue::events::{JobEvent, JobEventBroadcaster, JobEventKind};
use crate::queue::job::{IncomingFile, Job, JobStatus};
use crate::queue::preview::{LocalPreviews, PreviewProvider};
use crate::queue::store::JobStore;
use crate::storage::DocumentBackend;

/// Simultaneous simulated uploads.
pub const UPLOAD_CONCURRENCY: usize = 3;

/// Simultaneous analysis attempts. Keep at or below 10.
pub const ANALYSIS_CONCURRENCY: usize = 5;

/// How often an upload in flight reports progress.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(120);

const MIN_UPLOAD_MS: u64 = 700;
const MAX_UPLOAD_MS: u64 = 4500;
const UPLOAD_BYTES_PER_MS: u64 = 40_000;

/// Simulated upload time for a file of `size_bytes`.
pub fn upload_duration(size_bytes: u64) -> Duration {
    Duration::from_millis((size_bytes / UPLOAD_BYTES_PER_MS).clamp(MIN_UPLOAD_MS, MAX_UPLOAD_MS))
}

/// Upload progress after `elapsed`, capped at 99 until the upload completes.
pub fn upload_percent(elapsed: Duration, total: Duration) -> u8 {
    if total.is_zero() {
        return 99;
    }
    let ratio = elapsed.as_secs_f64() / total.as_secs_f64();
    (ratio * 100.0).round().clamp(0.0, 99.0) as u8
}

/// One unit of a stage's concurrency cap. Released on drop, so an aborted
/// or panicking task gives its slot back too.
#[derive(Debug)]
pub struct SlotGuard {
    counter: Arc<AtomicUsize>,
}

impl SlotGuard {
    /// Takes a slot if fewer than `cap` are held.
    pub fn try_acquire(counter: &Arc<AtomicUsize>, cap: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                (held < cap).then_some(held + 1)
            })
            .ok()
            .map(|_| Self {
                counter: Arc::clone(counter),
            })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Marks a job as having an analysis attempt in flight.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl InFlightGuard {
    fn claim(in_flight: &Arc<Mutex<HashSet<String>>>, id: &str) -> Option<Self> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());

        inserted.then(|| Self {
            in_flight: Arc::clone(in_flight),
            id: id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[derive(Default)]
struct JobTable {
    /// Oldest first.
    jobs: Vec<Job>,
    tasks: HashMap<String, AbortHandle>,
}

fn find_mut<'a>(jobs: &'a mut [Job], id: &str) -> Option<&'a mut Job> {
    jobs.iter_mut().find(|job| job.id == id)
}

enum AnalysisOutcome {
    Completed(AnalysisResult),
    Failed(FailureKind),
}

pub struct OrchestratorBuilder {
    backend: Arc<dyn DocumentBackend>,
    gateway: Option<Arc<dyn AnalysisGateway>>,
    previews: Option<Arc<dyn PreviewProvider>>,
    processors: Option<Arc<ProcessorRegistry>>,
    events: Option<JobEventBroadcaster>,
}

impl OrchestratorBuilder {
    pub fn gateway(mut self, gateway: Arc<dyn AnalysisGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn previews(mut self, previews: Arc<dyn PreviewProvider>) -> Self {
        self.previews = Some(previews);
        self
    }

    pub fn processors(mut self, processors: Arc<ProcessorRegistry>) -> Self {
        self.processors = Some(processors);
        self
    }

    pub fn events(mut self, events: JobEventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the orchestrator and loads persisted jobs.
    pub fn build(self) -> Arc<Orchestrator> {
        let store = JobStore::new(Arc::clone(&self.backend));
        let jobs = store.load();

        Arc::new(Orchestrator {
            table: Mutex::new(JobTable {
                jobs,
                tasks: HashMap::new(),
            }),
            store,
            settings: SettingsStore::new(self.backend),
            processors: self
                .processors
                .unwrap_or_else(|| Arc::new(ProcessorRegistry::new())),
            heuristic: HeuristicEngine::new(),
            gateway: self
                .gateway
                .unwrap_or_else(|| Arc::new(HttpGateway::new())),
            previews: self
                .previews
                .unwrap_or_else(|| Arc::new(LocalPreviews::new())),
            events: self.events.unwrap_or_default(),
            active_uploads: Arc::new(AtomicUsize::new(0)),
            active_analyses: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }
}

pub struct Orchestrator {
    table: Mutex<JobTable>,
    store: JobStore,
    settings: SettingsStore,
    processors: Arc<ProcessorRegistry>,
    heuristic: HeuristicEngine,
    gateway: Arc<dyn AnalysisGateway>,
    previews: Arc<dyn PreviewProvider>,
    events: JobEventBroadcaster,
    active_uploads: Arc<AtomicUsize>,
    active_analyses: Arc<AtomicUsize>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Orchestrator {
    pub fn builder(backend: Arc<dyn DocumentBackend>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            backend,
            gateway: None,
            previews: None,
            processors: None,
            events: None,
        }
    }

    pub fn new(backend: Arc<dyn DocumentBackend>) -> Arc<Self> {
        Self::builder(backend).build()
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn active_uploads(&self) -> usize {
        self.active_uploads.load(Ordering::Acquire)
    }

    pub fn active_analyses(&self) -> usize {
        self.active_analyses.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the whole table synchronously while the caller holds the lock,
    /// so documents land in mutation order. The table is the only writer.
    fn persist(&self, table: &JobTable) {
        self.store.persist(table.jobs.iter());
    }

    fn emit(&self, job: &Job, kind: JobEventKind) {
        self.events.send(JobEvent::new(job, kind));
    }

    // ─── Ingestion ──────────────────────────────────────────────────────────

    /// Creates one job per file and returns their ids in input order.
    ///
    /// Files failing the allowlist or the size cap are recorded as `failed`
    /// right away. Accepted files start `queued`; text extraction for them
    /// runs in the background and never delays this call.
    pub fn add_files(self: &Arc<Self>, files: Vec<IncomingFile>) -> Vec<String> {
        let settings = self.settings.get();
        let mut created = Vec::with_capacity(files.len());
        let mut extractions = Vec::new();

        for file in files {
            let mut job = Job::new(&file);

            if !settings.allows_extension(&job.file_type) {
                log::info!("Rejecting {}: unsupported type {}", job.file_name, job.file_type);
                fail_validation(&mut job, FailureKind::UnsupportedFormat, &settings);
            } else if settings.exceeds_size_cap(job.size_bytes) {
                log::info!(
                    "Rejecting {}: {} bytes exceeds {}MB",
                    job.file_name,
                    job.size_bytes,
                    settings.max_file_mb
                );
                fail_validation(&mut job, FailureKind::FileTooLarge, &settings);
            } else {
                let format = DocumentFormat::from_extension(&job.file_type);
                if format.is_some_and(|f| f.is_audio()) {
                    job.preview = self.previews.create(&file.path);
                }
                if let Some(format) = format.filter(|f| self.processors.has_decoder(*f)) {
                    extractions.push((job.id.clone(), file.path.clone(), format));
                }
                log::info!("Queued {} as job {}", job.file_name, job.id);
            }

            created.push(job);
        }

        let ids: Vec<String> = created.iter().map(|job| job.id.clone()).collect();
        {
            let mut table = self.lock();
            for job in created {
                self.emit(&job, JobEventKind::Added);
                table.jobs.push(job);
            }
            self.persist(&table);
        }

        // Dispatch on the declared name; the file on disk may be a staged
        // copy without an extension.
        for (id, path, format) in extractions {
            let orchestrator = Arc::clone(self);
            tokio::task::spawn_blocking(move || {
                let text = orchestrator.processors.extract_as(&path, format);
                if let Some(text) = text {
                    orchestrator.attach_extracted_text(&id, text);
                }
            });
        }

        ids
    }

    /// Stores extracted text unless the job is gone or already has a
    /// transcript from the user. Status is left alone.
    fn attach_extracted_text(&self, id: &str, text: String) {
        let mut table = self.lock();
        let Some(job) = find_mut(&mut table.jobs, id) else {
            log::debug!("Dropping extracted text for deleted job {}", id);
            return;
        };
        if job.transcript().is_some() {
            log::debug!("Job {} already has a transcript, keeping it", id);
            return;
        }

        log::debug!("Attached {} characters of text to job {}", text.chars().count(), id);
        job.transcript_text = Some(text);
        self.emit(job, JobEventKind::TranscriptUpdated);
        self.persist(&table);
    }

    // ─── Tick ───────────────────────────────────────────────────────────────

    /// One scheduling pass: starts uploads for queued jobs, then analysis
    /// attempts for processing jobs, each up to its free slots.
    pub fn tick(self: &Arc<Self>) {
        let mut table = self.lock();
        let mut changed = false;

        let queued: Vec<(String, u64)> = table
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Queued)
            .map(|job| (job.id.clone(), job.size_bytes))
            .collect();

        for (id, size_bytes) in queued {
            let Some(slot) = SlotGuard::try_acquire(&self.active_uploads, UPLOAD_CONCURRENCY) else {
                break;
            };
            let Some(job) = find_mut(&mut table.jobs, &id) else {
                continue;
            };

            job.status = JobStatus::Uploading;
            job.progress = 1;
            job.uploaded_at = Some(Utc::now());
            job.clear_error();
            self.emit(job, JobEventKind::StatusChanged);
            log::debug!("Uploading job {}", id);

            let task = tokio::spawn(Arc::clone(self).run_upload(id.clone(), size_bytes, slot));
            table.tasks.insert(id, task.abort_handle());
            changed = true;
        }

        let processing: Vec<String> = table
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Processing)
            .map(|job| job.id.clone())
            .collect();

        for id in processing {
            let Some(claim) = InFlightGuard::claim(&self.in_flight, &id) else {
                continue;
            };
            let Some(slot) = SlotGuard::try_acquire(&self.active_analyses, ANALYSIS_CONCURRENCY)
            else {
                break;
            };

            let span = tracing::info_span!("analysis.attempt", job_id = %id);
            let task = tokio::spawn(
                Arc::clone(self)
                    .run_analysis(id.clone(), slot, claim)
                    .instrument(span),
            );
            table.tasks.insert(id, task.abort_handle());
        }

        if changed {
            self.persist(&table);
        }
    }

    // ─── Upload stage ───────────────────────────────────────────────────────

    async fn run_upload(self: Arc<Self>, id: String, size_bytes: u64, _slot: SlotGuard) {
        let total = upload_duration(size_bytes);
        let started = Instant::now();

        loop {
            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }
            tokio::time::sleep(PROGRESS_INTERVAL.min(total - elapsed)).await;

            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }
            if !self.set_upload_progress(&id, upload_percent(elapsed, total)) {
                return;
            }
        }

        self.complete_upload(&id);
    }

    /// Raises the progress of an uploading job. False once the job is gone
    /// or no longer uploading.
    fn set_upload_progress(&self, id: &str, percent: u8) -> bool {
        let mut table = self.lock();
        let Some(job) = find_mut(&mut table.jobs, id) else {
            log::debug!("Upload for deleted job {} stopped", id);
            return false;
        };
        if job.status != JobStatus::Uploading {
            log::debug!("Upload for job {} stopped: job is {}", id, job.status);
            return false;
        }

        if percent > job.progress {
            job.progress = percent;
            self.emit(job, JobEventKind::Progress);
            self.persist(&table);
        }
        true
    }

    fn complete_upload(&self, id: &str) {
        let mut table = self.lock();
        let Some(job) = find_mut(&mut table.jobs, id) else {
            return;
        };
        if job.status != JobStatus::Uploading {
            log::debug!("Ignoring finished upload for job {} in state {}", id, job.status);
            return;
        }

        job.status = JobStatus::Processing;
        job.progress = 100;
        self.emit(job, JobEventKind::StatusChanged);
        log::info!("Upload finished for job {}", id);

        table.tasks.remove(id);
        self.persist(&table);
    }

    // ─── Analysis stage ─────────────────────────────────────────────────────

    async fn run_analysis(self: Arc<Self>, id: String, _slot: SlotGuard, _claim: InFlightGuard) {
        let snapshot = {
            let table = self.lock();
            table
                .jobs
                .iter()
                .find(|job| job.id == id && job.status == JobStatus::Processing)
                .map(|job| {
                    (
                        job.transcript().map(str::to_string),
                        job.file_name.clone(),
                        job.created_at,
                    )
                })
        };
        let Some((transcript, file_name, created_at)) = snapshot else {
            return;
        };

        let settings = self.settings.get();

        let outcome = match transcript {
            None => {
                log::info!("Job {} has no transcript to analyse", id);
                AnalysisOutcome::Failed(FailureKind::MissingTranscript)
            }
            Some(text) if settings.uses_gateway() => {
                let request = GatewayRequest {
                    transcript_text: text,
                    file_name,
                    created_at,
                };
                match self
                    .gateway
                    .analyze(&request, &settings.gateway, &settings.thresholds)
                    .await
                {
                    Ok(result) => AnalysisOutcome::Completed(result),
                    Err(e) => {
                        log::warn!("Gateway analysis failed for job {}: {}", id, e);
                        AnalysisOutcome::Failed(FailureKind::AnalysisFailed)
                    }
                }
            }
            Some(text) => AnalysisOutcome::Completed(self.heuristic.analyze(&text, &settings)),
        };

        self.finish_analysis(&id, outcome, &settings);
    }

    fn finish_analysis(&self, id: &str, outcome: AnalysisOutcome, settings: &Settings) {
        let mut table = self.lock();
        let Some(job) = find_mut(&mut table.jobs, id) else {
            log::debug!("Discarding analysis for deleted job {}", id);
            return;
        };
        if job.status != JobStatus::Processing {
            log::debug!("Discarding analysis for job {} in state {}", id, job.status);
            return;
        }

        match outcome {
            AnalysisOutcome::Completed(result) => {
                log::info!(
                    "Job {} scored {} ({}) via {}",
                    id,
                    result.score,
                    result.intention,
                    result.engine
                );
                job.status = JobStatus::Success;
                job.analysis = Some(result);
                job.clear_error();
            }
            AnalysisOutcome::Failed(kind) => {
                job.set_failure(
                    JobStatus::Failed,
                    kind,
                    kind.message(settings.locale, settings.max_file_mb),
                );
            }
        }
        self.emit(job, JobEventKind::StatusChanged);

        table.tasks.remove(id);
        self.persist(&table);
    }

    // ─── User actions ───────────────────────────────────────────────────────

    /// Cancels a queued, uploading or processing job and stops its task.
    pub fn cancel(&self, id: &str) -> Result<(), QueueError> {
        let settings = self.settings.get();
        let mut table = self.lock();

        let job = find_mut(&mut table.jobs, id)
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        if !job.status.is_active() {
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: job.status,
                action: "cancel",
            });
        }

        job.set_failure(
            JobStatus::Canceled,
            FailureKind::Canceled,
            FailureKind::Canceled.message(settings.locale, settings.max_file_mb),
        );
        self.emit(job, JobEventKind::StatusChanged);
        log::info!("Canceled job {}", id);

        if let Some(task) = table.tasks.remove(id) {
            task.abort();
        }
        self.persist(&table);
        Ok(())
    }

    /// Puts a failed job back in the queue.
    pub fn retry(&self, id: &str) -> Result<(), QueueError> {
        let mut table = self.lock();

        let job = find_mut(&mut table.jobs, id)
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        if job.status != JobStatus::Failed {
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: job.status,
                action: "retry",
            });
        }

        job.status = JobStatus::Queued;
        job.progress = 0;
        job.uploaded_at = None;
        job.analysis = None;
        job.clear_error();
        self.emit(job, JobEventKind::StatusChanged);
        log::info!("Requeued job {}", id);

        self.persist(&table);
        Ok(())
    }

    /// Removes a job, stopping its task and releasing its preview.
    pub fn delete(&self, id: &str) -> Result<(), QueueError> {
        let mut table = self.lock();

        let index = table
            .jobs
            .iter()
            .position(|job| job.id == id)
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        let mut job = table.jobs.remove(index);

        if let Some(task) = table.tasks.remove(id) {
            task.abort();
        }
        self.release(&mut job);
        self.emit(&job, JobEventKind::Deleted);
        log::info!("Deleted job {} ({})", id, job.file_name);

        self.persist(&table);
        Ok(())
    }

    /// Removes every job. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut table = self.lock();

        for (_, task) in table.tasks.drain() {
            task.abort();
        }
        let mut jobs = std::mem::take(&mut table.jobs);
        for job in jobs.iter_mut() {
            self.release(job);
            self.emit(job, JobEventKind::Deleted);
        }
        log::info!("Cleared {} jobs", jobs.len());

        self.persist(&table);
        jobs.len()
    }

    fn release(&self, job: &mut Job) {
        if let Some(handle) = job.preview.take() {
            self.previews.release(&handle);
        }
    }

    /// Replaces the transcript of a job in any state.
    pub fn update_transcript(&self, id: &str, text: impl Into<String>) -> Result<(), QueueError> {
        let mut table = self.lock();

        let job = find_mut(&mut table.jobs, id)
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        job.transcript_text = Some(text.into());
        self.emit(job, JobEventKind::TranscriptUpdated);

        self.persist(&table);
        Ok(())
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().jobs.iter().find(|job| job.id == id).cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.lock().jobs.iter().rev().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Number of jobs per status; every status is present.
    pub fn status_counts(&self) -> HashMap<JobStatus, usize> {
        let mut counts: HashMap<JobStatus, usize> =
            JobStatus::ALL.iter().map(|status| (*status, 0)).collect();
        for job in self.lock().jobs.iter() {
            *counts.entry(job.status).or_default() += 1;
        }
        counts
    }

    /// True when no job is queued, uploading or processing.
    pub fn is_idle(&self) -> bool {
        !self.lock().jobs.iter().any(|job| job.status.is_active())
    }
}

fn fail_validation(job: &mut Job, kind: FailureKind, settings: &Settings) {
    job.set_failure(
        JobStatus::Failed,
        kind,
        kind.message(settings.locale, settings.max_file_mb),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn orchestrator() -> Arc<Orchestrator> {
        Orchestrator::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_upload_duration_bounds() {
        assert_eq!(upload_duration(0), Duration::from_millis(700));
        assert_eq!(upload_duration(40_000 * 1000), Duration::from_millis(1000));
        assert_eq!(upload_duration(u64::MAX), Duration::from_millis(4500));
    }

    #[test]
    fn test_upload_percent_capped() {
        let total = Duration::from_millis(1000);
        assert_eq!(upload_percent(Duration::from_millis(0), total), 0);
        assert_eq!(upload_percent(Duration::from_millis(120), total), 12);
        assert_eq!(upload_percent(Duration::from_millis(996), total), 99);
        assert_eq!(upload_percent(Duration::from_millis(2000), total), 99);
    }

    #[test]
    fn test_slot_guard_caps_and_releases() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = SlotGuard::try_acquire(&counter, 2).unwrap();
        let _b = SlotGuard::try_acquire(&counter, 2).unwrap();
        assert!(SlotGuard::try_acquire(&counter, 2).is_none());

        drop(a);
        assert_eq!(counter.load(Ordering::Acquire), 1);
        assert!(SlotGuard::try_acquire(&counter, 2).is_some());
    }

    #[test]
    fn test_in_flight_claim_is_exclusive() {
        let set = Arc::new(Mutex::new(HashSet::new()));
        let claim = InFlightGuard::claim(&set, "job-1").unwrap();
        assert!(InFlightGuard::claim(&set, "job-1").is_none());
        drop(claim);
        assert!(InFlightGuard::claim(&set, "job-1").is_some());
    }

    /// Adds one audio job and forces it into `status` without running a task.
    fn job_in(orch: &Arc<Orchestrator>, status: JobStatus) -> String {
        let id = orch
            .add_files(vec![IncomingFile::new("call.mp3", "/tmp/call.mp3", 1000)])
            .remove(0);
        let mut table = orch.lock();
        let job = find_mut(&mut table.jobs, &id).unwrap();
        job.status = status;
        if status == JobStatus::Uploading {
            job.progress = 40;
        }
        id
    }

    #[tokio::test]
    async fn test_late_analysis_result_ignored_after_cancel() {
        let orch = orchestrator();
        let id = job_in(&orch, JobStatus::Processing);
        orch.cancel(&id).unwrap();

        let settings = orch.settings().get();
        let result = HeuristicEngine::new().analyze("please send the contract", &settings);
        orch.finish_analysis(&id, AnalysisOutcome::Completed(result), &settings);

        let job = orch.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(job.error_kind, Some(FailureKind::Canceled));
        assert!(job.analysis.is_none());
    }

    #[tokio::test]
    async fn test_late_analysis_failure_ignored_after_cancel() {
        let orch = orchestrator();
        let id = job_in(&orch, JobStatus::Processing);
        orch.cancel(&id).unwrap();

        let settings = orch.settings().get();
        orch.finish_analysis(&id, AnalysisOutcome::Failed(FailureKind::AnalysisFailed), &settings);

        let job = orch.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(job.error_kind, Some(FailureKind::Canceled));
    }

    #[tokio::test]
    async fn test_late_upload_writes_ignored_after_cancel() {
        let orch = orchestrator();
        let id = job_in(&orch, JobStatus::Uploading);
        orch.cancel(&id).unwrap();

        assert!(!orch.set_upload_progress(&id, 80));
        orch.complete_upload(&id);

        let job = orch.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(job.progress, 40);
    }

    #[tokio::test]
    async fn test_late_writes_for_deleted_job_are_dropped() {
        let orch = orchestrator();
        let id = job_in(&orch, JobStatus::Processing);
        orch.delete(&id).unwrap();

        let settings = orch.settings().get();
        let result = HeuristicEngine::new().analyze("please send the contract", &settings);
        orch.finish_analysis(&id, AnalysisOutcome::Completed(result), &settings);
        orch.complete_upload(&id);

        assert!(orch.get(&id).is_none());
        assert!(orch.list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_files_fail_immediately() {
        let orch = orchestrator();
        let mut settings = orch.settings().get();
        settings.max_file_mb = 1;
        settings.locale = crate::messages::Locale::En;
        orch.settings().save(&settings).unwrap();

        let ids = orch.add_files(vec![
            IncomingFile::new("notes.exe", "/tmp/notes.exe", 10),
            IncomingFile::new("huge.mp3", "/tmp/huge.mp3", 2 * 1024 * 1024),
        ]);

        let exe = orch.get(&ids[0]).unwrap();
        assert_eq!(exe.status, JobStatus::Failed);
        assert_eq!(exe.error_kind, Some(FailureKind::UnsupportedFormat));

        let huge = orch.get(&ids[1]).unwrap();
        assert_eq!(huge.status, JobStatus::Failed);
        assert_eq!(huge.error_kind, Some(FailureKind::FileTooLarge));
        assert!(huge.error.unwrap().contains("1MB"));
        assert!(huge.preview.is_none());
        assert!(orch.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_transitions() {
        let orch = orchestrator();
        let ids = orch.add_files(vec![IncomingFile::new("a.mp3", "/tmp/a.mp3", 10)]);

        assert!(matches!(
            orch.retry(&ids[0]),
            Err(QueueError::InvalidTransition { from: JobStatus::Queued, .. })
        ));
        orch.cancel(&ids[0]).unwrap();
        assert!(matches!(
            orch.cancel(&ids[0]),
            Err(QueueError::InvalidTransition { from: JobStatus::Canceled, .. })
        ));
        assert!(matches!(orch.cancel("nope"), Err(QueueError::JobNotFound(_))));
        assert!(matches!(orch.delete("nope"), Err(QueueError::JobNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_newest_first_and_counts() {
        let orch = orchestrator();
        let first = orch.add_files(vec![IncomingFile::new("a.mp3", "/tmp/a.mp3", 10)]);
        std::thread::sleep(Duration::from_millis(2));
        let second = orch.add_files(vec![IncomingFile::new("b.exe", "/tmp/b.exe", 10)]);

        let listed: Vec<String> = orch.list().into_iter().map(|job| job.id).collect();
        assert_eq!(listed, vec![second[0].clone(), first[0].clone()]);

        let counts = orch.status_counts();
        assert_eq!(counts[&JobStatus::Queued], 1);
        assert_eq!(counts[&JobStatus::Failed], 1);
        assert_eq!(counts[&JobStatus::Success], 0);
        assert!(!orch.is_idle());
    }
}
