//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` struct owns a temporary data directory with a file
//! backed document store, a preview provider whose releases can be counted,
//! and an orchestrator wired to them.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use callscore::analysis::AnalysisGateway;
use callscore::config::Settings;
use callscore::queue::{IncomingFile, JobStatus, LocalPreviews, Orchestrator, TickDriver};
use callscore::storage::{DocumentBackend, FileBackend};

pub struct TestHarness {
    temp_dir: TempDir,
    pub backend: Arc<dyn DocumentBackend>,
    pub previews: Arc<LocalPreviews>,
    pub orchestrator: Arc<Orchestrator>,
    gateway: Option<Arc<dyn AnalysisGateway>>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_gateway(gateway: Arc<dyn AnalysisGateway>) -> Self {
        Self::build(Some(gateway))
    }

    fn build(gateway: Option<Arc<dyn AnalysisGateway>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend: Arc<dyn DocumentBackend> =
            Arc::new(FileBackend::new(temp_dir.path().join("data")));
        let previews = Arc::new(LocalPreviews::new());

        let orchestrator = Self::orchestrator_for(&backend, &previews, gateway.clone());

        Self {
            temp_dir,
            backend,
            previews,
            orchestrator,
            gateway,
        }
    }

    fn orchestrator_for(
        backend: &Arc<dyn DocumentBackend>,
        previews: &Arc<LocalPreviews>,
        gateway: Option<Arc<dyn AnalysisGateway>>,
    ) -> Arc<Orchestrator> {
        let mut builder = Orchestrator::builder(Arc::clone(backend)).previews(previews.clone());
        if let Some(gateway) = gateway {
            builder = builder.gateway(gateway);
        }
        builder.build()
    }

    /// A second orchestrator over the same data directory, as after a restart.
    pub fn reopen(&self) -> Arc<Orchestrator> {
        Self::orchestrator_for(&self.backend, &self.previews, self.gateway.clone())
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut Settings)) {
        let mut settings = self.orchestrator.settings().get();
        update(&mut settings);
        self.orchestrator
            .settings()
            .save(&settings)
            .expect("Failed to save settings");
    }

    /// Routes analysis to the gateway at `url`.
    pub fn use_gateway(&self, url: &str) {
        self.update_settings(|s| {
            s.analysis_engine = callscore::EngineSelection::Delegated;
            s.gateway.url = url.to_string();
        });
    }

    /// An audio file that is never read: audio has no text decoder.
    pub fn audio(&self, name: &str, size_bytes: u64) -> IncomingFile {
        IncomingFile::new(name, self.temp_dir.path().join(name), size_bytes)
    }

    pub fn write_file(&self, name: &str, contents: &[u8]) -> IncomingFile {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write input file");
        IncomingFile::from_path(&path).expect("Failed to stat input file")
    }

    /// Adds one audio job carrying `transcript`.
    pub fn add_with_transcript(&self, name: &str, transcript: &str) -> String {
        let id = self
            .orchestrator
            .add_files(vec![self.audio(name, 1000)])
            .remove(0);
        self.orchestrator
            .update_transcript(&id, transcript)
            .expect("job exists");
        id
    }

    pub fn status(&self, id: &str) -> JobStatus {
        self.orchestrator.get(id).expect("job exists").status
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.orchestrator.status_counts()[&status]
    }

    /// Ticks every 250 ms for `total`.
    pub async fn drive_for(&self, total: Duration) {
        let steps = (total.as_millis() / 250).max(1);
        for _ in 0..steps {
            self.orchestrator.tick();
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Runs a tick driver until the queue drains, failing after `limit`.
    pub async fn drain(&self, limit: Duration) {
        let driver = TickDriver::new(Arc::clone(&self.orchestrator));
        let drained = tokio::time::timeout(limit, driver.run_until_idle())
            .await
            .expect("queue did not drain in time");
        assert!(drained);
    }
}

/// Lets spawned tasks observe aborts and run to their next await point.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
}
