pub mod analysis;
pub mod analytics;
pub mod config;
pub mod error;
pub mod export;
pub mod messages;
pub mod processor;
pub mod queue;
pub mod storage;

pub use analysis::{AnalysisGateway, AnalysisResult, HeuristicEngine, HttpGateway, Intention};
pub use analytics::{daily_trend, IntentionDistribution, Overview};
pub use config::{EngineSelection, Settings, SettingsStore};
pub use error::{
    CallscoreError, ExportError, GatewayError, ProcessError, QueueError, Result, StorageError,
};
pub use export::ExportFormat;
pub use messages::{FailureKind, Locale};
pub use processor::{DocumentFormat, ProcessorRegistry};
pub use queue::{IncomingFile, Job, JobEvent, JobStatus, Orchestrator, TickDriver};
pub use storage::{DocumentBackend, FileBackend, MemoryBackend};
