//! Job model, persistence and the processing pipeline.

pub mod driver;
pub mod events;
pub mod job;
pub mod orchestrator;
pub mod preview;
pub mod store;

pub use driver::{TickDriver, TICK_INTERVAL};
pub use events::{JobEvent, JobEventBroadcaster, JobEventKind};
pub use job::{file_type_of, IncomingFile, Job, JobStatus};
pub use orchestrator::{
    upload_duration, Orchestrator, OrchestratorBuilder, SlotGuard, ANALYSIS_CONCURRENCY,
    PROGRESS_INTERVAL, UPLOAD_CONCURRENCY,
};
pub use preview::{LocalPreviews, PreviewHandle, PreviewProvider};
pub use store::{JobStore, JOBS_KEY};
