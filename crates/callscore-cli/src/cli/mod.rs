//! CLI parser and command dispatch.

mod export;
mod helpers;
mod queue;
mod settings;
mod stats;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use callscore::{DocumentBackend, FileBackend, Orchestrator};

#[derive(Parser)]
#[command(name = "callscore")]
#[command(about = "Score sales-call transcripts for purchase intent")]
#[command(version)]
pub struct Cli {
    /// Directory holding the persisted settings and job table
    #[arg(long, global = true, env = "CALLSCORE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Check if JSON logs were requested (for early logging setup).
pub fn wants_json_logs() -> bool {
    std::env::args().any(|arg| arg == "--log-json")
}

#[derive(Subcommand)]
enum Commands {
    /// Submit files (optional) and process the queue until it drains
    Run {
        /// Audio or document files to add to the queue
        files: Vec<PathBuf>,
        /// Print events as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },

    /// List jobs, newest first
    List {
        /// Only show jobs in this status
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one job with its analysis
    Show {
        /// Job ID (a unique prefix is enough)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a job's transcript from a file, or from stdin with "-"
    Transcript {
        /// Job ID (a unique prefix is enough)
        id: String,
        /// Text file to read, or "-" for stdin
        source: String,
    },

    /// Cancel a queued, uploading or processing job
    Cancel {
        /// Job ID (a unique prefix is enough)
        id: String,
    },

    /// Put a failed job back in the queue
    Retry {
        /// Job ID (a unique prefix is enough)
        id: String,
    },

    /// Remove a job
    Delete {
        /// Job ID (a unique prefix is enough)
        id: String,
    },

    /// Remove every job
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export analysed jobs
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: FormatArg,
        /// Destination file
        #[arg(short, long)]
        out: PathBuf,
        /// Only export these jobs (default: every analysed job)
        ids: Vec<String>,
        /// Export every job with its status, analysed or not (csv or json)
        #[arg(long)]
        portfolio: bool,
    },

    /// Show overview, intention distribution and the daily trend
    Stats {
        /// Number of days in the trend
        #[arg(long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or change the persisted settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the current settings as JSON
    Show,

    /// Change one or more settings
    Set(settings::SettingsUpdate),

    /// Restore the defaults
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
    /// CSV summary plus one Markdown report per job, zipped
    #[value(alias = "zip-md")]
    Zip,
}

impl From<FormatArg> for callscore::ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => callscore::ExportFormat::Csv,
            FormatArg::Json => callscore::ExportFormat::Json,
            FormatArg::Zip => callscore::ExportFormat::Zip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Queued,
    Uploading,
    Processing,
    Success,
    Failed,
    Canceled,
}

impl From<StatusFilter> for callscore::JobStatus {
    fn from(filter: StatusFilter) -> Self {
        use callscore::JobStatus;
        match filter {
            StatusFilter::Queued => JobStatus::Queued,
            StatusFilter::Uploading => JobStatus::Uploading,
            StatusFilter::Processing => JobStatus::Processing,
            StatusFilter::Success => JobStatus::Success,
            StatusFilter::Failed => JobStatus::Failed,
            StatusFilter::Canceled => JobStatus::Canceled,
        }
    }
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("callscore"))
        .ok_or_else(|| anyhow::anyhow!("no data directory on this platform; pass --data-dir"))
}

/// Opens the job queue stored in `data_dir`.
pub fn open(data_dir: &std::path::Path) -> Arc<Orchestrator> {
    let backend: Arc<dyn DocumentBackend> = Arc::new(FileBackend::new(data_dir));
    Orchestrator::new(backend)
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    tracing::debug!(data_dir = %data_dir.display(), "Opening job queue");
    let orchestrator = open(&data_dir);

    match cli.command {
        Commands::Run { files, json } => queue::cmd_run(orchestrator, files, json).await,
        Commands::List { status, json } => {
            queue::cmd_list(&orchestrator, status.map(Into::into), json)
        }
        Commands::Show { id, json } => queue::cmd_show(&orchestrator, &id, json),
        Commands::Transcript { id, source } => {
            queue::cmd_transcript(&orchestrator, &id, &source)
        }
        Commands::Cancel { id } => queue::cmd_cancel(&orchestrator, &id),
        Commands::Retry { id } => queue::cmd_retry(&orchestrator, &id),
        Commands::Delete { id } => queue::cmd_delete(&orchestrator, &id),
        Commands::Clear { yes } => queue::cmd_clear(&orchestrator, yes),
        Commands::Export {
            format,
            out,
            ids,
            portfolio,
        } => export::cmd_export(&orchestrator, format.into(), &out, &ids, portfolio),
        Commands::Stats { days, json } => stats::cmd_stats(&orchestrator, days, json),
        Commands::Settings { command } => match command {
            SettingsCommands::Show => settings::cmd_show(&orchestrator),
            SettingsCommands::Set(update) => settings::cmd_set(&orchestrator, update),
            SettingsCommands::Reset => settings::cmd_reset(&orchestrator),
        },
    }
}
