use clap::{Args, ValueEnum};
use console::style;

use callscore::{EngineSelection, Locale, Orchestrator, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    Heuristic,
    Delegated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LocaleArg {
    Zh,
    En,
}

/// Fields to change; anything left out keeps its current value.
#[derive(Debug, Default, Args)]
pub struct SettingsUpdate {
    /// Allowed extensions, comma separated (e.g. ".mp3,.txt")
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Maximum file size in MB
    #[arg(long)]
    pub max_file_mb: Option<u64>,

    /// Minimum score for high intention
    #[arg(long)]
    pub high: Option<u8>,

    /// Minimum score for medium intention
    #[arg(long)]
    pub medium: Option<u8>,

    /// Analysis engine
    #[arg(long, value_enum)]
    pub engine: Option<EngineArg>,

    /// Delegated analysis endpoint (empty string clears it)
    #[arg(long)]
    pub gateway_url: Option<String>,

    /// Value sent as the Authorization header (empty string clears it)
    #[arg(long)]
    pub auth_header: Option<String>,

    /// Gateway request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Language of job messages and reports
    #[arg(long, value_enum)]
    pub locale: Option<LocaleArg>,
}

impl SettingsUpdate {
    /// Applies the given fields to `settings`, rejecting inconsistent
    /// thresholds.
    pub fn apply(self, mut settings: Settings) -> anyhow::Result<Settings> {
        if let Some(extensions) = self.extensions {
            settings.allowed_extensions = extensions;
        }
        if let Some(mb) = self.max_file_mb {
            if mb == 0 {
                anyhow::bail!("--max-file-mb must be at least 1");
            }
            settings.max_file_mb = mb;
        }
        if let Some(high) = self.high {
            settings.thresholds.high = high.min(100);
        }
        if let Some(medium) = self.medium {
            settings.thresholds.medium = medium.min(100);
        }
        if settings.thresholds.high <= settings.thresholds.medium {
            anyhow::bail!(
                "high threshold ({}) must be above medium ({})",
                settings.thresholds.high,
                settings.thresholds.medium
            );
        }
        if let Some(engine) = self.engine {
            settings.analysis_engine = match engine {
                EngineArg::Heuristic => EngineSelection::Heuristic,
                EngineArg::Delegated => EngineSelection::Delegated,
            };
        }
        if let Some(url) = self.gateway_url {
            settings.gateway.url = url.trim().to_string();
        }
        if let Some(auth) = self.auth_header {
            settings.gateway.auth_header = auth;
        }
        if let Some(timeout) = self.timeout {
            settings.gateway.timeout_secs = timeout.max(1);
        }
        if let Some(locale) = self.locale {
            settings.locale = match locale {
                LocaleArg::Zh => Locale::Zh,
                LocaleArg::En => Locale::En,
            };
        }
        Ok(settings.normalize())
    }
}

pub fn cmd_show(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let settings = orchestrator.settings().get();
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

pub fn cmd_set(orchestrator: &Orchestrator, update: SettingsUpdate) -> anyhow::Result<()> {
    let store = orchestrator.settings();
    let settings = update.apply(store.get())?;
    store.save(&settings)?;

    println!("{} Settings saved", style("✓").green());
    if settings.analysis_engine == EngineSelection::Delegated && !settings.gateway.is_configured()
    {
        println!(
            "{} Delegated engine selected without a gateway URL; the heuristic engine will be used",
            style("!").yellow()
        );
    }
    Ok(())
}

pub fn cmd_reset(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    orchestrator.settings().save(&Settings::default())?;
    println!("{} Settings reset to defaults", style("✓").green());
    Ok(())
}
