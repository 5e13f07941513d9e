use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Routes `log` records from the library into tracing and installs the
/// global subscriber. `RUST_LOG` overrides the default filter.
pub fn init(verbose: bool, json: bool) -> anyhow::Result<()> {
    tracing_log::LogTracer::init()?;

    let default_filter = if verbose {
        "callscore=info"
    } else {
        "callscore=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)));

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
