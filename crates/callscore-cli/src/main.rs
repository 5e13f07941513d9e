//! callscore - score sales-call transcripts for purchase intent.
//!
//! Submits recordings and transcripts to the local job queue, drives the
//! queue until it drains, and exports the results.

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(cli::is_verbose(), cli::wants_json_logs())?;

    cli::run().await
}
