//! Queue commands: run, list, show, transcript and the per-job actions.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;
use tokio::sync::broadcast::error::RecvError;

use callscore::queue::JobEventKind;
use callscore::{IncomingFile, JobEvent, JobStatus, Locale, Orchestrator, TickDriver};

use super::helpers::{
    format_bytes, job_line, resolve_id, short_id, styled_intention, styled_status, truncate,
};

/// Submit files and drive the queue until every job settles.
pub async fn cmd_run(
    orchestrator: Arc<Orchestrator>,
    files: Vec<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    // Subscribe first so the "added" events are printed too
    let mut events = orchestrator.subscribe();

    let mut incoming = Vec::with_capacity(files.len());
    for path in &files {
        match IncomingFile::from_path(path) {
            Ok(file) => incoming.push(file),
            Err(e) => eprintln!(
                "{} Skipping {}: {}",
                style("!").yellow(),
                path.display(),
                e
            ),
        }
    }
    if !incoming.is_empty() {
        let ids = orchestrator.add_files(incoming);
        tracing::info!(count = ids.len(), "Files submitted");
    }

    if orchestrator.is_idle() {
        drain_events(&mut events, json);
        println!("{} Nothing to process", style("✓").green());
        print_counts(&orchestrator);
        return Ok(());
    }

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event, json),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let driver = Arc::new(TickDriver::new(orchestrator.clone()));
    let stopper = {
        let driver = driver.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{} Interrupted, stopping", style("!").yellow());
                driver.stop();
            }
        })
    };

    let drained = driver.run_until_idle().await;
    stopper.abort();

    // Give the printer a moment to catch up with the final events
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();

    println!();
    if drained {
        println!("{} Queue drained", style("✓").green());
    } else {
        println!(
            "{} Stopped; unfinished jobs resume on the next run",
            style("!").yellow()
        );
    }
    print_counts(&orchestrator);
    Ok(())
}

fn drain_events(events: &mut tokio::sync::broadcast::Receiver<JobEvent>, json: bool) {
    while let Ok(event) = events.try_recv() {
        print_event(&event, json);
    }
}

fn print_event(event: &JobEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
        return;
    }

    // Progress ticks are too chatty for text output
    if event.kind == JobEventKind::Progress {
        return;
    }

    let mut line = format!(
        "{} {:<18} {} {}",
        style(short_id(&event.job_id)).dim(),
        event.kind.to_string(),
        styled_status(event.status),
        event.file_name
    );
    if let Some(score) = event.score {
        line.push_str(&format!("  score {}", score));
    }
    if let Some(error) = &event.error {
        line.push_str(&format!("  {}", style(error).red()));
    }
    println!("{}", line);
}

fn print_counts(orchestrator: &Orchestrator) {
    let counts = orchestrator.status_counts();
    let summary: Vec<String> = JobStatus::ALL
        .iter()
        .filter_map(|status| {
            let n = counts.get(status).copied().unwrap_or(0);
            (n > 0).then(|| format!("{} {}", n, status))
        })
        .collect();

    if summary.is_empty() {
        println!("  no jobs");
    } else {
        println!("  {}", summary.join(", "));
    }
}

pub fn cmd_list(
    orchestrator: &Orchestrator,
    status: Option<JobStatus>,
    json: bool,
) -> anyhow::Result<()> {
    let jobs: Vec<_> = orchestrator
        .list()
        .into_iter()
        .filter(|job| status.map_or(true, |s| job.status == s))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("{} No jobs", style("!").yellow());
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "{:<8}  {:<10} {:>4}  {:<32}  {:>9}  {}",
            "ID", "STATUS", "", "FILE", "SIZE", "SCORE"
        ))
        .bold()
    );
    for job in &jobs {
        println!("{}", job_line(job));
    }
    Ok(())
}

pub fn cmd_show(orchestrator: &Orchestrator, id: &str, json: bool) -> anyhow::Result<()> {
    let id = resolve_id(orchestrator, id)?;
    let job = orchestrator
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("job {} disappeared", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    let locale = orchestrator.settings().get().locale;

    println!("\n{}", style(&job.file_name).bold());
    println!("{}", "-".repeat(40));
    println!("ID:        {}", job.id);
    println!("Status:    {}", styled_status(job.status));
    if job.status.is_active() {
        println!("Progress:  {}%", job.progress);
    }
    println!(
        "Type:      {}{}",
        job.file_type,
        job.mime_type
            .as_deref()
            .map(|m| format!(" ({})", m))
            .unwrap_or_default()
    );
    println!("Size:      {}", format_bytes(job.size_bytes));
    println!("Created:   {}", job.created_at.to_rfc3339());
    if let Some(uploaded) = job.uploaded_at {
        println!("Uploaded:  {}", uploaded.to_rfc3339());
    }
    if let Some(error) = &job.error {
        println!("Error:     {}", style(error).red());
    }
    match job.transcript() {
        Some(text) => println!("Transcript: {}", truncate(text.trim(), 300)),
        None => println!("Transcript: {}", style("(none)").dim()),
    }

    let Some(analysis) = &job.analysis else {
        return Ok(());
    };

    println!("\n{}", style("Analysis").bold());
    println!(
        "Score:     {} ({})",
        analysis.score,
        styled_intention(analysis.intention)
    );
    println!(
        "Sentiment: {} ({:.2})",
        analysis.sentiment.label, analysis.sentiment.confidence
    );
    println!("Signals:   {}", analysis.purchase_signals_count);
    if !analysis.keywords_top.is_empty() {
        println!("Keywords:  {}", analysis.keywords_top.join(", "));
    }
    println!(
        "Engine:    {} at {}",
        analysis.engine,
        analysis.finished_at.to_rfc3339()
    );

    if !analysis.metrics.is_empty() {
        println!("\n{}", style("Metrics").bold());
        for metric in &analysis.metrics {
            let label = match locale {
                Locale::Zh => &metric.label_zh,
                Locale::En => &metric.label_en,
            };
            println!("  {:<28} {}", label, metric.value);
        }
    }

    if !analysis.suggestions.is_empty() {
        println!("\n{}", style("Suggestions").bold());
        for suggestion in &analysis.suggestions {
            let (title, details) = match locale {
                Locale::Zh => (&suggestion.title_zh, &suggestion.details_zh),
                Locale::En => (&suggestion.title_en, &suggestion.details_en),
            };
            println!("  [{}] {}", styled_intention(suggestion.priority), title);
            println!("      {}", style(details).dim());
        }
    }

    if !analysis.extracted_snippets.is_empty() {
        println!("\n{}", style("Snippets").bold());
        for snippet in &analysis.extracted_snippets {
            println!("  \"{}\"", snippet.text);
        }
    }

    Ok(())
}

/// Replace a job's transcript. `source` is a file path or "-" for stdin.
pub fn cmd_transcript(orchestrator: &Orchestrator, id: &str, source: &str) -> anyhow::Result<()> {
    let id = resolve_id(orchestrator, id)?;

    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read transcript from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read transcript from {}", source))?
    };

    orchestrator.update_transcript(&id, text)?;
    println!("{} Transcript updated for {}", style("✓").green(), short_id(&id));

    if let Some(job) = orchestrator.get(&id) {
        if job.status == JobStatus::Failed {
            println!(
                "  Run {} to analyse it again",
                style(format!("callscore retry {}", short_id(&id))).cyan()
            );
        }
    }
    Ok(())
}

pub fn cmd_cancel(orchestrator: &Orchestrator, id: &str) -> anyhow::Result<()> {
    let id = resolve_id(orchestrator, id)?;
    orchestrator.cancel(&id)?;
    println!("{} Canceled {}", style("✓").green(), short_id(&id));
    Ok(())
}

pub fn cmd_retry(orchestrator: &Orchestrator, id: &str) -> anyhow::Result<()> {
    let id = resolve_id(orchestrator, id)?;
    orchestrator.retry(&id)?;
    println!(
        "{} Requeued {}; process it with {}",
        style("✓").green(),
        short_id(&id),
        style("callscore run").cyan()
    );
    Ok(())
}

pub fn cmd_delete(orchestrator: &Orchestrator, id: &str) -> anyhow::Result<()> {
    let id = resolve_id(orchestrator, id)?;
    orchestrator.delete(&id)?;
    println!("{} Deleted {}", style("✓").green(), short_id(&id));
    Ok(())
}

pub fn cmd_clear(orchestrator: &Orchestrator, yes: bool) -> anyhow::Result<()> {
    if !yes {
        let total = orchestrator.list().len();
        if total == 0 {
            println!("{} No jobs", style("!").yellow());
            return Ok(());
        }
        eprint!("Remove all {} jobs? [y/N] ", total);
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    let removed = orchestrator.clear_all();
    println!("{} Removed {} job(s)", style("✓").green(), removed);
    Ok(())
}
