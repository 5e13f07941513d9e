use std::path::Path;

use console::style;

use callscore::export::{export_portfolio, export_to_path};
use callscore::{ExportFormat, Job, Orchestrator};

use super::helpers::resolve_id;

/// Export the selected jobs (all by default) to `out`.
pub fn cmd_export(
    orchestrator: &Orchestrator,
    format: ExportFormat,
    out: &Path,
    ids: &[String],
    portfolio: bool,
) -> anyhow::Result<()> {
    let jobs = select_jobs(orchestrator, ids)?;

    let exported = if portfolio {
        if format == ExportFormat::Zip {
            anyhow::bail!("portfolio export supports csv and json only");
        }
        export_portfolio(&jobs, format, out)?
    } else {
        let locale = orchestrator.settings().get().locale;
        export_to_path(&jobs, format, out, locale)?
    };

    println!(
        "{} Exported {} job(s) to {}",
        style("✓").green(),
        exported,
        out.display()
    );
    Ok(())
}

fn select_jobs(orchestrator: &Orchestrator, ids: &[String]) -> anyhow::Result<Vec<Job>> {
    if ids.is_empty() {
        return Ok(orchestrator.list());
    }

    let mut jobs = Vec::with_capacity(ids.len());
    for prefix in ids {
        let id = resolve_id(orchestrator, prefix)?;
        if let Some(job) = orchestrator.get(&id) {
            if !jobs.iter().any(|j: &Job| j.id == job.id) {
                jobs.push(job);
            }
        }
    }
    Ok(jobs)
}
