//! Shared formatting and lookup helpers for CLI commands.

use console::style;

use callscore::{Intention, Job, JobStatus, Orchestrator};

/// Resolve a full job ID from a unique prefix.
pub fn resolve_id(orchestrator: &Orchestrator, prefix: &str) -> anyhow::Result<String> {
    let matches: Vec<String> = orchestrator
        .list()
        .into_iter()
        .map(|job| job.id)
        .filter(|id| id.starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [id] => Ok(id.clone()),
        [] => anyhow::bail!("no job matches '{}'", prefix),
        _ => anyhow::bail!("'{}' matches {} jobs; use a longer prefix", prefix, matches.len()),
    }
}

/// First eight characters of a job ID.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Format bytes as human-readable size.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Truncate a string to `max` characters, adding "..." when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

pub fn styled_status(status: JobStatus) -> String {
    let label = format!("{:<10}", status.to_string());
    match status {
        JobStatus::Success => style(label).green().to_string(),
        JobStatus::Failed => style(label).red().to_string(),
        JobStatus::Canceled => style(label).dim().to_string(),
        JobStatus::Uploading | JobStatus::Processing => style(label).cyan().to_string(),
        JobStatus::Queued => style(label).yellow().to_string(),
    }
}

pub fn styled_intention(intention: Intention) -> String {
    match intention {
        Intention::High => style(intention).green().bold().to_string(),
        Intention::Medium => style(intention).yellow().to_string(),
        Intention::Low => style(intention).dim().to_string(),
    }
}

/// One table row for `list`.
pub fn job_line(job: &Job) -> String {
    let score = job
        .analysis
        .as_ref()
        .map(|a| format!("{:>3} {}", a.score, styled_intention(a.intention)))
        .unwrap_or_else(|| format!("{:>3}", "-"));

    let progress = if job.status.is_active() {
        format!("{:>3}%", job.progress)
    } else {
        "    ".to_string()
    };

    format!(
        "{}  {} {}  {:<32}  {:>9}  {}",
        short_id(&job.id),
        styled_status(job.status),
        progress,
        truncate(&job.file_name, 32),
        format_bytes(job.size_bytes),
        score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short.txt", 32), "short.txt");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
        assert_eq!(truncate("通话记录录音文件", 5), "通话...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
