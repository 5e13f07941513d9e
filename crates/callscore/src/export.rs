//! Export of analysed jobs: CSV, JSON, Markdown reports and a ZIP bundle.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{Seek, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::error::ExportError;
use crate::messages::Locale;
use crate::queue::{Job, JobStatus};

/// Name of the summary table inside a ZIP bundle.
pub const PORTFOLIO_FILE: &str = "portfolio.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Zip,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "zip" | "zip-md" => Ok(ExportFormat::Zip),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

/// A row that can be written as CSV.
pub trait CsvRecord {
    fn headers() -> &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One analysed job in a batch export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub id: String,
    pub file_name: String,
    #[serde(rename = "createdAtISO")]
    pub created_at: String,
    #[serde(rename = "finishedAtISO")]
    pub finished_at: String,
    pub score: u8,
    pub intention: String,
    pub sentiment: String,
    pub purchase_signals_count: u32,
    /// Keywords joined by `|`.
    pub keywords_top: String,
    pub engine: String,
}

impl ExportRow {
    fn new(job: &Job, analysis: &AnalysisResult) -> Self {
        Self {
            id: job.id.clone(),
            file_name: job.file_name.clone(),
            created_at: iso(job.created_at),
            finished_at: iso(analysis.finished_at),
            score: analysis.score,
            intention: analysis.intention.to_string(),
            sentiment: analysis.sentiment.label.to_string(),
            purchase_signals_count: analysis.purchase_signals_count,
            keywords_top: analysis.keywords_top.join("|"),
            engine: analysis.engine.to_string(),
        }
    }
}

impl CsvRecord for ExportRow {
    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "fileName",
            "createdAtISO",
            "finishedAtISO",
            "score",
            "intention",
            "sentiment",
            "purchaseSignalsCount",
            "keywordsTop",
            "engine",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.file_name.clone(),
            self.created_at.clone(),
            self.finished_at.clone(),
            self.score.to_string(),
            self.intention.clone(),
            self.sentiment.clone(),
            self.purchase_signals_count.to_string(),
            self.keywords_top.clone(),
            self.engine.clone(),
        ]
    }
}

/// Any job, analysed or not, for a whole-portfolio dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRow {
    pub id: String,
    pub file_name: String,
    #[serde(rename = "createdAtISO")]
    pub created_at: String,
    pub status: JobStatus,
    pub score: Option<u8>,
    pub intention: Option<String>,
    pub sentiment: Option<String>,
    pub purchase_signals_count: Option<u32>,
    pub engine: Option<String>,
}

impl PortfolioRow {
    pub fn from_job(job: &Job) -> Self {
        let analysis = job.analysis.as_ref();
        Self {
            id: job.id.clone(),
            file_name: job.file_name.clone(),
            created_at: iso(job.created_at),
            status: job.status,
            score: analysis.map(|a| a.score),
            intention: analysis.map(|a| a.intention.to_string()),
            sentiment: analysis.map(|a| a.sentiment.label.to_string()),
            purchase_signals_count: analysis.map(|a| a.purchase_signals_count),
            engine: analysis.map(|a| a.engine.to_string()),
        }
    }
}

impl CsvRecord for PortfolioRow {
    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "fileName",
            "createdAtISO",
            "status",
            "score",
            "intention",
            "sentiment",
            "purchaseSignalsCount",
            "engine",
        ]
    }

    fn fields(&self) -> Vec<String> {
        fn opt<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(|v| v.to_string()).unwrap_or_default()
        }

        vec![
            self.id.clone(),
            self.file_name.clone(),
            self.created_at.clone(),
            self.status.to_string(),
            opt(&self.score),
            opt(&self.intention),
            opt(&self.sentiment),
            opt(&self.purchase_signals_count),
            opt(&self.engine),
        ]
    }
}

/// Jobs that can be exported: `success` with a result attached.
pub fn exportable(jobs: &[Job]) -> Vec<(&Job, &AnalysisResult)> {
    jobs.iter()
        .filter(|job| job.status == JobStatus::Success)
        .filter_map(|job| job.analysis.as_ref().map(|analysis| (job, analysis)))
        .collect()
}

/// Batch rows for the exportable subset of `jobs`.
pub fn export_rows(jobs: &[Job]) -> Result<Vec<ExportRow>, ExportError> {
    let rows: Vec<ExportRow> = exportable(jobs)
        .into_iter()
        .map(|(job, analysis)| ExportRow::new(job, analysis))
        .collect();

    if rows.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    Ok(rows)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Header line plus one line per row, joined by `\n`. Empty for no rows.
pub fn to_csv<R: CsvRecord>(rows: &[R]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(R::headers().join(","));
    for row in rows {
        let fields: Vec<String> = row.fields().iter().map(|f| csv_field(f)).collect();
        lines.push(fields.join(","));
    }
    lines.join("\n")
}

pub fn to_json<R: Serialize>(rows: &[R]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Markdown report for one analysed job.
pub fn render_report(job: &Job, analysis: &AnalysisResult, locale: Locale) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# {}\n", job.file_name);
    let _ = writeln!(md, "- Uploaded: {}", iso(job.created_at));
    let _ = writeln!(md, "- Finished: {}", iso(analysis.finished_at));
    let _ = writeln!(md, "- Engine: {}\n", analysis.engine);

    let _ = writeln!(md, "## Intent\n");
    let _ = writeln!(md, "- Score: {}", analysis.score);
    let _ = writeln!(md, "- Level: {}", analysis.intention);
    let _ = writeln!(
        md,
        "- Sentiment: {} (confidence {})\n",
        analysis.sentiment.label, analysis.sentiment.confidence
    );

    let _ = writeln!(md, "## Key metrics\n");
    for metric in &analysis.metrics {
        let label = match locale {
            Locale::Zh => &metric.label_zh,
            Locale::En => &metric.label_en,
        };
        let _ = writeln!(md, "- {}: {}", label, metric.value);
    }

    let _ = writeln!(md, "\n## Keywords\n");
    for keyword in &analysis.keywords_top {
        let _ = writeln!(md, "- {}", keyword);
    }

    let _ = writeln!(md, "\n## Suggestions\n");
    let suggestions: Vec<String> = analysis
        .suggestions
        .iter()
        .map(|s| {
            let (title, details) = match locale {
                Locale::Zh => (&s.title_zh, &s.details_zh),
                Locale::En => (&s.title_en, &s.details_en),
            };
            format!(
                "### [{}] {}\n\n{}",
                s.priority.to_string().to_uppercase(),
                title,
                details
            )
        })
        .collect();
    let _ = writeln!(md, "{}", suggestions.join("\n\n"));

    let _ = writeln!(md, "\n## Snippets\n");
    let snippets: Vec<String> = analysis
        .extracted_snippets
        .iter()
        .map(|s| format!("> {}", s.text))
        .collect();
    let _ = writeln!(md, "{}", snippets.join("\n\n"));

    md
}

/// Writes `portfolio.csv` plus one `<fileName>.report.md` per exportable job.
/// Returns the number of reports written.
pub fn write_zip_bundle<W: Write + Seek>(
    writer: W,
    jobs: &[Job],
    locale: Locale,
) -> Result<usize, ExportError> {
    let selected = exportable(jobs);
    if selected.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let rows: Vec<ExportRow> = selected
        .iter()
        .map(|(job, analysis)| ExportRow::new(job, analysis))
        .collect();

    let mut zip = zip::ZipWriter::new(writer);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(PORTFOLIO_FILE, options)?;
    zip.write_all(to_csv(&rows).as_bytes())?;

    let mut used = HashSet::new();
    for (job, analysis) in &selected {
        let name = unique_name(&mut used, &job.file_name);
        zip.start_file(format!("{}.report.md", name), options)?;
        zip.write_all(render_report(job, analysis, locale).as_bytes())?;
    }

    zip.finish()?;
    Ok(selected.len())
}

/// Archive entries must be unique; repeats get a ` (n)` suffix.
fn unique_name(used: &mut HashSet<String>, name: &str) -> String {
    let mut candidate = name.to_string();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{} ({})", name, n);
        n += 1;
    }
    candidate
}

/// Exports the analysed subset of `jobs` to `path`. Returns the number of
/// jobs exported.
pub fn export_to_path(
    jobs: &[Job],
    format: ExportFormat,
    path: &Path,
    locale: Locale,
) -> Result<usize, ExportError> {
    match format {
        ExportFormat::Csv => {
            let rows = export_rows(jobs)?;
            std::fs::write(path, to_csv(&rows))?;
            Ok(rows.len())
        }
        ExportFormat::Json => {
            let rows = export_rows(jobs)?;
            std::fs::write(path, to_json(&rows)?)?;
            Ok(rows.len())
        }
        ExportFormat::Zip => {
            // Validate before creating the file so nothing is left behind.
            if exportable(jobs).is_empty() {
                return Err(ExportError::NothingToExport);
            }
            let file = std::fs::File::create(path)?;
            write_zip_bundle(file, jobs, locale)
        }
    }
}

/// Exports every job, analysed or not, as CSV or JSON.
pub fn export_portfolio(jobs: &[Job], format: ExportFormat, path: &Path) -> Result<usize, ExportError> {
    let rows: Vec<PortfolioRow> = jobs.iter().map(PortfolioRow::from_job).collect();
    if rows.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    match format {
        ExportFormat::Json => std::fs::write(path, to_json(&rows)?)?,
        ExportFormat::Csv | ExportFormat::Zip => std::fs::write(path, to_csv(&rows))?,
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::HeuristicEngine;
    use crate::config::Settings;
    use crate::queue::IncomingFile;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    fn analysed_job(name: &str, text: &str) -> Job {
        let mut job = Job::new(&IncomingFile::new(name, format!("/tmp/{}", name), 100));
        job.status = JobStatus::Success;
        job.transcript_text = Some(text.to_string());
        job.analysis = Some(HeuristicEngine::new().analyze(text, &Settings::default()));
        job
    }

    fn queued_job(name: &str) -> Job {
        Job::new(&IncomingFile::new(name, format!("/tmp/{}", name), 100))
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(csv_field("cr\rhere"), "\"cr\rhere\"");
    }

    #[test]
    fn test_csv_layout() {
        let jobs = vec![analysed_job("a, b.txt", "Please send the contract.")];
        let rows = export_rows(&jobs).unwrap();
        let csv = to_csv(&rows);

        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,fileName,createdAtISO,finishedAtISO,score"));
        assert!(lines[1].contains("\"a, b.txt\""));
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn test_empty_csv() {
        let rows: Vec<ExportRow> = Vec::new();
        assert_eq!(to_csv(&rows), "");
    }

    #[test]
    fn test_only_success_jobs_exported() {
        let mut failed = analysed_job("b.txt", "contract");
        failed.status = JobStatus::Failed;
        let jobs = vec![queued_job("a.txt"), failed, analysed_job("c.txt", "contract")];

        let rows = export_rows(&jobs).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_name, "c.txt");
    }

    #[test]
    fn test_nothing_to_export() {
        let jobs = vec![queued_job("a.txt")];
        assert!(matches!(export_rows(&jobs), Err(ExportError::NothingToExport)));
        assert!(matches!(
            write_zip_bundle(Cursor::new(Vec::new()), &jobs, Locale::En),
            Err(ExportError::NothingToExport)
        ));
    }

    #[test]
    fn test_keywords_joined_with_pipe() {
        let jobs = vec![analysed_job("a.txt", "contract contract invoice invoice delivery")];
        let rows = export_rows(&jobs).unwrap();
        assert!(rows[0].keywords_top.contains('|'));
        assert!(!rows[0].keywords_top.contains(','));
    }

    #[test]
    fn test_json_uses_wire_names() {
        let jobs = vec![analysed_job("a.txt", "contract")];
        let json: serde_json::Value =
            serde_json::from_str(&to_json(&export_rows(&jobs).unwrap()).unwrap()).unwrap();
        assert!(json[0].get("createdAtISO").is_some());
        assert!(json[0].get("finishedAtISO").is_some());
        assert!(json[0].get("purchaseSignalsCount").is_some());
    }

    #[test]
    fn test_report_contents() {
        let job = analysed_job("call.txt", "Please send the contract. The price is fine.");
        let analysis = job.analysis.clone().unwrap();

        let en = render_report(&job, &analysis, Locale::En);
        assert!(en.starts_with("# call.txt\n"));
        assert!(en.contains(&format!("- Score: {}", analysis.score)));
        assert!(en.contains("## Suggestions"));
        assert!(en.contains(&format!(
            "### [{}] {}",
            analysis.intention.to_string().to_uppercase(),
            analysis.suggestions[0].title_en
        )));
        assert!(en.contains("> Please send the contract."));

        let zh = render_report(&job, &analysis, Locale::Zh);
        assert!(zh.contains(&analysis.suggestions[0].title_zh));
    }

    #[test]
    fn test_zip_bundle_entries() {
        let jobs = vec![
            analysed_job("call.txt", "contract"),
            analysed_job("call.txt", "invoice"),
            queued_job("pending.txt"),
        ];

        let mut buffer = Cursor::new(Vec::new());
        let written = write_zip_bundle(&mut buffer, &jobs, Locale::En).unwrap();
        assert_eq!(written, 2);

        let mut archive = zip::ZipArchive::new(Cursor::new(buffer.into_inner())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["call.txt (2).report.md", "call.txt.report.md", "portfolio.csv"]
        );

        let mut csv = String::new();
        archive
            .by_name(PORTFOLIO_FILE)
            .unwrap()
            .read_to_string(&mut csv)
            .unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_export_to_path() {
        let dir = TempDir::new().unwrap();
        let jobs = vec![analysed_job("a.txt", "contract")];

        let csv_path = dir.path().join("out.csv");
        assert_eq!(export_to_path(&jobs, ExportFormat::Csv, &csv_path, Locale::En).unwrap(), 1);
        assert!(std::fs::read_to_string(&csv_path).unwrap().starts_with("id,"));

        let zip_path = dir.path().join("none.zip");
        let empty: Vec<Job> = vec![queued_job("b.txt")];
        assert!(export_to_path(&empty, ExportFormat::Zip, &zip_path, Locale::En).is_err());
        assert!(!zip_path.exists());
    }

    #[test]
    fn test_portfolio_includes_all_jobs() {
        let dir = TempDir::new().unwrap();
        let jobs = vec![queued_job("a.txt"), analysed_job("b.txt", "contract")];
        let path = dir.path().join("portfolio.csv");

        assert_eq!(export_portfolio(&jobs, ExportFormat::Csv, &path).unwrap(), 2);
        let csv = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.split('\n').collect();
        assert!(lines[0].contains("status"));
        assert!(lines[1].contains(",queued,,,,,"));
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("zip-md".parse::<ExportFormat>().unwrap(), ExportFormat::Zip);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
