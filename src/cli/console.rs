//! Plain-text rendering for the command-line driver.

use std::io::Write;

use chrono::{DateTime, Local};

use crate::api::{JobSummary, StatusReport};
use crate::core::{JobStatus, LogEntry, LogLevel, PresentationSink, ProgressSnapshot};

/// Sink that prints every update to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    fn emit(&self, line: String) {
        // Broken pipes are not the monitor's problem
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}

impl PresentationSink for ConsoleSink {
    fn render_status(&self, status: JobStatus, job_id: Option<&str>) {
        self.emit(format!(
            "Status: {}  Job: {}",
            capitalize(status.as_str()),
            job_id.unwrap_or("-")
        ));
    }

    fn render_progress(&self, snapshot: &ProgressSnapshot, at: DateTime<Local>) {
        self.emit(format!("[{}] {snapshot}", at.format("%H:%M:%S")));
    }

    fn append_log(&self, entry: &LogEntry) {
        self.emit(format!("{} {entry}", level_marker(entry.level)));
    }
}

fn level_marker(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "  ",
        LogLevel::Success => "ok",
        LogLevel::Warning => "!!",
        LogLevel::Error => "xx",
    }
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One-shot status output for `status <job_id>`.
pub fn format_report(job_id: &str, report: &StatusReport) -> String {
    let mut text = format!(
        "Job {job_id}: {}\n{}",
        capitalize(report.status.as_str()),
        ProgressSnapshot::from_report(report)
    );
    if let Some(error) = &report.error {
        text.push_str(&format!("\nError: {error}"));
    }
    text
}

/// Listing for `jobs`.
pub fn format_jobs(jobs: &[JobSummary]) -> String {
    if jobs.is_empty() {
        return "No ingestion jobs found".to_string();
    }

    jobs.iter()
        .map(format_job)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_job(job: &JobSummary) -> String {
    let mut line = format!(
        "{:<12} {:<10} {} ({})",
        job.collection.as_deref().unwrap_or("-"),
        capitalize(job.status.as_str()),
        job.url,
        job.job_id.as_deref().unwrap_or("N/A"),
    );

    if let Some(progress) = &job.progress {
        line.push_str(&format!(
            " - {}",
            progress.message.as_deref().unwrap_or("Processing...")
        ));
        if progress.pages_fetched > 0 {
            line.push_str(&format!(" ({} pages)", progress.pages_fetched));
        }
    }

    let started = job
        .created_at
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        .map(|utc| utc.with_timezone(&Local));
    if let Some(started) = started {
        line.push_str(&format!(" started {}", started.format("%H:%M:%S")));
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Progress;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("running"), "Running");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_format_report_with_error() {
        let report = StatusReport {
            status: JobStatus::Failed,
            error: Some("crawl blocked".to_string()),
            ..Default::default()
        };
        let text = format_report("j9", &report);

        assert!(text.starts_with("Job j9: Failed"));
        assert!(text.contains("In progress..."));
        assert!(text.ends_with("Error: crawl blocked"));
    }

    #[test]
    fn test_format_jobs() {
        assert_eq!(format_jobs(&[]), "No ingestion jobs found");

        let job = JobSummary {
            job_id: Some("j1".to_string()),
            collection: Some("acme_com".to_string()),
            url: "https://acme.com".to_string(),
            status: JobStatus::Running,
            progress: Some(Progress {
                message: Some("Crawling".to_string()),
                pages_fetched: 4,
                ..Default::default()
            }),
            created_at: None,
            error: None,
            result: None,
        };
        let text = format_jobs(&[job]);

        assert!(text.contains("acme_com"));
        assert!(text.contains("(j1)"));
        assert!(text.contains("Crawling (4 pages)"));
    }
}
