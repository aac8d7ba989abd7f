//! Boundary between the monitor and whatever displays its state.

use chrono::{DateTime, Local};

use super::event_log::LogEntry;
use super::models::{JobStatus, ProgressSnapshot};

/// Receives status, progress and log updates from the monitor.
///
/// Calls are made synchronously while the monitor holds its state lock, so
/// implementations must return quickly and must not call back into the
/// monitor. Rendering failures stay inside the sink.
pub trait PresentationSink: Send + Sync {
    fn render_status(&self, status: JobStatus, job_id: Option<&str>);

    fn render_progress(&self, snapshot: &ProgressSnapshot, at: DateTime<Local>);

    fn append_log(&self, entry: &LogEntry);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn render_status(&self, _status: JobStatus, _job_id: Option<&str>) {}

    fn render_progress(&self, _snapshot: &ProgressSnapshot, _at: DateTime<Local>) {}

    fn append_log(&self, _entry: &LogEntry) {}
}
