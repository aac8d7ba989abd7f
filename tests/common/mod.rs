//! Shared fixtures for monitor tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use ingest_monitor::api::{ApiError, IngestApi, IngestRequest, JobSummary, StatusReport};
use ingest_monitor::core::{
    HandleBackend, JobMonitor, JobStatus, LogEntry, MonitorSettings, PersistentJobHandle,
    PresentationSink, ProgressSnapshot,
};
use tokio::time::Instant;

pub const INTERVAL: Duration = Duration::from_secs(60);

/// Scripted stand-in for the ingestion service.
#[derive(Default)]
pub struct FakeApi {
    submit_results: Mutex<VecDeque<(Duration, Result<String, ApiError>)>>,
    status_results: Mutex<HashMap<String, VecDeque<Scripted>>>,
    pub submits: Mutex<Vec<IngestRequest>>,
    pub status_calls: Mutex<Vec<(String, Instant)>>,
}

pub struct Scripted {
    pub delay: Duration,
    pub outcome: Result<StatusReport, ApiError>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept(&self, job_id: &str) {
        self.accept_after(job_id, Duration::ZERO);
    }

    /// Accept the next submission once `delay` has passed.
    pub fn accept_after(&self, job_id: &str, delay: Duration) {
        self.submit_results
            .lock()
            .unwrap()
            .push_back((delay, Ok(job_id.to_string())));
    }

    pub fn reject(&self, err: ApiError) {
        self.reject_after(err, Duration::ZERO);
    }

    pub fn reject_after(&self, err: ApiError, delay: Duration) {
        self.submit_results.lock().unwrap().push_back((delay, Err(err)));
    }

    pub fn script(&self, job_id: &str, outcome: Result<StatusReport, ApiError>) {
        self.script_delayed(job_id, Duration::ZERO, outcome);
    }

    pub fn script_delayed(
        &self,
        job_id: &str,
        delay: Duration,
        outcome: Result<StatusReport, ApiError>,
    ) {
        self.status_results
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push_back(Scripted { delay, outcome });
    }

    pub fn submit_count(&self) -> usize {
        self.submits.lock().unwrap().len()
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    pub fn status_count_for(&self, job_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .count()
    }

    pub fn status_times(&self) -> Vec<Instant> {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl IngestApi for FakeApi {
    async fn submit(&self, request: &IngestRequest) -> Result<String, ApiError> {
        self.submits.lock().unwrap().push(request.clone());
        let (delay, outcome) = self
            .submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| (Duration::ZERO, Ok("job".to_string())));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn status(&self, job_id: &str) -> Result<StatusReport, ApiError> {
        self.status_calls
            .lock()
            .unwrap()
            .push((job_id.to_string(), Instant::now()));

        let scripted = self
            .status_results
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(Scripted { delay, outcome }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => Ok(running()),
        }
    }

    async fn active_jobs(&self) -> Result<Vec<JobSummary>, ApiError> {
        Ok(Vec::new())
    }

    async fn recent_jobs(&self, _limit: u32) -> Result<Vec<JobSummary>, ApiError> {
        Ok(Vec::new())
    }
}

pub fn running() -> StatusReport {
    serde_json::from_str(r#"{"status":"running"}"#).unwrap()
}

pub fn report(json: &str) -> StatusReport {
    serde_json::from_str(json).unwrap()
}

pub fn unavailable() -> ApiError {
    ApiError::Rejected {
        status: 503,
        detail: Some("upstream unavailable".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Status(JobStatus, Option<String>),
    Progress(ProgressSnapshot),
    Log(LogEntry),
}

/// Sink that records everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<ProgressSnapshot> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Progress(snapshot) => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Status(status, _) => Some(status),
                _ => None,
            })
            .collect()
    }
}

impl PresentationSink for RecordingSink {
    fn render_status(&self, status: JobStatus, job_id: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Status(status, job_id.map(str::to_string)));
    }

    fn render_progress(&self, snapshot: &ProgressSnapshot, _at: DateTime<Local>) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Progress(snapshot.clone()));
    }

    fn append_log(&self, entry: &LogEntry) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Log(entry.clone()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Write(String),
    Remove,
}

/// In-memory handle backend that records every mutation.
#[derive(Default)]
pub struct CountingBackend {
    value: Mutex<Option<String>>,
    pub ops: Mutex<Vec<StoreOp>>,
    fail_writes: bool,
}

impl CountingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_value(job_id: &str) -> Arc<Self> {
        let backend = Self::default();
        *backend.value.lock().unwrap() = Some(job_id.to_string());
        Arc::new(backend)
    }

    /// Backend whose writes always fail, like a read-only state directory.
    pub fn read_only() -> Arc<Self> {
        Arc::new(Self {
            fail_writes: true,
            ..Self::default()
        })
    }

    pub fn value(&self) -> Option<String> {
        self.value.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Write(value) => Some(value),
                StoreOp::Remove => None,
            })
            .collect()
    }

    pub fn removals(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, StoreOp::Remove))
            .count()
    }
}

impl HandleBackend for CountingBackend {
    fn read(&self, _key: &str) -> io::Result<Option<String>> {
        Ok(self.value())
    }

    fn write(&self, _key: &str, value: &str) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only file system",
            ));
        }
        self.ops.lock().unwrap().push(StoreOp::Write(value.to_string()));
        *self.value.lock().unwrap() = Some(value.to_string());
        Ok(())
    }

    fn remove(&self, _key: &str) -> io::Result<()> {
        self.ops.lock().unwrap().push(StoreOp::Remove);
        *self.value.lock().unwrap() = None;
        Ok(())
    }
}

pub fn monitor(
    api: &Arc<FakeApi>,
    backend: &Arc<CountingBackend>,
    sink: Arc<dyn PresentationSink>,
) -> JobMonitor {
    JobMonitor::new(
        MonitorSettings {
            poll_interval: INTERVAL,
            ..Default::default()
        },
        api.clone(),
        PersistentJobHandle::new(backend.clone()),
        sink,
    )
}

/// Advance the paused clock, letting every timer and spawned task due in
/// that window run.
pub async fn elapse(duration: Duration) {
    tokio::time::sleep(duration).await;
}
