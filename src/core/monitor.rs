//! Job lifecycle monitor.
//!
//! Submits ingestion jobs, follows them with a [`StatusPoller`] until the
//! service reports a terminal status, and keeps the [`PersistentJobHandle`] in
//! step so a restarted client can pick the job up again with
//! [`JobMonitor::resume`].
//!
//! All state lives behind one mutex that is never held across an `.await`.
//! Sink calls are made under that lock, so the presentation layer sees events
//! in the order they completed.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{IngestApi, StatusReport};

use super::event_log::{DEFAULT_LOG_CAPACITY, EventLog, LogEntry, LogLevel};
use super::handle::{HandleOutcome, PersistentJobHandle};
use super::models::{IngestTarget, JobStatus, ProgressSnapshot, ValidationError};
use super::poller::{PollTick, StatusPoller};
use super::sink::PresentationSink;

/// Default delay between status probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

const GENERIC_SUBMIT_FAILURE: &str = "Ingestion failed";

/// Tuning values fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub log_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    #[default]
    Idle,
    Submitting,
    Active { job_id: String },
    Terminal(TerminalState),
}

impl MonitorPhase {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Active { job_id } => Some(job_id),
            _ => None,
        }
    }

    /// Whether a submission or a tracked job is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Submitting | Self::Active { .. })
    }
}

/// Errors returned to the caller of [`JobMonitor::submit`].
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid submission: {0}")]
    Validation(#[from] ValidationError),
    #[error("{message}")]
    Submission { message: String },
    /// The service accepted the job, but a newer submission had already
    /// replaced this one, so the job is not followed.
    #[error("job {job_id} was replaced by a newer submission and is not followed")]
    Superseded { job_id: String },
}

/// What [`JobMonitor::resume`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    NothingStored,
    Resumed { job_id: String },
    /// The stored job was terminal or could not be confirmed; its handle was
    /// cleared.
    Discarded { job_id: String },
    /// A submission started while the stored job was being probed.
    Skipped { job_id: String },
}

struct MonitorState {
    phase: MonitorPhase,
    poller: StatusPoller,
    log: EventLog,
    /// Bumped by every submission; only the latest one may apply its outcome.
    generation: u64,
}

struct Shared {
    settings: MonitorSettings,
    api: Arc<dyn IngestApi>,
    handle: PersistentJobHandle,
    sink: Arc<dyn PresentationSink>,
    state: Mutex<MonitorState>,
    phase_tx: watch::Sender<MonitorPhase>,
}

/// Cheap to clone; clones share the same job.
#[derive(Clone)]
pub struct JobMonitor {
    shared: Arc<Shared>,
}

impl JobMonitor {
    pub fn new(
        settings: MonitorSettings,
        api: Arc<dyn IngestApi>,
        handle: PersistentJobHandle,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(MonitorPhase::Idle);
        let state = MonitorState {
            phase: MonitorPhase::Idle,
            poller: StatusPoller::new(api.clone()),
            log: EventLog::with_capacity(settings.log_capacity),
            generation: 0,
        };

        Self {
            shared: Arc::new(Shared {
                settings,
                api,
                handle,
                sink,
                state: Mutex::new(state),
                phase_tx,
            }),
        }
    }

    /// Submit a new job and start following it.
    ///
    /// A job that is already being followed is superseded: its poller is
    /// stopped before the new request goes out. When submissions overlap, the
    /// most recent call wins; an older one that completes later returns
    /// [`MonitorError::Superseded`] or its own failure without touching the
    /// monitor's phase, poller or handle.
    pub async fn submit(&self, target: IngestTarget) -> Result<String, MonitorError> {
        let request = target.to_request()?;
        let shared = &self.shared;

        let (generation, superseded) = {
            let mut state = shared.lock();
            state.generation += 1;
            let generation = state.generation;
            let previous = state.phase.job_id().map(str::to_string);
            if let Some(job_id) = &previous {
                state.poller.stop();
                shared.log(
                    &mut state,
                    LogLevel::Info,
                    format!("Stopped following job {job_id} for a new submission."),
                );
            }
            shared.set_phase(&mut state, MonitorPhase::Submitting);
            shared.sink.render_status(JobStatus::Running, None);
            shared.log(
                &mut state,
                LogLevel::Info,
                format!("Starting ingestion for collection: {}", request.collection),
            );
            (generation, previous)
        };

        match shared.api.submit(&request).await {
            Ok(job_id) => {
                let mut state = shared.lock();
                if state.generation != generation {
                    debug!(job_id = %job_id, generation, "Dropping result of replaced submission");
                    shared.log(
                        &mut state,
                        LogLevel::Warning,
                        format!(
                            "Ingestion job {job_id} started, but a newer submission replaced it; not following it."
                        ),
                    );
                    return Err(MonitorError::Superseded { job_id });
                }

                if let HandleOutcome::Unavailable(reason) = shared.handle.set(&job_id) {
                    shared.log(
                        &mut state,
                        LogLevel::Warning,
                        format!("Job {job_id} will not survive a restart: {reason}"),
                    );
                }
                self.start_polling(&mut state, &job_id);
                shared.set_phase(
                    &mut state,
                    MonitorPhase::Active {
                        job_id: job_id.clone(),
                    },
                );
                shared.sink.render_status(JobStatus::Running, Some(&job_id));
                shared.log(
                    &mut state,
                    LogLevel::Info,
                    format!("Ingestion job started with ID: {job_id}"),
                );
                Ok(job_id)
            }
            Err(e) => {
                error!(error = %e, collection = %request.collection, "Ingestion submission failed");
                let message = e
                    .detail()
                    .map(str::to_string)
                    .unwrap_or_else(|| GENERIC_SUBMIT_FAILURE.to_string());

                let mut state = shared.lock();
                if state.generation == generation {
                    if superseded.is_some() {
                        shared.handle.clear();
                    }
                    shared.set_phase(&mut state, MonitorPhase::Terminal(TerminalState::Failed));
                    shared.sink.render_status(JobStatus::Failed, None);
                }
                shared.log(&mut state, LogLevel::Error, format!("Error: {message}"));
                Err(MonitorError::Submission { message })
            }
        }
    }

    /// Pick up the job recorded by a previous session, if it is still running.
    ///
    /// Performs exactly one status probe. A stored job that is terminal, or
    /// whose status cannot be fetched, is forgotten.
    pub async fn resume(&self) -> ResumeOutcome {
        let shared = &self.shared;
        let Some(job_id) = shared.handle.get() else {
            debug!("No stored job to resume");
            return ResumeOutcome::NothingStored;
        };

        info!(job_id = %job_id, "Checking stored job");
        let generation = shared.lock().generation;
        let probe = shared.api.status(&job_id).await;

        let mut state = shared.lock();
        if state.phase.is_busy() || state.generation != generation {
            // A submission started while we were probing; it owns the handle now
            debug!(job_id = %job_id, "Skipping resume, monitor already busy");
            return ResumeOutcome::Skipped { job_id };
        }

        match probe {
            Ok(report) if !report.status.is_terminal() => {
                shared.render_report(&report, &job_id);
                self.start_polling(&mut state, &job_id);
                shared.set_phase(
                    &mut state,
                    MonitorPhase::Active {
                        job_id: job_id.clone(),
                    },
                );
                shared.log(
                    &mut state,
                    LogLevel::Info,
                    format!("Resumed monitoring job {job_id}."),
                );
                ResumeOutcome::Resumed { job_id }
            }
            Ok(report) => {
                shared.render_report(&report, &job_id);
                shared.handle.clear();
                shared.log(
                    &mut state,
                    LogLevel::Info,
                    format!("Stored job {job_id} already {}.", report.status),
                );
                ResumeOutcome::Discarded { job_id }
            }
            Err(e) => {
                shared.handle.clear();
                shared.log(
                    &mut state,
                    LogLevel::Warning,
                    format!("Could not confirm stored job {job_id}: {e}"),
                );
                ResumeOutcome::Discarded { job_id }
            }
        }
    }

    /// Stop following the current job but keep its handle, so a later
    /// [`resume`](Self::resume) can pick it up again.
    pub fn detach(&self) {
        let shared = &self.shared;
        let mut state = shared.lock();
        let Some(job_id) = state.phase.job_id().map(str::to_string) else {
            return;
        };

        state.poller.stop();
        shared.set_phase(&mut state, MonitorPhase::Idle);
        shared.log(
            &mut state,
            LogLevel::Info,
            format!("Stopped following job {job_id}; it can be resumed later."),
        );
    }

    pub fn phase(&self) -> MonitorPhase {
        self.shared.lock().phase.clone()
    }

    /// Subscribe to phase changes.
    pub fn phases(&self) -> watch::Receiver<MonitorPhase> {
        self.shared.phase_tx.subscribe()
    }

    pub fn active_job(&self) -> Option<String> {
        self.shared.lock().phase.job_id().map(str::to_string)
    }

    pub fn is_polling(&self) -> bool {
        self.shared.lock().poller.is_running()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.shared.lock().log.entries().cloned().collect()
    }

    fn start_polling(&self, state: &mut MonitorState, job_id: &str) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        state
            .poller
            .start(job_id, self.shared.settings.poll_interval, move |tick| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_poll_result(tick);
                }
            });
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_phase(&self, state: &mut MonitorState, phase: MonitorPhase) {
        state.phase = phase.clone();
        self.phase_tx.send_replace(phase);
    }

    fn log(&self, state: &mut MonitorState, level: LogLevel, message: String) {
        match level {
            LogLevel::Info | LogLevel::Success => info!(target: "ingest_monitor::events", "{message}"),
            LogLevel::Warning => warn!(target: "ingest_monitor::events", "{message}"),
            LogLevel::Error => error!(target: "ingest_monitor::events", "{message}"),
        }

        let entry = LogEntry::new(level, message);
        self.sink.append_log(&entry);
        state.log.push(entry);
    }

    fn render_report(&self, report: &StatusReport, job_id: &str) {
        self.sink.render_status(report.status, Some(job_id));
        self.sink
            .render_progress(&ProgressSnapshot::from_report(report), Local::now());
    }

    fn on_poll_result(&self, tick: PollTick) {
        let mut state = self.lock();
        if !state.poller.is_current(tick.poll_id) {
            debug!(poll_id = tick.poll_id, job_id = %tick.job_id, "Ignoring stale poll result");
            return;
        }

        let report = match tick.outcome {
            Ok(report) => report,
            Err(e) => {
                self.log(
                    &mut state,
                    LogLevel::Warning,
                    format!("Status check failed: {e}"),
                );
                return;
            }
        };

        self.render_report(&report, &tick.job_id);

        let terminal = match report.status {
            JobStatus::Running => return,
            JobStatus::Completed => {
                let (pages, chunks) = report
                    .result
                    .as_ref()
                    .map(|r| (r.pages(), r.chunks()))
                    .unwrap_or_default();
                self.log(
                    &mut state,
                    LogLevel::Success,
                    format!("Ingestion completed! {pages} pages, {chunks} chunks indexed."),
                );
                TerminalState::Completed
            }
            JobStatus::Failed => {
                let reason = report.error.as_deref().unwrap_or("unknown error");
                self.log(
                    &mut state,
                    LogLevel::Error,
                    format!("Ingestion failed: {reason}"),
                );
                TerminalState::Failed
            }
        };

        state.poller.stop();
        self.handle.clear();
        self.set_phase(&mut state, MonitorPhase::Terminal(terminal));
    }
}
