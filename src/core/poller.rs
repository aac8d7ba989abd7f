//! Recurring status probe for a single job.
//!
//! A [`StatusPoller`] owns at most one timer task. Each tick spawns its own
//! status request so a slow or hung request never holds up the next tick.
//! Outcomes, successful or not, are handed to the tick callback tagged with
//! the poll id that produced them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::api::{ApiError, IngestApi, StatusReport};

/// Result of one poll tick.
#[derive(Debug)]
pub struct PollTick {
    /// Identifies the `start` call this tick belongs to.
    pub poll_id: u64,
    pub job_id: String,
    pub outcome: Result<StatusReport, ApiError>,
}

type TickCallback = Arc<dyn Fn(PollTick) + Send + Sync>;

struct PollTask {
    id: u64,
    job_id: String,
    token: CancellationToken,
    _timer: JoinHandle<()>,
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct StatusPoller {
    api: Arc<dyn IngestApi>,
    current: Option<PollTask>,
    next_id: u64,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn IngestApi>) -> Self {
        Self {
            api,
            current: None,
            next_id: 1,
        }
    }

    /// Start probing `job_id` every `interval`, first probe one interval from
    /// now. Any timer already running is cancelled first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, job_id: &str, interval: Duration, on_tick: F) -> u64
    where
        F: Fn(PollTick) + Send + Sync + 'static,
    {
        self.stop();

        let id = self.next_id;
        self.next_id += 1;

        let token = CancellationToken::new();
        let timer = tokio::spawn(run_timer(
            id,
            job_id.to_string(),
            interval,
            self.api.clone(),
            token.clone(),
            Arc::new(on_tick),
        ));

        debug!(poll_id = id, job_id, interval_secs = interval.as_secs_f64(), "Poller started");

        self.current = Some(PollTask {
            id,
            job_id: job_id.to_string(),
            token,
            _timer: timer,
        });
        id
    }

    /// Cancel the timer. No-op when nothing is running.
    pub fn stop(&mut self) {
        if let Some(task) = self.current.take() {
            debug!(poll_id = task.id, job_id = %task.job_id, "Poller stopped");
            // Dropping the task cancels its token
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Whether `poll_id` belongs to the live timer.
    pub fn is_current(&self, poll_id: u64) -> bool {
        self.current
            .as_ref()
            .is_some_and(|task| task.id == poll_id && !task.token.is_cancelled())
    }

    pub fn job_id(&self) -> Option<&str> {
        self.current.as_ref().map(|task| task.job_id.as_str())
    }
}

async fn run_timer(
    poll_id: u64,
    job_id: String,
    period: Duration,
    api: Arc<dyn IngestApi>,
    token: CancellationToken,
    on_tick: TickCallback,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                trace!(poll_id, job_id = %job_id, "Poll tick");
                tokio::spawn(probe(
                    poll_id,
                    job_id.clone(),
                    api.clone(),
                    token.clone(),
                    on_tick.clone(),
                ));
            }
        }
    }
}

async fn probe(
    poll_id: u64,
    job_id: String,
    api: Arc<dyn IngestApi>,
    token: CancellationToken,
    on_tick: TickCallback,
) {
    let outcome = api.status(&job_id).await;

    // The request is not aborted on stop, so its completion may be stale
    if token.is_cancelled() {
        debug!(poll_id, job_id = %job_id, "Dropping probe result of stopped poller");
        return;
    }

    on_tick(PollTick {
        poll_id,
        job_id,
        outcome,
    });
}
