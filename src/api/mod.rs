//! Client side of the remote ingestion service.
//!
//! ## Architecture
//!
//! - `protocol`: JSON request/response bodies
//! - `client`: `reqwest` implementation of [`IngestApi`]
//!
//! The monitor only sees the [`IngestApi`] trait, so tests and alternative
//! transports can stand in for the HTTP client.

pub mod client;
pub mod protocol;

use async_trait::async_trait;
use thiserror::Error;

pub use client::HttpIngestApi;
pub use protocol::{
    ActiveJobs, ErrorBody, IngestRequest, IngestResult, JobSummary, Progress, RecentJobs,
    StatusReport,
};

/// Error returned by ingestion service calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service could not be reached or its response could not be read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The service answered with a non-2xx status.
    #[error("service returned HTTP {status}{}", detail_suffix(.detail))]
    Rejected { status: u16, detail: Option<String> },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    /// Message supplied by the service, if it sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { detail, .. } => detail.as_deref(),
            ApiError::Network(_) => None,
        }
    }
}

/// Operations the monitor needs from the ingestion service.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Submit a job and return the id assigned by the service.
    async fn submit(&self, request: &IngestRequest) -> Result<String, ApiError>;

    /// Fetch the current status of a job.
    async fn status(&self, job_id: &str) -> Result<StatusReport, ApiError>;

    /// Jobs the service is currently working on.
    async fn active_jobs(&self) -> Result<Vec<JobSummary>, ApiError>;

    /// Most recent jobs, newest first.
    async fn recent_jobs(&self, limit: u32) -> Result<Vec<JobSummary>, ApiError>;
}
