//! Wire types for the ingestion service.
//!
//! Bodies are JSON. Unknown fields are ignored so the client keeps working
//! when the service adds data to its responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::models::JobStatus;

/// Body of `POST /ingest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestRequest {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

/// Successful response of `POST /ingest`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Error body returned with non-2xx responses.
///
/// `detail` is usually a string, but request validation failures carry a
/// list of objects instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Live counters reported while a job runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pages_fetched: u64,
    #[serde(default)]
    pub chunks_extracted: u64,
    #[serde(default)]
    pub embeddings_created: u64,
    #[serde(default)]
    pub points_upserted: u64,
}

/// Final counts of a completed job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    #[serde(default)]
    pub pages_indexed: Option<u64>,
    #[serde(default)]
    pub pages_crawled: Option<u64>,
    #[serde(default)]
    pub chunks_indexed: Option<u64>,
}

impl IngestResult {
    pub fn pages(&self) -> u64 {
        self.pages_indexed.or(self.pages_crawled).unwrap_or(0)
    }

    pub fn chunks(&self) -> u64 {
        self.chunks_indexed.unwrap_or(0)
    }
}

/// Body of `GET /ingest/status/{job_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<Progress>,
    #[serde(default)]
    pub result: Option<IngestResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One row of the active/recent job listings.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSummary {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<Progress>,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<IngestResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveJobs {
    #[serde(default)]
    pub active_processes: Vec<JobSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentJobs {
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}
