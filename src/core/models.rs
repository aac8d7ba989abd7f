use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::api::{IngestRequest, IngestResult, Progress, StatusReport};

/// Status of a job as reported by the service.
///
/// Anything other than `completed` or `failed` counts as running, so an
/// unexpected value never ends tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the content to ingest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    Urls(Vec<String>),
}

/// Rejection of a submission before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("collection name must not be empty")]
    EmptyCollection,
    #[error("no URL to ingest")]
    NoSource,
    #[error("URL must not be empty")]
    EmptyUrl,
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported URL scheme in {url:?}, expected http or https")]
    UnsupportedScheme { url: String },
}

/// What to ingest and into which collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTarget {
    pub collection: String,
    pub source: Source,
}

impl IngestTarget {
    pub fn url(collection: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            source: Source::Url(url.into()),
        }
    }

    pub fn urls(collection: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            collection: collection.into(),
            source: Source::Urls(urls),
        }
    }

    /// Target for a whole site, with the collection named after its host.
    ///
    /// A missing scheme is taken to be `https://`.
    pub fn site(raw_url: &str) -> Self {
        let url = normalize_url(raw_url);
        Self::url(collection_name_for(&url), url)
    }

    /// Check the target and build the request body from trimmed values.
    pub fn to_request(&self) -> Result<IngestRequest, ValidationError> {
        let collection = self.collection.trim();
        if collection.is_empty() {
            return Err(ValidationError::EmptyCollection);
        }

        let (url, urls) = match &self.source {
            Source::Url(url) => (Some(check_url(url)?), None),
            Source::Urls(urls) if urls.is_empty() => return Err(ValidationError::NoSource),
            Source::Urls(urls) => {
                let checked = urls
                    .iter()
                    .map(|u| check_url(u))
                    .collect::<Result<Vec<_>, _>>()?;
                (None, Some(checked))
            }
        };

        Ok(IngestRequest {
            collection: collection.to_string(),
            url,
            urls,
        })
    }
}

fn check_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let parsed = Url::parse(trimmed).map_err(|e| ValidationError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        "http" | "https" => Err(ValidationError::InvalidUrl {
            url: trimmed.to_string(),
            reason: "missing host".to_string(),
        }),
        _ => Err(ValidationError::UnsupportedScheme {
            url: trimmed.to_string(),
        }),
    }
}

fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if trimmed.is_empty() || lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Fallback collection name when the URL has no usable host.
pub const DEFAULT_COLLECTION: &str = "default_collection";

/// Derive a collection name from a site URL: host without `www.`, every
/// non-alphanumeric character replaced by `_`, lowercased.
pub fn collection_name_for(raw_url: &str) -> String {
    let Ok(url) = Url::parse(&normalize_url(raw_url)) else {
        return DEFAULT_COLLECTION.to_string();
    };
    let Some(host) = url.host_str() else {
        return DEFAULT_COLLECTION.to_string();
    };

    host.strip_prefix("www.")
        .unwrap_or(host)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

/// What the presentation layer shows for the latest status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressSnapshot {
    /// Live counters from a running job.
    Progress(Progress),
    /// Final counts, used when the report carries no live counters.
    Indexed { pages: u64, chunks: u64 },
    /// Nothing to show yet.
    Pending,
}

impl ProgressSnapshot {
    pub fn from_report(report: &StatusReport) -> Self {
        match (&report.progress, &report.result) {
            (Some(progress), _) => Self::Progress(progress.clone()),
            (None, Some(result)) => Self::from_result(result),
            (None, None) => Self::Pending,
        }
    }

    fn from_result(result: &IngestResult) -> Self {
        Self::Indexed {
            pages: result.pages(),
            chunks: result.chunks(),
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(p) => {
                if let Some(message) = p.message.as_deref().filter(|m| !m.is_empty()) {
                    write!(f, "{message} | ")?;
                }
                write!(
                    f,
                    "Pages fetched: {} | Chunks extracted: {} | Embeddings created: {} | Points upserted: {}",
                    p.pages_fetched, p.chunks_extracted, p.embeddings_created, p.points_upserted
                )
            }
            Self::Indexed { pages, chunks } => {
                write!(f, "Indexed: {pages} pages, {chunks} chunks")
            }
            Self::Pending => f.write_str("In progress..."),
        }
    }
}
