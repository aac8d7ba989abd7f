//! HTTP client for the ingestion service.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use super::protocol::{
    ActiveJobs, ErrorBody, IngestRequest, JobSummary, RecentJobs, StatusReport, SubmitResponse,
};
use super::{ApiError, IngestApi};

/// Header carrying the configured API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

pub struct HttpIngestApi {
    base: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpIngestApi {
    pub fn new(base: Url, api_key: Option<String>) -> Self {
        Self {
            base,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Build an endpoint URL below the base, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "Ingest API request");
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }
}

/// Turn a non-2xx response into [`ApiError::Rejected`].
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message());

    Err(ApiError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl IngestApi for HttpIngestApi {
    async fn submit(&self, request: &IngestRequest) -> Result<String, ApiError> {
        let response = self
            .request(Method::POST, self.endpoint(&["ingest"]))
            .json(request)
            .send()
            .await?;

        let body: SubmitResponse = check(response).await?.json().await?;
        Ok(body.job_id)
    }

    async fn status(&self, job_id: &str) -> Result<StatusReport, ApiError> {
        let response = self
            .request(Method::GET, self.endpoint(&["ingest", "status", job_id]))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    async fn active_jobs(&self) -> Result<Vec<JobSummary>, ApiError> {
        let response = self
            .request(Method::GET, self.endpoint(&["ingest", "active"]))
            .send()
            .await?;

        let body: ActiveJobs = check(response).await?.json().await?;
        Ok(body.active_processes)
    }

    async fn recent_jobs(&self, limit: u32) -> Result<Vec<JobSummary>, ApiError> {
        let response = self
            .request(Method::GET, self.endpoint(&["ingest", "jobs"]))
            .query(&[("limit", limit)])
            .send()
            .await?;

        let body: RecentJobs = check(response).await?.json().await?;
        Ok(body.jobs)
    }
}
