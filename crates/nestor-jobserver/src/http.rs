//! Job server over the executor's REST job API
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | submit | `POST /api/jobs/` | `{"submission_id": ..}` or `{"job_id": ..}` |
//! | job info | `GET /api/jobs/{id}` | `{"status": .., "message": .., "start_time": .., "end_time": ..}` |
//! | logs | `GET /api/jobs/{id}/logs` | `{"logs": ..}` |
//! | stop | `POST /api/jobs/{id}/stop` | `{"stopped": ..}` |
//! | version | `GET /api/version` | `{"ray_version": ..}` or `{"version": ..}` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nestor_utils::error::JobServerError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::http_client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, HttpClient};
use crate::types::{ARGUMENTS_ENV_VAR, ComputeResource, JobInfo, JobStatus, JobSubmission};
use crate::{JobServer, JobServerConnector};

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    entrypoint: &'a str,
    runtime_env: RuntimeEnv<'a>,
    metadata: BTreeMap<&'static str, &'a str>,
}

#[derive(Debug, Serialize)]
struct RuntimeEnv<'a> {
    working_dir: &'a str,
    env_vars: BTreeMap<&'static str, &'a str>,
}

impl<'a> SubmitRequest<'a> {
    fn new(submission: &'a JobSubmission) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("title", submission.title.as_str());
        if let Some(description) = &submission.description {
            metadata.insert("description", description.as_str());
        }
        if let Some(version) = &submission.version {
            metadata.insert("version", version.as_str());
        }

        let mut env_vars = BTreeMap::new();
        env_vars.insert(ARGUMENTS_ENV_VAR, submission.encoded_arguments.as_str());

        Self {
            entrypoint: &submission.command,
            runtime_env: RuntimeEnv {
                working_dir: &submission.working_dir,
                env_vars,
            },
            metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    submission_id: Option<String>,
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobDetails {
    status: String,
    message: Option<String>,
    start_time: Option<i64>,
    end_time: Option<i64>,
}

impl JobDetails {
    fn into_info(self, job_id: &str) -> Result<JobInfo, JobServerError> {
        let status = JobStatus::from_str(&self.status).map_err(|_| {
            JobServerError::Protocol(format!("unknown job status '{}'", self.status))
        })?;

        Ok(JobInfo {
            job_id: job_id.to_string(),
            status,
            message: self.message.filter(|m| !m.is_empty()),
            start_time: self.start_time.and_then(DateTime::<Utc>::from_timestamp_millis),
            end_time: self.end_time.and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    logs: String,
}

#[derive(Debug, Deserialize)]
struct StopResponse {
    stopped: bool,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    ray_version: Option<String>,
    version: Option<String>,
}

/// [`JobServer`] speaking HTTP to one compute resource.
#[derive(Debug, Clone)]
pub struct HttpJobServer {
    client: HttpClient,
    base: Url,
}

impl HttpJobServer {
    /// Connect to `resource` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns `JobServerError::Misconfiguration` if the resource address is not a valid URL
    pub fn new(resource: &ComputeResource) -> Result<Self, JobServerError> {
        let client = HttpClient::with_timeouts(DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)?;
        Self::with_client(client, resource)
    }

    fn with_client(client: HttpClient, resource: &ComputeResource) -> Result<Self, JobServerError> {
        let base_url = resource.base_url();
        let base = Url::parse(&base_url).map_err(|e| {
            JobServerError::Misconfiguration(format!(
                "compute resource '{}' has invalid address {base_url}: {e}",
                resource.name
            ))
        })?;
        if base.cannot_be_a_base() {
            return Err(JobServerError::Misconfiguration(format!(
                "compute resource '{}' address {base_url} cannot be used as a base URL",
                resource.name
            )));
        }
        Ok(Self { client, base })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `with_client` rejected cannot-be-a-base URLs, so segments are available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Promote a 404 on a job-scoped request to `NotFound`.
fn job_scoped(job_id: &str, err: JobServerError) -> JobServerError {
    match err {
        JobServerError::Http { status: 404, .. } => JobServerError::NotFound {
            job_id: job_id.to_string(),
        },
        other => other,
    }
}

#[async_trait]
impl JobServer for HttpJobServer {
    async fn submit(&self, submission: &JobSubmission) -> Result<String, JobServerError> {
        let url = self.endpoint(&["api", "jobs", ""]);
        let body = SubmitRequest::new(submission);
        let response: SubmitResponse = self
            .client
            .execute_json(self.client.post(url).json(&body), "submit")
            .await?;

        let job_id = response
            .submission_id
            .or(response.job_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                JobServerError::Protocol("submit response carried no job id".to_string())
            })?;

        info!(
            job_id = %job_id,
            title = %submission.title,
            base_url = %self.base,
            "Submitted job"
        );
        Ok(job_id)
    }

    async fn job_info(&self, job_id: &str) -> Result<JobInfo, JobServerError> {
        let url = self.endpoint(&["api", "jobs", job_id]);
        let details: JobDetails = self
            .client
            .execute_json(self.client.get(url), "job info")
            .await
            .map_err(|e| job_scoped(job_id, e))?;
        let info = details.into_info(job_id)?;
        debug!(job_id, status = %info.status, "Fetched job info");
        Ok(info)
    }

    async fn logs(&self, job_id: &str) -> Result<String, JobServerError> {
        let url = self.endpoint(&["api", "jobs", job_id, "logs"]);
        let response: LogsResponse = self
            .client
            .execute_json(self.client.get(url), "logs")
            .await
            .map_err(|e| job_scoped(job_id, e))?;
        Ok(response.logs)
    }

    async fn stop(&self, job_id: &str) -> Result<bool, JobServerError> {
        let url = self.endpoint(&["api", "jobs", job_id, "stop"]);
        let response: StopResponse = self
            .client
            .execute_json(self.client.post(url), "stop")
            .await
            .map_err(|e| job_scoped(job_id, e))?;
        debug!(job_id, stopped = response.stopped, "Stop requested");
        Ok(response.stopped)
    }

    async fn version(&self) -> Result<String, JobServerError> {
        let url = self.endpoint(&["api", "version"]);
        let response: VersionResponse = self
            .client
            .execute_json(self.client.get(url), "version")
            .await?;
        response
            .ray_version
            .or(response.version)
            .ok_or_else(|| JobServerError::Protocol("version response carried no version".to_string()))
    }
}

/// Production [`JobServerConnector`]: one shared HTTP client, one
/// [`HttpJobServer`] per resource.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: HttpClient,
}

impl HttpConnector {
    /// Connector with default timeouts
    ///
    /// # Errors
    ///
    /// Returns `JobServerError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new() -> Result<Self, JobServerError> {
        Self::with_timeouts(DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Connector with explicit per-request and connect timeouts
    ///
    /// # Errors
    ///
    /// Returns `JobServerError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn with_timeouts(
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, JobServerError> {
        Ok(Self {
            client: HttpClient::with_timeouts(request_timeout, connect_timeout)?,
        })
    }
}

impl JobServerConnector for HttpConnector {
    fn connect(&self, resource: &ComputeResource) -> Result<Arc<dyn JobServer>, JobServerError> {
        let server = HttpJobServer::with_client(self.client.clone(), resource)?;
        Ok(Arc::new(server))
    }
}
