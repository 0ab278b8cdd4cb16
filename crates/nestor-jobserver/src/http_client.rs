//! Shared HTTP client for job server round trips
//!
//! One `reqwest::Client` is built per connector and shared by every job server
//! connection it hands out, so connections to the same host are reused.
//! Requests are sent exactly once; callers decide whether to retry.

use nestor_utils::error::JobServerError;
use nestor_utils::redaction::{error_body_message, redact_error_message};
use reqwest::{Client, IntoUrl, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    request_timeout: Duration,
}

impl HttpClient {
    /// Build a client with the given timeouts
    ///
    /// # Errors
    ///
    /// Returns `JobServerError::Misconfiguration` if the client cannot be constructed
    pub fn with_timeouts(
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, JobServerError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                JobServerError::Misconfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client: Arc::new(client),
            request_timeout,
        })
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send one request and map failures to `JobServerError`.
    ///
    /// - timeouts → `JobServerError::Timeout`
    /// - connection and body failures → `JobServerError::Transport`
    /// - 404 → `JobServerError::Http { status: 404, .. }`; job-scoped callers
    ///   promote it to `NotFound`
    /// - any other non-2xx → `JobServerError::Http`
    pub async fn execute(
        &self,
        request_builder: RequestBuilder,
        operation: &str,
    ) -> Result<Response, JobServerError> {
        let request = request_builder
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| JobServerError::Transport(format!("Failed to build request: {e}")))?;

        debug!(
            operation,
            method = %request.method(),
            url = %redact_error_message(request.url().as_str()),
            timeout_secs = self.request_timeout.as_secs(),
            "Executing job server request"
        );

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                let error = map_status_error(status, &body);
                warn!(operation, status = status.as_u16(), "Job server returned an error");
                Err(error)
            }
            Err(e) if e.is_timeout() => Err(JobServerError::Timeout {
                duration: self.request_timeout,
            }),
            Err(e) => Err(JobServerError::Transport(format!(
                "{operation} request failed: {}",
                redact_error_message(&e.to_string())
            ))),
        }
    }

    /// Send one request and decode its JSON body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        operation: &str,
    ) -> Result<T, JobServerError> {
        let response = self.execute(request_builder, operation).await?;
        let body = response.text().await.map_err(|e| {
            JobServerError::Transport(format!(
                "Failed to read {operation} response: {}",
                redact_error_message(&e.to_string())
            ))
        })?;
        serde_json::from_str(&body).map_err(|e| {
            JobServerError::Protocol(format!("Failed to parse {operation} response: {e}"))
        })
    }
}

/// Map a non-success status and its body to a `JobServerError::Http`.
fn map_status_error(status: StatusCode, body: &str) -> JobServerError {
    JobServerError::Http {
        status: status.as_u16(),
        message: error_body_message(body, status.canonical_reason()),
    }
}
