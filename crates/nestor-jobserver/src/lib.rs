//! Client side of the remote job server protocol.
//!
//! A [`JobServer`] is one connection to an executor endpoint; a
//! [`JobServerConnector`] turns a [`ComputeResource`] into such a connection.
//! [`HttpJobServer`] speaks the executor's REST job API. With the `test-utils`
//! feature, [`memory::InMemoryJobServer`] simulates an executor in process.

use async_trait::async_trait;
use nestor_utils::error::JobServerError;
use std::fmt;
use std::sync::Arc;

pub mod http;
mod http_client;
pub mod readiness;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use http::{HttpConnector, HttpJobServer};
pub use http_client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use readiness::{ReadinessPolicy, wait_for_job_server};
pub use types::{ARGUMENTS_ENV_VAR, ComputeResource, JobInfo, JobStatus, JobSubmission};

/// One connection to a job server.
///
/// Every method is a single round trip. Implementations never retry.
#[async_trait]
pub trait JobServer: Send + Sync + fmt::Debug {
    /// Start a job and return the id the server assigned to it
    async fn submit(&self, submission: &JobSubmission) -> Result<String, JobServerError>;

    /// Current state of a job; `JobServerError::NotFound` when the server has no record of it
    async fn job_info(&self, job_id: &str) -> Result<JobInfo, JobServerError>;

    /// Everything the job has written to stdout so far
    async fn logs(&self, job_id: &str) -> Result<String, JobServerError>;

    /// Ask the server to stop a job; `true` when the request was accepted
    async fn stop(&self, job_id: &str) -> Result<bool, JobServerError>;

    /// Server version; doubles as a readiness probe
    async fn version(&self) -> Result<String, JobServerError>;
}

/// Opens [`JobServer`] connections for compute resources.
pub trait JobServerConnector: Send + Sync {
    /// Connect to the job server of `resource`
    ///
    /// # Errors
    ///
    /// Returns `JobServerError::Misconfiguration` if the resource cannot be addressed
    fn connect(&self, resource: &ComputeResource) -> Result<Arc<dyn JobServer>, JobServerError>;
}
