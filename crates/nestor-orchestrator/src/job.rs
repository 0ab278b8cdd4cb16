//! Client-side handle to one remote job
//!
//! A [`Job`] never sets its own status. Every transition is observed by
//! polling the job server; once a terminal state has been observed the handle
//! keeps reporting it, whatever the server says afterwards.
//!
//! Handles for the same job obtained from one `NestorClient` (the submitted
//! handle, its clones and every `get_job_by_id` result) share one observed
//! status, so the terminal guarantee holds per job id within that client.
//! Handles from separate clients or processes only share what the server
//! reports.

use nestor_jobserver::{ComputeResource, JobInfo, JobServer, JobStatus};
use nestor_utils::error::{JobError, JobServerError};
use nestor_utils::logging::job_span;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, debug, info};

/// Observed status shared by every handle to one job
pub(crate) type SharedStatus = Arc<Mutex<JobStatus>>;

/// Handle to a job running on a compute resource.
///
/// Clones share their observed status.
#[derive(Clone)]
pub struct Job {
    job_id: String,
    resource: ComputeResource,
    server: Arc<dyn JobServer>,
    observed: SharedStatus,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("job_id", &self.job_id)
            .field("resource", &self.resource)
            .field("last_known_status", &self.last_known_status())
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Handle for a job the server just accepted
    pub(crate) fn submitted(
        job_id: String,
        resource: ComputeResource,
        server: Arc<dyn JobServer>,
    ) -> Self {
        Self {
            job_id,
            resource,
            server,
            observed: Arc::new(Mutex::new(JobStatus::Pending)),
        }
    }

    /// Handle for an existing job over `observed`, recording the freshly
    /// `reported` status. A terminal status already in `observed` is kept.
    pub(crate) fn restored(
        job_id: String,
        resource: ComputeResource,
        server: Arc<dyn JobServer>,
        observed: SharedStatus,
        reported: JobStatus,
    ) -> Self {
        let job = Self {
            job_id,
            resource,
            server,
            observed,
        };
        job.observe(reported);
        job
    }

    pub(crate) fn shared_status(&self) -> &SharedStatus {
        &self.observed
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn resource(&self) -> &ComputeResource {
        &self.resource
    }

    /// Status seen by the most recent query, without contacting the server
    pub fn last_known_status(&self) -> JobStatus {
        *self.observed()
    }

    fn observed(&self) -> MutexGuard<'_, JobStatus> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn terminal_status(&self) -> Option<JobStatus> {
        let status = self.last_known_status();
        status.is_terminal().then_some(status)
    }

    /// Record `reported` and return the status the handle now stands by.
    fn observe(&self, reported: JobStatus) -> JobStatus {
        let mut observed = self.observed();
        if observed.is_terminal() {
            if reported != *observed {
                debug!(
                    job_id = %self.job_id,
                    kept = %*observed,
                    reported = %reported,
                    "Ignoring status reported after a terminal state"
                );
            }
            return *observed;
        }
        if reported != *observed {
            info!(job_id = %self.job_id, from = %*observed, to = %reported, "Job status changed");
            *observed = reported;
        }
        reported
    }

    fn error(&self, source: JobServerError) -> JobError {
        JobError::from_server(&self.job_id, &self.resource.name, source)
    }

    fn span(&self) -> tracing::Span {
        job_span(&self.job_id, &self.resource.name)
    }

    /// Full job details from one server query; `status` is the monotonic view.
    ///
    /// # Errors
    ///
    /// `JobError::NotFound` when the server no longer knows the job, otherwise
    /// the transport or protocol failure of the query.
    pub async fn info(&self) -> Result<JobInfo, JobError> {
        let mut info = self
            .server
            .job_info(&self.job_id)
            .instrument(self.span())
            .await
            .map_err(|e| self.error(e))?;
        info.status = self.observe(info.status);
        Ok(info)
    }

    /// Current status. Once a terminal status has been observed it is returned
    /// without another query.
    ///
    /// # Errors
    ///
    /// See [`Job::info`].
    pub async fn status(&self) -> Result<JobStatus, JobError> {
        if let Some(status) = self.terminal_status() {
            return Ok(status);
        }
        Ok(self.info().await?.status)
    }

    /// Everything the job has written to stdout so far
    ///
    /// # Errors
    ///
    /// See [`Job::info`].
    pub async fn logs(&self) -> Result<String, JobError> {
        self.server
            .logs(&self.job_id)
            .instrument(self.span())
            .await
            .map_err(|e| self.error(e))
    }

    /// Ask the server to stop the job.
    ///
    /// Returns `false` without contacting the server when the job is already
    /// known to be terminal. Acceptance does not change the observed status;
    /// the next [`Job::status`] reports `STOPPED` once the server has acted.
    ///
    /// # Errors
    ///
    /// See [`Job::info`].
    pub async fn stop(&self) -> Result<bool, JobError> {
        if self.terminal_status().is_some() {
            return Ok(false);
        }
        let accepted = self
            .server
            .stop(&self.job_id)
            .instrument(self.span())
            .await
            .map_err(|e| self.error(e))?;
        info!(job_id = %self.job_id, accepted, "Requested job stop");
        Ok(accepted)
    }

    /// Poll until the job is terminal.
    ///
    /// # Errors
    ///
    /// Returns `JobError::WaitTimeout` when `timeout` elapses first, or the
    /// error of a failed poll.
    pub async fn wait_for_terminal(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<JobStatus, JobError> {
        let started = Instant::now();
        loop {
            let status = self.status().await?;
            if status.is_terminal() {
                return Ok(status);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(JobError::WaitTimeout {
                    job_id: self.job_id.clone(),
                    waited,
                    last_status: status.to_string(),
                });
            }
            tokio::time::sleep(poll_interval.min(timeout - waited)).await;
        }
    }
}
