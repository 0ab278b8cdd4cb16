//! In-process job server for tests.
//!
//! [`InMemoryJobServer`] follows the same state machine as a real executor:
//! a submitted job is `PENDING`, turns `RUNNING`, and ends in the outcome of
//! its [`JobScript`]. Each `job_info` call advances the job by one poll, so
//! tests drive time by polling.

use async_trait::async_trait;
use chrono::Utc;
use nestor_utils::error::JobServerError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::{ComputeResource, JobInfo, JobStatus, JobSubmission};
use crate::{JobServer, JobServerConnector};

/// Version string reported by [`InMemoryJobServer`]
pub const IN_MEMORY_VERSION: &str = "in-memory";

/// Scripted behavior of a job, selected by program title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobScript {
    /// Polls answered with `PENDING`
    pub pending_polls: u32,
    /// Polls answered with `RUNNING` after the pending ones
    pub running_polls: u32,
    /// Terminal state afterwards; `None` keeps the job running until stopped
    pub outcome: Option<JobStatus>,
    /// Stdout, visible once the job has started
    pub logs: String,
}

impl JobScript {
    /// One pending poll, one running poll, then `SUCCEEDED`
    pub fn succeeds(logs: impl Into<String>) -> Self {
        Self {
            pending_polls: 1,
            running_polls: 1,
            outcome: Some(JobStatus::Succeeded),
            logs: logs.into(),
        }
    }

    /// One pending poll, one running poll, then `FAILED`
    pub fn fails(logs: impl Into<String>) -> Self {
        Self {
            outcome: Some(JobStatus::Failed),
            ..Self::succeeds(logs)
        }
    }

    /// Runs until stopped
    pub fn runs_forever() -> Self {
        Self {
            outcome: None,
            ..Self::succeeds("")
        }
    }

    #[must_use]
    pub fn with_polls(mut self, pending_polls: u32, running_polls: u32) -> Self {
        self.pending_polls = pending_polls;
        self.running_polls = running_polls;
        self
    }
}

impl Default for JobScript {
    fn default() -> Self {
        Self::succeeds("")
    }
}

#[derive(Debug)]
struct SimulatedJob {
    script: JobScript,
    polls: u32,
    status: JobStatus,
    /// Status reported regardless of the script, to model a misbehaving server
    reported: Option<JobStatus>,
    /// Raw state string the server cannot map to a `JobStatus`
    unrecognised: Option<String>,
}

impl SimulatedJob {
    fn advance(&mut self) -> JobStatus {
        if let Some(reported) = self.reported {
            return reported;
        }
        if self.status.is_terminal() {
            return self.status;
        }

        self.polls += 1;
        let script = &self.script;
        self.status = if self.polls <= script.pending_polls {
            JobStatus::Pending
        } else if self.polls <= script.pending_polls + script.running_polls {
            JobStatus::Running
        } else {
            script.outcome.unwrap_or(JobStatus::Running)
        };
        self.status
    }
}

#[derive(Debug, Default)]
struct ServerState {
    next_id: u64,
    jobs: HashMap<String, SimulatedJob>,
    scripts: HashMap<String, JobScript>,
    submissions: Vec<JobSubmission>,
    failing_submissions: u32,
    failing_version_probes: u32,
}

/// [`JobServer`] that runs nothing and keeps every job in memory.
#[derive(Debug, Default)]
pub struct InMemoryJobServer {
    state: Mutex<ServerState>,
}

impl InMemoryJobServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script jobs submitted under `title`
    pub fn set_script(&self, title: impl Into<String>, script: JobScript) {
        self.state().scripts.insert(title.into(), script);
    }

    /// Reject the next `count` submissions with a transport error
    pub fn fail_next_submissions(&self, count: u32) {
        self.state().failing_submissions = count;
    }

    /// Fail the next `count` version probes with a transport error
    pub fn fail_version_probes(&self, count: u32) {
        self.state().failing_version_probes = count;
    }

    pub fn remaining_version_failures(&self) -> u32 {
        self.state().failing_version_probes
    }

    /// Every submission accepted so far, in order
    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.state().submissions.clone()
    }

    /// Make the server report `status` for `job_id` from now on
    pub fn report_status(&self, job_id: &str, status: JobStatus) {
        if let Some(job) = self.state().jobs.get_mut(job_id) {
            job.reported = Some(status);
        }
    }

    /// Make the server answer status queries for `job_id` with a state
    /// string outside the known set
    pub fn report_unrecognised(&self, job_id: &str, raw: impl Into<String>) {
        if let Some(job) = self.state().jobs.get_mut(job_id) {
            job.unrecognised = Some(raw.into());
        }
    }

    /// Drop all knowledge of `job_id`, as after a cluster restart
    pub fn forget(&self, job_id: &str) {
        self.state().jobs.remove(job_id);
    }
}

fn not_found(job_id: &str) -> JobServerError {
    JobServerError::NotFound {
        job_id: job_id.to_string(),
    }
}

#[async_trait]
impl JobServer for InMemoryJobServer {
    async fn submit(&self, submission: &JobSubmission) -> Result<String, JobServerError> {
        let mut state = self.state();
        if state.failing_submissions > 0 {
            state.failing_submissions -= 1;
            return Err(JobServerError::Transport(
                "connection refused (simulated)".to_string(),
            ));
        }

        state.next_id += 1;
        let job_id = format!("raysubmit_{:04}", state.next_id);
        let script = state
            .scripts
            .get(&submission.title)
            .cloned()
            .unwrap_or_default();
        state.jobs.insert(
            job_id.clone(),
            SimulatedJob {
                script,
                polls: 0,
                status: JobStatus::Pending,
                reported: None,
                unrecognised: None,
            },
        );
        state.submissions.push(submission.clone());
        Ok(job_id)
    }

    async fn job_info(&self, job_id: &str) -> Result<JobInfo, JobServerError> {
        let mut state = self.state();
        let job = state.jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;
        if let Some(raw) = &job.unrecognised {
            return Err(JobServerError::Protocol(format!("unknown job status '{raw}'")));
        }
        let status = job.advance();
        Ok(JobInfo {
            job_id: job_id.to_string(),
            status,
            message: None,
            start_time: (status != JobStatus::Pending).then(Utc::now),
            end_time: status.is_terminal().then(Utc::now),
        })
    }

    async fn logs(&self, job_id: &str) -> Result<String, JobServerError> {
        let state = self.state();
        let job = state.jobs.get(job_id).ok_or_else(|| not_found(job_id))?;
        if job.status == JobStatus::Pending {
            Ok(String::new())
        } else {
            Ok(job.script.logs.clone())
        }
    }

    async fn stop(&self, job_id: &str) -> Result<bool, JobServerError> {
        let mut state = self.state();
        let job = state.jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Stopped;
        Ok(true)
    }

    async fn version(&self) -> Result<String, JobServerError> {
        let mut state = self.state();
        if state.failing_version_probes > 0 {
            state.failing_version_probes -= 1;
            return Err(JobServerError::Transport(
                "connection refused (simulated)".to_string(),
            ));
        }
        Ok(IN_MEMORY_VERSION.to_string())
    }
}

/// [`JobServerConnector`] handing out one [`InMemoryJobServer`] per resource
/// address, so reconnecting to a resource sees the same jobs.
#[derive(Debug, Default)]
pub struct InMemoryConnector {
    servers: Mutex<HashMap<String, Arc<InMemoryJobServer>>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server behind `resource`, created on first use
    pub fn server_for(&self, resource: &ComputeResource) -> Arc<InMemoryJobServer> {
        let mut servers = self.servers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(servers.entry(resource.base_url()).or_default())
    }
}

impl JobServerConnector for InMemoryConnector {
    fn connect(&self, resource: &ComputeResource) -> Result<Arc<dyn JobServer>, JobServerError> {
        Ok(self.server_for(resource))
    }
}
