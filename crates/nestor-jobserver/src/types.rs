//! Core types shared by every job server implementation

use chrono::{DateTime, Utc};
use nestor_program::NestedProgram;
use nestor_utils::error::ArgumentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable through which the executor hands encoded arguments to
/// the entrypoint.
pub const ARGUMENTS_ENV_VAR: &str = "ENV_JOB_ARGUMENTS";

/// Lifecycle state of a remote job.
///
/// `PENDING → RUNNING → {SUCCEEDED, FAILED}` and `{PENDING, RUNNING} → STOPPED`.
/// There is no transition out of a terminal state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::VariantNames,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Stopped,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Whether no further transitions can happen
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Succeeded | Self::Failed)
    }

    /// Whether the job finished and succeeded
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Address of one job server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputeResource {
    pub name: String,
    pub host: String,
    pub port_job_server: u16,
}

impl ComputeResource {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port_job_server: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port_job_server,
        }
    }

    /// Base URL of the job server, `http://{host}:{port}` unless `host`
    /// carries its own scheme. A path after the host is kept behind the port.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        let (scheme, rest) = host.split_once("://").unwrap_or(("http", host));
        match rest.split_once('/') {
            Some((authority, path)) => {
                format!("{scheme}://{authority}:{}/{path}", self.port_job_server)
            }
            None => format!("{scheme}://{rest}:{}", self.port_job_server),
        }
    }
}

impl fmt::Display for ComputeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port_job_server)
    }
}

/// Everything a job server needs to start one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSubmission {
    /// Program title, sent as job metadata
    pub title: String,
    /// Full command line: launcher followed by the quoted entrypoint
    pub command: String,
    pub working_dir: String,
    /// Arguments as produced by `ArgumentCodec::encode`
    pub encoded_arguments: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

impl JobSubmission {
    /// Package a program for submission.
    ///
    /// `launcher` is placed in front of the entrypoint; an empty launcher
    /// leaves the entrypoint as the whole command.
    pub fn from_program(program: &NestedProgram, launcher: &str) -> Result<Self, ArgumentError> {
        Ok(Self {
            title: program.title().to_string(),
            command: command_line(launcher, program.entrypoint()),
            working_dir: program.working_dir().to_string(),
            encoded_arguments: program.encoded_arguments()?,
            description: program.description().map(str::to_string),
            version: program.version().map(str::to_string),
        })
    }
}

/// Build the command line for `entrypoint`.
#[must_use]
pub fn command_line(launcher: &str, entrypoint: &str) -> String {
    let launcher = launcher.trim();
    if launcher.is_empty() {
        entrypoint.to_string()
    } else {
        format!("{launcher} {}", shell_words::quote(entrypoint))
    }
}

/// Snapshot of a job as reported by its job server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub job_id: String,
    pub status: JobStatus,
    /// Human-readable detail the server attached to the status
    pub message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}
