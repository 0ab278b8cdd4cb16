use nestor_config::DEFAULT_LAUNCHER;
use nestor_jobserver::{ComputeResource, JobServerConnector, JobSubmission};
use nestor_program::NestedProgram;
use nestor_utils::error::{JobServerError, SubmissionError};
use nestor_utils::logging::submission_span;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, info, warn};

use crate::job::Job;

/// Starts nested programs on compute resources.
///
/// Each submission is a single attempt; a failure means no job was created.
#[derive(Clone)]
pub struct JobSubmitter {
    connector: Arc<dyn JobServerConnector>,
    launcher: String,
}

impl fmt::Debug for JobSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSubmitter")
            .field("launcher", &self.launcher)
            .finish_non_exhaustive()
    }
}

impl JobSubmitter {
    pub fn new(connector: Arc<dyn JobServerConnector>) -> Self {
        Self {
            connector,
            launcher: DEFAULT_LAUNCHER.to_string(),
        }
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    pub fn launcher(&self) -> &str {
        &self.launcher
    }

    pub(crate) fn connector(&self) -> &Arc<dyn JobServerConnector> {
        &self.connector
    }

    /// Submit `program` to `resource` and return a handle in `PENDING`.
    ///
    /// # Errors
    ///
    /// `SubmissionError::Encoding` if the arguments cannot be put on the wire,
    /// `SubmissionError::Rejected` if the job server cannot be reached or refuses.
    pub async fn submit(
        &self,
        resource: &ComputeResource,
        program: &NestedProgram,
    ) -> Result<Job, SubmissionError> {
        let span = submission_span(program.title(), &resource.name);
        async {
            let submission = JobSubmission::from_program(program, &self.launcher).map_err(
                |source| SubmissionError::Encoding {
                    title: program.title().to_string(),
                    source,
                },
            )?;

            let rejected = |source: JobServerError| {
                warn!(error = %source, "Submission failed");
                SubmissionError::Rejected {
                    title: program.title().to_string(),
                    resource: resource.to_string(),
                    source,
                }
            };
            let server = self.connector.connect(resource).map_err(rejected)?;
            let job_id = server.submit(&submission).await.map_err(rejected)?;

            info!(job_id = %job_id, command = %submission.command, "Job submitted");
            Ok(Job::submitted(job_id, resource.clone(), server))
        }
        .instrument(span)
        .await
    }
}
