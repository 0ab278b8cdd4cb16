//! Waiting for a freshly started job server to accept requests

use nestor_utils::error::JobServerError;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::JobServerConnector;
use crate::types::ComputeResource;

/// How long [`wait_for_job_server`] keeps probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Number of probes before giving up (at least one is always made)
    pub attempts: u32,
    /// Delay after the first failed probe; the n-th failure waits `n * base_delay`
    pub base_delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ReadinessPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Probe `resource` until its job server answers a version request.
///
/// Returns the reported version, or the error of the last probe once
/// `policy.attempts` probes have failed.
///
/// # Errors
///
/// Returns `JobServerError::Misconfiguration` immediately if the resource cannot
/// be addressed; otherwise the last probe's error.
pub async fn wait_for_job_server(
    connector: &dyn JobServerConnector,
    resource: &ComputeResource,
    policy: &ReadinessPolicy,
) -> Result<String, JobServerError> {
    let server = connector.connect(resource)?;
    let attempts = policy.attempts.max(1);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match server.version().await {
            Ok(version) => {
                info!(resource = %resource.name, version = %version, attempt, "Job server is ready");
                return Ok(version);
            }
            Err(err) if attempt < attempts => {
                let delay = policy.delay_after(attempt);
                debug!(
                    resource = %resource.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Job server not ready, will retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                warn!(resource = %resource.name, attempts, error = %err, "Job server never became ready");
                return Err(err);
            }
        }
    }
}
