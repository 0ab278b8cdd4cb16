//! Running nested programs on providers and tracking the resulting jobs.
//!
//! [`NestorClient`] owns a registry of [`Provider`]s and the active provider.
//! `run` resolves a [`ComputeResource`] through the provider's
//! [`ResourceSelector`], hands the program to the [`JobSubmitter`] and
//! returns a [`Job`] handle. `get_job_by_id` rebuilds a handle for a job
//! started earlier, possibly by another process.
//!
//! ```rust,no_run
//! use nestor_orchestrator::{NestorClient, Provider};
//! use nestor_jobserver::HttpConnector;
//! use nestor_program::NestedProgram;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = NestorClient::with_connector(Arc::new(HttpConnector::new()?));
//! client.register(Provider::single("docker", "localhost", 8265));
//! client.set_provider("docker")?;
//!
//! let program = NestedProgram::builder("simple_job", "job.py")
//!     .argument("one", &1)
//!     .build()?;
//! let job = client.run(&program).await?;
//! let status = job
//!     .wait_for_terminal(Duration::from_secs(1), Duration::from_secs(600))
//!     .await?;
//! println!("{} finished {status}: {}", job.job_id(), job.logs().await?);
//! # Ok(())
//! # }
//! ```

mod client;
mod job;
mod provider;
mod submitter;

pub use client::NestorClient;
pub use job::Job;
pub use nestor_jobserver::JobStatus;
pub use provider::{ComputeResource, Provider, ResourceSelector};
pub use submitter::JobSubmitter;
