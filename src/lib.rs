//! nestor - run nested programs on remote job servers
//!
//! A nested program is an entrypoint, a working directory and a mapping of
//! JSON arguments. nestor validates the arguments up front, submits the
//! program to a compute resource of the active provider, and returns a
//! [`Job`] handle for its status, logs and cancellation.
//!
//! nestor can be used in two ways:
//! - **CLI**: `nestor run`, `nestor status`, `nestor logs`, `nestor stop`, ...
//! - **Library**: build a [`NestorClient`] and drive jobs from async code
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # .nestor/config.toml declares the providers; see nestor_config::Config
//! nestor providers
//! nestor run --title simple_job --entrypoint job.py --arg one=1 --wait
//! nestor status raysubmit_8WkTXqS1Ph3MrJ4v --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use nestor::{Config, NestedProgram, NestorClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), nestor::NestorError> {
//! let client = NestorClient::from_config(&Config::single_provider("docker", "localhost", 8265))?;
//! let program = NestedProgram::builder("simple_job", "job.py")
//!     .working_dir("resources")
//!     .argument("one", &1)
//!     .build()?;
//!
//! let job = client.run(&program).await?;
//! job.wait_for_terminal(Duration::from_secs(1), Duration::from_secs(600)).await?;
//! println!("{}", job.logs().await?);
//! # Ok(())
//! # }
//! ```
//!
//! # JSON Output
//!
//! `--json` output is JCS (RFC 8785) canonical. Use [`emit_jcs`] for the same
//! form in your own integrations.

pub mod cli;

pub use cli::emit_jcs;
pub use nestor_catalog::{CatalogClient, CatalogEntry, EntryId};
pub use nestor_config::{CliArgs, Config, ConfigSource, ResourceSelection};
pub use nestor_jobserver::{
    HttpConnector, JobInfo, JobServer, JobServerConnector, ReadinessPolicy, wait_for_job_server,
};
pub use nestor_orchestrator::{
    ComputeResource, Job, JobStatus, JobSubmitter, NestorClient, Provider, ResourceSelector,
};
pub use nestor_program::{
    ArgumentCodec, Arguments, MAX_ARGUMENT_DEPTH, NestedProgram, NestedProgramBuilder,
};
pub use nestor_utils::error::{
    ArgumentError, CatalogError, ConfigError, JobError, JobServerError, ProgramError,
    ProviderError, SubmissionError, UserFriendlyError,
};
pub use nestor_utils::{ExitCode, NestorError};
