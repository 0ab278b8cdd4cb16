//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and all subcommand enums.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// nestor - run nested programs on remote job servers
#[derive(Parser, Debug)]
#[command(name = "nestor")]
#[command(about = "Submit nested programs to remote job servers and track their jobs")]
#[command(long_about = r#"
nestor submits a nested program (an entrypoint, a working directory and a set of
JSON arguments) to a compute resource of the active provider, and tracks the
resulting job through its status, logs and cancellation.

EXAMPLES:
  # Run a program on the active provider and wait for it
  nestor run --title simple_job --entrypoint job.py --working-dir ./resources \
      --arg one=1 --arg 'json={"two": 2}' --wait

  # Run the newest catalog definition titled "simple_job"
  nestor run --from-catalog simple_job

  # Inspect a job started earlier
  nestor status raysubmit_8WkTXqS1Ph3MrJ4v --json
  nestor logs raysubmit_8WkTXqS1Ph3MrJ4v
  nestor stop raysubmit_8WkTXqS1Ph3MrJ4v

  # List configured providers
  nestor providers

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is $NESTOR_HOME/config.toml, or discovered by searching upward
  from CWD for .nestor/config.toml
  Use --config to specify an explicit config file path

EXIT CODES:
  0 success, 1 internal error, 2 configuration or usage error,
  3 invalid program or arguments, 4 submission failed, 5 job not found,
  6 job ended FAILED or STOPPED, 7 wait timed out
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider to use instead of [client] active_provider
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Command placed before the entrypoint (empty string for none)
    #[arg(long, global = true)]
    pub launcher: Option<String>,

    /// Catalog service base URL
    #[arg(long, global = true, value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a nested program to the active provider
    Run(RunArgs),

    /// Show the status of a job
    Status {
        /// Job id returned by `nestor run`
        job_id: String,

        /// Output job details as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the output a job has produced so far
    Logs {
        /// Job id returned by `nestor run`
        job_id: String,
    },

    /// Ask the job server to stop a job
    Stop {
        /// Job id returned by `nestor run`
        job_id: String,
    },

    /// Wait until a job reaches a terminal state
    Wait {
        /// Job id returned by `nestor run`
        job_id: String,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS", default_value_t = 600)]
        max_wait: u64,
    },

    /// List configured providers and their compute resources
    Providers {
        /// Output as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Query and edit the nested program catalog
    #[command(subcommand)]
    Catalog(CatalogCommands),
}

/// Definition of a nested program on the command line
#[derive(Args, Debug, Default, Clone)]
pub struct ProgramArgs {
    /// Program title (job name and catalog key)
    #[arg(long)]
    pub title: Option<String>,

    /// Entrypoint, relative to the working directory
    #[arg(long)]
    pub entrypoint: Option<String>,

    /// Working directory shipped with the job
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// One argument as KEY=VALUE; VALUE is parsed as JSON, or taken as a string
    #[arg(long = "arg", value_name = "KEY=VALUE")]
    pub args: Vec<String>,

    /// All arguments as one JSON object; --arg entries are applied on top
    #[arg(long, value_name = "JSON")]
    pub arguments: Option<String>,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Program version
    #[arg(long = "program-version", value_name = "VERSION")]
    pub version: Option<String>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub program: ProgramArgs,

    /// Run the newest catalog definition with this exact title
    #[arg(long, value_name = "TITLE", conflicts_with_all = ["title", "entrypoint"])]
    pub from_catalog: Option<String>,

    /// Compute resource of the active provider to run on
    #[arg(long)]
    pub resource: Option<String>,

    /// Wait for the job to finish and print its logs
    #[arg(long)]
    pub wait: bool,

    /// Seconds to wait with --wait
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    pub max_wait: u64,

    /// Output the submitted job as canonical JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// List catalog entries
    List {
        /// Only entries with exactly this title
        #[arg(long)]
        title: Option<String>,

        /// Output as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the newest entry with this exact title
    Show {
        title: String,

        /// Output as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a program definition (needs an API token)
    Add(ProgramArgs),

    /// Delete an entry by id (needs an API token)
    Remove { id: String },
}

/// Build the CLI command structure (for testing and docs)
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
