//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Initialises logging
//! - Builds CliArgs and discovers Config
//! - Creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;
use nestor_config::{CliArgs, Config};
use nestor_utils::ExitCode;
use nestor_utils::error::{
    ArgumentError, CatalogError, ConfigError, JobError, NestorError, ProgramError, ProviderError,
    SubmissionError,
};
use nestor_utils::logging::{LogFormat, init_tracing};
use nestor_utils::redaction::redact_error_message;

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Prints all output, including errors. main.rs only turns the returned code
/// into the process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = init_tracing(cli.verbose, format) {
        eprintln!("warning: logging disabled: {e}");
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        provider: cli.provider.clone(),
        request_timeout_secs: cli.timeout,
        launcher: cli.launcher.clone(),
        catalog_url: cli.catalog_url.clone(),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            return Err(report(err));
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run(args) => commands::execute_run_command(args, &config).await,
            Commands::Status { job_id, json } => {
                commands::execute_status_command(&job_id, json, &config).await
            }
            Commands::Logs { job_id } => commands::execute_logs_command(&job_id, &config).await,
            Commands::Stop { job_id } => commands::execute_stop_command(&job_id, &config).await,
            Commands::Wait { job_id, max_wait } => {
                commands::execute_wait_command(&job_id, max_wait, &config).await
            }
            Commands::Providers { json } => commands::execute_providers_command(json, &config),
            Commands::Catalog(cmd) => commands::execute_catalog_command(cmd, &config).await,
        }
    });

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(err) => Err(report(err)),
    }
}

/// Print `err` for the user and pick its exit code.
fn report(err: anyhow::Error) -> ExitCode {
    match into_nestor_error(err) {
        Ok(nestor_error) => {
            eprint!("{}", nestor_error.display_for_user());
            nestor_error.to_exit_code()
        }
        Err(other) => {
            eprintln!("✗ Unexpected error: {}", redact_error_message(&format!("{other:#}")));
            eprintln!("\n  Run with --verbose for more detailed output");
            ExitCode::INTERNAL
        }
    }
}

/// Recover the typed error behind an `anyhow::Error`, if there is one.
fn into_nestor_error(err: anyhow::Error) -> Result<NestorError, anyhow::Error> {
    let err = match err.downcast::<NestorError>() {
        Ok(e) => return Ok(e),
        Err(err) => err,
    };
    let err = match err.downcast::<ConfigError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<ProviderError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<ProgramError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<ArgumentError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<SubmissionError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<JobError>() {
        Ok(e) => return Ok(e.into()),
        Err(err) => err,
    };
    match err.downcast::<CatalogError>() {
        Ok(e) => Ok(e.into()),
        Err(err) => {
            // Config discovery wraps its errors in context; keep the message, reuse the code.
            if err.chain().any(|cause| cause.downcast_ref::<ConfigError>().is_some())
                || err.to_string().starts_with("Failed to load config file")
            {
                Ok(ConfigError::InvalidFile(format!("{err:#}")).into())
            } else {
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_typed_errors_are_recovered() {
        let err = anyhow::Error::new(ProviderError::NoActiveProvider);
        let recovered = into_nestor_error(err).unwrap();
        assert_eq!(recovered.to_exit_code(), ExitCode::CONFIG);

        let err = anyhow::Error::new(JobError::NotFound {
            job_id: "raysubmit_1".to_string(),
            resource: "docker".to_string(),
        });
        assert_eq!(
            into_nestor_error(err).unwrap().to_exit_code(),
            ExitCode::JOB_NOT_FOUND
        );
    }

    #[test]
    fn test_context_wrapped_config_error_is_config() {
        let err = Err::<(), _>(ConfigError::MissingRequired("x".to_string()))
            .context("Failed to load config file: /tmp/x")
            .unwrap_err();
        assert_eq!(into_nestor_error(err).unwrap().to_exit_code(), ExitCode::CONFIG);
    }

    #[test]
    fn test_untyped_error_stays_untyped() {
        assert!(into_nestor_error(anyhow::anyhow!("boom")).is_err());
    }
}
