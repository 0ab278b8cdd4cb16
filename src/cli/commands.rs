//! Command implementations
//!
//! Every command returns the exit code to use on success; errors bubble up to
//! [`super::run`] which reports them and maps them to exit codes.

use anyhow::Result;
use nestor_catalog::{CatalogClient, CatalogEntry, EntryId};
use nestor_config::Config;
use nestor_jobserver::JobStatus;
use nestor_orchestrator::{Job, NestorClient};
use nestor_program::{ArgumentCodec, Arguments, NestedProgram};
use nestor_utils::ExitCode;
use nestor_utils::error::{CatalogError, ConfigError, NestorError};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::args::{CatalogCommands, ProgramArgs, RunArgs};
use super::output::{RunOutput, StatusOutput, emit_jcs, provider_outputs};

/// Build a program from `--title`, `--entrypoint`, `--arguments` and `--arg` flags.
///
/// `--arg KEY=VALUE` parses VALUE as JSON and falls back to the raw text as a
/// string, so `--arg name=alice` and `--arg count=3` both do what they look like.
pub fn build_program(args: &ProgramArgs) -> Result<NestedProgram, NestorError> {
    let title = args
        .title
        .as_deref()
        .ok_or_else(|| ConfigError::MissingRequired("--title".to_string()))?;
    let entrypoint = args
        .entrypoint
        .as_deref()
        .ok_or_else(|| ConfigError::MissingRequired("--entrypoint".to_string()))?;

    let mut arguments = match &args.arguments {
        Some(text) => ArgumentCodec::decode(text)?,
        None => Arguments::new(),
    };
    for item in &args.args {
        let (key, raw) = item.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            key: "--arg".to_string(),
            value: format!("'{item}' is not KEY=VALUE"),
        })?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        arguments.insert(key.to_string(), value);
    }

    let mut builder = NestedProgram::builder(title, entrypoint).arguments(arguments);
    if let Some(dir) = &args.working_dir {
        builder = builder.working_dir_path(dir.clone());
    }
    if let Some(description) = &args.description {
        builder = builder.description(description);
    }
    if let Some(version) = &args.version {
        builder = builder.version(version);
    }
    Ok(builder.build()?)
}

fn nestor_client(config: &Config) -> Result<NestorClient, NestorError> {
    NestorClient::from_config(config)
}

fn catalog_client(config: &Config) -> Result<CatalogClient, NestorError> {
    let base_url = config.catalog.base_url.as_deref().ok_or_else(|| {
        CatalogError::Misconfiguration(
            "no catalog configured; set [catalog] base_url or pass --catalog-url".to_string(),
        )
    })?;
    let token = config
        .catalog
        .token_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok());

    Ok(CatalogClient::with_options(
        base_url,
        token,
        config.request_timeout(),
        config.connect_timeout(),
    )?)
}

fn exit_code_for(status: JobStatus) -> ExitCode {
    if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::JOB_UNSUCCESSFUL
    }
}

async fn find_job(config: &Config, job_id: &str) -> Result<Job, NestorError> {
    nestor_client(config)?.get_job_by_id(job_id).await
}

pub async fn execute_run_command(args: RunArgs, config: &Config) -> Result<ExitCode> {
    let client = nestor_client(config)?;

    let job = match &args.from_catalog {
        None => {
            let program = build_program(&args.program)?;
            match &args.resource {
                Some(resource) => client.run_on(&program, resource).await?,
                None => client.run(&program).await?,
            }
        }
        Some(title) => {
            let catalog = catalog_client(config)?;
            match &args.resource {
                Some(resource) => {
                    let program = catalog.find_by_title(title).await?.to_program()?;
                    client.run_on(&program, resource).await?
                }
                None => client.run_from_catalog(&catalog, title).await?,
            }
        }
    };
    let provider = client.active_provider()?.name().to_string();
    debug!(job_id = %job.job_id(), "Run command submitted job");

    if !args.wait {
        if args.json {
            println!(
                "{}",
                emit_jcs(&RunOutput {
                    job_id: job.job_id(),
                    provider: &provider,
                    resource: &job.resource().name,
                    status: job.last_known_status(),
                    logs: None,
                })?
            );
        } else {
            println!("{}", job.job_id());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let status = job
        .wait_for_terminal(config.poll_interval(), Duration::from_secs(args.max_wait))
        .await?;
    let logs = job.logs().await?;

    if args.json {
        println!(
            "{}",
            emit_jcs(&RunOutput {
                job_id: job.job_id(),
                provider: &provider,
                resource: &job.resource().name,
                status,
                logs: Some(logs),
            })?
        );
    } else {
        print!("{logs}");
        eprintln!("Job {} finished: {status}", job.job_id());
    }
    Ok(exit_code_for(status))
}

pub async fn execute_status_command(job_id: &str, json: bool, config: &Config) -> Result<ExitCode> {
    let job = find_job(config, job_id).await?;
    let info = job.info().await?;

    if json {
        println!(
            "{}",
            emit_jcs(&StatusOutput {
                resource: &job.resource().name,
                terminal: info.status.is_terminal(),
                info: &info,
            })?
        );
    } else {
        println!("{}", info.status);
        if let Some(message) = info.message.as_deref().filter(|m| !m.is_empty()) {
            println!("{message}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn execute_logs_command(job_id: &str, config: &Config) -> Result<ExitCode> {
    let logs = find_job(config, job_id).await?.logs().await?;
    print!("{logs}");
    Ok(ExitCode::SUCCESS)
}

fn stop_message(job_id: &str, accepted: bool, status: JobStatus) -> String {
    if accepted {
        format!("Stop requested for {job_id}")
    } else if status.is_terminal() {
        format!("{job_id} already finished: {status}")
    } else {
        format!("Stop request for {job_id} not accepted; job is {status}")
    }
}

pub async fn execute_stop_command(job_id: &str, config: &Config) -> Result<ExitCode> {
    let job = find_job(config, job_id).await?;
    let accepted = job.stop().await?;
    println!("{}", stop_message(job_id, accepted, job.last_known_status()));
    Ok(ExitCode::SUCCESS)
}

pub async fn execute_wait_command(job_id: &str, max_wait: u64, config: &Config) -> Result<ExitCode> {
    let job = find_job(config, job_id).await?;
    let status = job
        .wait_for_terminal(config.poll_interval(), Duration::from_secs(max_wait))
        .await?;
    println!("{status}");
    Ok(exit_code_for(status))
}

pub fn execute_providers_command(json: bool, config: &Config) -> Result<ExitCode> {
    let providers = provider_outputs(config);
    if json {
        println!("{}", emit_jcs(&providers)?);
        return Ok(ExitCode::SUCCESS);
    }

    if providers.is_empty() {
        println!("No providers configured");
    }
    for provider in &providers {
        let marker = if provider.active { "*" } else { " " };
        println!("{marker} {} ({})", provider.name, provider.selection);
        for resource in &provider.compute_resources {
            println!("    {}  {}", resource.name, resource.address);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_entry(entry: &CatalogEntry) {
    let id = entry.id.as_ref().map(ToString::to_string).unwrap_or_default();
    println!("id:          {id}");
    println!("title:       {}", entry.title);
    println!("entrypoint:  {}", entry.entrypoint);
    if let Some(dir) = &entry.working_dir {
        println!("working_dir: {dir}");
    }
    if let Some(version) = &entry.version {
        println!("version:     {version}");
    }
    if let Some(created) = &entry.created {
        println!("created:     {}", created.to_rfc3339());
    }
    if !entry.arguments.is_null() {
        println!("arguments:   {}", entry.arguments);
    }
}

pub async fn execute_catalog_command(cmd: CatalogCommands, config: &Config) -> Result<ExitCode> {
    match cmd {
        CatalogCommands::List { title, json } => {
            let entries = catalog_client(config)?.list(title.as_deref()).await?;
            if json {
                println!("{}", emit_jcs(&entries)?);
            } else {
                for entry in &entries {
                    let id = entry.id.as_ref().map(ToString::to_string).unwrap_or_default();
                    let version = entry.version.as_deref().unwrap_or("-");
                    println!("{id}\t{}\t{}\t{version}", entry.title, entry.entrypoint);
                }
            }
        }
        CatalogCommands::Show { title, json } => {
            let entry = catalog_client(config)?.find_by_title(&title).await?;
            if json {
                println!("{}", emit_jcs(&entry)?);
            } else {
                print_entry(&entry);
            }
        }
        CatalogCommands::Add(program_args) => {
            let program = build_program(&program_args)?;
            let created = catalog_client(config)?.create(&program).await?;
            let id = created.id.as_ref().map(ToString::to_string).unwrap_or_default();
            println!("{id}");
        }
        CatalogCommands::Remove { id } => {
            let id = id
                .parse::<u64>()
                .map_or_else(|_| EntryId::Text(id.clone()), EntryId::Number);
            catalog_client(config)?.delete(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestor_utils::error::{ArgumentError, ProgramError};
    use serde_json::json;

    fn program_args(args: &[&str]) -> ProgramArgs {
        ProgramArgs {
            title: Some("simple_job".to_string()),
            entrypoint: Some("job.py".to_string()),
            args: args.iter().map(ToString::to_string).collect(),
            ..ProgramArgs::default()
        }
    }

    #[test]
    fn test_arg_values_are_json_or_text() {
        let program = build_program(&program_args(&[
            "one=1",
            r#"json={"two": 2}"#,
            "name=alice",
            "expr=a=b",
        ]))
        .unwrap();

        let arguments = program.arguments();
        assert_eq!(arguments["one"], json!(1));
        assert_eq!(arguments["json"], json!({"two": 2}));
        assert_eq!(arguments["name"], json!("alice"));
        assert_eq!(arguments["expr"], json!("a=b"));
    }

    #[test]
    fn test_arg_overrides_arguments_object() {
        let mut args = program_args(&["one=10"]);
        args.arguments = Some(r#"{"one": 1, "two": 2}"#.to_string());

        let program = build_program(&args).unwrap();
        assert_eq!(program.arguments()["one"], json!(10));
        assert_eq!(program.arguments()["two"], json!(2));
    }

    #[test]
    fn test_arguments_must_be_object() {
        let mut args = program_args(&[]);
        args.arguments = Some("[1, 2]".to_string());

        let err = build_program(&args).unwrap_err();
        assert!(matches!(
            err,
            NestorError::Program(ProgramError::Argument(ArgumentError::NotAMapping { .. }))
        ));
        assert_eq!(err.to_exit_code(), ExitCode::INVALID_PROGRAM);
    }

    #[test]
    fn test_missing_fields_are_usage_errors() {
        let err = build_program(&ProgramArgs::default()).unwrap_err();
        assert_eq!(err.to_exit_code(), ExitCode::CONFIG);

        let err = build_program(&program_args(&["novalue"])).unwrap_err();
        assert_eq!(err.to_exit_code(), ExitCode::CONFIG);
    }

    #[test]
    fn test_stop_message() {
        assert_eq!(
            stop_message("raysubmit_1", true, JobStatus::Running),
            "Stop requested for raysubmit_1"
        );
        assert_eq!(
            stop_message("raysubmit_1", false, JobStatus::Succeeded),
            "raysubmit_1 already finished: SUCCEEDED"
        );
        assert_eq!(
            stop_message("raysubmit_1", false, JobStatus::Running),
            "Stop request for raysubmit_1 not accepted; job is RUNNING"
        );
    }

    #[test]
    fn test_missing_catalog_is_config_error() {
        let err = catalog_client(&Config::default()).unwrap_err();
        assert_eq!(err.to_exit_code(), ExitCode::CONFIG);
    }
}
