use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `NestorError` is the roll-up of every typed failure a nestor operation can
/// produce. Each variant wraps a narrower error enum so callers can match on
/// exactly the failure class they care about:
///
/// | Category | Description |
/// |----------|-------------|
/// | `Config` | Configuration file or CLI argument errors |
/// | `Program` | Invalid nested program definition (including arguments) |
/// | `Provider` | Unknown provider, no active provider, bad resource name |
/// | `Submission` | The job server could not accept a submission |
/// | `Job` | Status, logs, stop or lookup of an existing job failed |
/// | `Catalog` | The catalog service could not be queried |
///
/// # Exit Code Mapping
///
/// Use [`to_exit_code()`](Self::to_exit_code) to map errors to CLI exit codes.
///
/// # Library vs CLI Usage
///
/// Library code returns `NestorError` (or one of the narrower enums) and never
/// calls `std::process::exit()`.
#[derive(Error, Debug)]
pub enum NestorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid nested program: {0}")]
    Program(#[from] ProgramError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ArgumentError> for NestorError {
    fn from(err: ArgumentError) -> Self {
        Self::Program(ProgramError::Argument(err))
    }
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Network,
    JobLifecycle,
    Catalog,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Validation => write!(f, "Validation"),
            Self::Network => write!(f, "Network"),
            Self::JobLifecycle => write!(f, "Job Lifecycle"),
            Self::Catalog => write!(f, "Catalog"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => format!("Configuration file has invalid format: {reason}"),
            Self::MissingRequired(key) => format!("Required configuration '{key}' is missing"),
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with optional [client], [catalog] and [[providers]] sections."
                    .to_string(),
            ),
            Self::NotFound { .. } => Some(
                "nestor searches for .nestor/config.toml starting from the current directory upward."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Make sure every [[providers]] entry has at least one [[providers.compute_resources]]"
                    .to_string(),
            ],
            Self::MissingRequired(key) => vec![
                format!("Add '{key}' to .nestor/config.toml"),
                "Use CLI flags as a temporary workaround".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "active_provider" => vec![
                    "Set active_provider to the name of a configured provider".to_string(),
                    "List configured providers with 'nestor providers'".to_string(),
                ],
                _ => vec![
                    "Check the documentation for valid values for this option".to_string(),
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { .. } => vec![
                "Create .nestor/config.toml in your project root".to_string(),
                "Use --config <path> to point at an existing file".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// An argument value that cannot be transported to a remote executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("argument '{path}' is not JSON-serializable: {reason}")]
    NotSerializable { path: String, reason: String },

    #[error("arguments must serialize to a mapping, got {found}")]
    NotAMapping { found: String },

    #[error("argument '{path}' exceeds the maximum nesting depth of {limit}")]
    TooDeep { path: String, limit: usize },

    #[error("failed to encode arguments: {0}")]
    Encode(String),

    #[error("failed to decode arguments: {0}")]
    Decode(String),
}

impl ArgumentError {
    /// Dotted path of the offending argument, when the error is tied to one.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotSerializable { path, .. } | Self::TooDeep { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl UserFriendlyError for ArgumentError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some(
            "Arguments are sent to the job server as JSON; only null, booleans, finite numbers, \
             strings, sequences and string-keyed mappings can be transported."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotSerializable { path, .. } => vec![
                format!("Convert '{path}' to a plain list, number or string before submitting"),
                "Binary buffers should be encoded (e.g. base64) or stored out of band".to_string(),
            ],
            Self::TooDeep { .. } => vec!["Flatten the argument structure".to_string()],
            Self::NotAMapping { .. } => {
                vec!["Pass arguments as a JSON object keyed by argument name".to_string()]
            }
            Self::Encode(_) | Self::Decode(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Invalid nested program definition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("field '{field}' must not be empty")]
    EmptyField { field: &'static str },

    #[error("working directory is not valid UTF-8: {0}")]
    NonUtf8WorkingDir(String),

    #[error(transparent)]
    Argument(#[from] ArgumentError),
}

impl UserFriendlyError for ProgramError {
    fn user_message(&self) -> String {
        match self {
            Self::Argument(err) => err.user_message(),
            other => format!("Nested program definition is invalid: {other}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Argument(err) => err.context(),
            Self::EmptyField { .. } => Some(
                "A nested program needs a title (its job name and catalog key) and an entrypoint."
                    .to_string(),
            ),
            Self::NonUtf8WorkingDir(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Argument(err) => err.suggestions(),
            Self::EmptyField { field } => vec![format!("Provide a non-empty --{field}")],
            Self::NonUtf8WorkingDir(_) => {
                vec!["Move the program into a directory with a UTF-8 path".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Provider registry and compute resource resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("unknown provider '{name}' (registered: {})", format_names(.registered))]
    Unknown {
        name: String,
        registered: Vec<String>,
    },

    #[error("no active provider; select one before submitting")]
    NoActiveProvider,

    #[error("provider '{provider}' has no compute resources")]
    NoComputeResources { provider: String },

    #[error("provider '{provider}' has no compute resource named '{resource}'")]
    UnknownResource { provider: String, resource: String },
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl UserFriendlyError for ProviderError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Providers are registered on the client or declared under [[providers]] in the config file.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Unknown { registered, .. } if !registered.is_empty() => {
                vec![format!("Use one of: {}", registered.join(", "))]
            }
            Self::Unknown { .. } => vec!["Register a provider first".to_string()],
            Self::NoActiveProvider => vec![
                "Pass --provider <name>".to_string(),
                "Set [client] active_provider in .nestor/config.toml".to_string(),
            ],
            Self::NoComputeResources { .. } => {
                vec!["Add a [[providers.compute_resources]] entry".to_string()]
            }
            Self::UnknownResource { .. } => {
                vec!["Check the resource names with 'nestor providers'".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Failure of a single round trip to a job server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobServerError {
    /// Connection refused, DNS failure, reset, body read failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// The job server has no record of the job
    #[error("job '{job_id}' not found")]
    NotFound { job_id: String },

    /// Non-success HTTP status other than 404
    #[error("job server returned {status}: {message}")]
    Http { status: u16, message: String },

    /// The response did not have the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection could not be set up from the given settings
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl UserFriendlyError for JobServerError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("Could not reach the job server: {msg}"),
            Self::Timeout { duration } => format!("Job server did not answer within {duration:?}"),
            Self::NotFound { job_id } => format!("Job server has no job '{job_id}'"),
            Self::Http { status, message } => format!("Job server rejected the request ({status}): {message}"),
            Self::Protocol(msg) => format!("Unexpected job server response: {msg}"),
            Self::Misconfiguration(msg) => format!("Job server connection is misconfigured: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => Some(
                "The compute resource may still be starting up or the host/port may be wrong."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => vec![
                "Check host and port_job_server of the compute resource".to_string(),
                "Retry once the job server accepts connections".to_string(),
            ],
            Self::Misconfiguration(_) => vec!["Review the [client] section of the config".to_string()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

/// A submission did not produce a remote job.
///
/// Retryable by the caller with its own backoff; nestor never retries a
/// submission internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("submission of '{title}' to {resource} failed: {source}")]
    Rejected {
        title: String,
        resource: String,
        #[source]
        source: JobServerError,
    },

    #[error("arguments of '{title}' could not be encoded: {source}")]
    Encoding {
        title: String,
        #[source]
        source: ArgumentError,
    },
}

impl UserFriendlyError for SubmissionError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Rejected { source, .. } => source.context(),
            Self::Encoding { source, .. } => source.context(),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Rejected { source, .. } => {
                let mut suggestions = source.suggestions();
                suggestions.push("No job was created; it is safe to submit again".to_string());
                suggestions
            }
            Self::Encoding { source, .. } => source.suggestions(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

/// Errors observing or controlling an existing job
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job '{job_id}' not found on {resource}")]
    NotFound { job_id: String, resource: String },

    #[error("job '{job_id}': {source}")]
    Server {
        job_id: String,
        #[source]
        source: JobServerError,
    },

    #[error("job '{job_id}' reported an unrecognised state: {reason}")]
    Protocol { job_id: String, reason: String },

    #[error("job '{job_id}' still {last_status} after {waited:?}")]
    WaitTimeout {
        job_id: String,
        waited: Duration,
        last_status: String,
    },
}

impl JobError {
    /// Attach a job id to a job server failure.
    ///
    /// 404s become `NotFound` and unreadable answers become `Protocol`; every
    /// other failure is wrapped in `Server`.
    #[must_use]
    pub fn from_server(job_id: &str, resource: &str, source: JobServerError) -> Self {
        match source {
            JobServerError::NotFound { .. } => Self::NotFound {
                job_id: job_id.to_string(),
                resource: resource.to_string(),
            },
            JobServerError::Protocol(reason) => Self::Protocol {
                job_id: job_id.to_string(),
                reason,
            },
            other => Self::Server {
                job_id: job_id.to_string(),
                source: other,
            },
        }
    }
}

impl UserFriendlyError for JobError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => Some(
                "Jobs are looked up on the compute resource the active provider resolves to."
                    .to_string(),
            ),
            Self::Server { source, .. } => source.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } => vec![
                "Check that the same provider is active as when the job was submitted".to_string(),
            ],
            Self::Server { source, .. } => source.suggestions(),
            Self::WaitTimeout { .. } => vec!["Increase --timeout or poll again later".to_string()],
            Self::Protocol { .. } => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::JobLifecycle
    }
}

/// Catalog service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("catalog returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("no nested program titled '{title}' in the catalog")]
    NotFound { title: String },

    #[error("no catalog entry with id '{id}'")]
    EntryNotFound { id: String },

    #[error("catalog writes need an API token; set the variable named by [catalog] token_env")]
    MissingToken,

    #[error("catalog response could not be decoded: {0}")]
    Decode(String),

    #[error("catalog entry '{title}' is not a valid nested program: {source}")]
    InvalidEntry {
        title: String,
        #[source]
        source: ProgramError,
    },

    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl UserFriendlyError for CatalogError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("The catalog is queried at [catalog] base_url.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } => vec!["Titles are matched exactly, including case".to_string()],
            Self::Misconfiguration(_) => vec!["Set [catalog] base_url in .nestor/config.toml".to_string()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Catalog
    }
}

impl UserFriendlyError for NestorError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Program(e) => e.user_message(),
            Self::Provider(e) => e.user_message(),
            Self::Submission(e) => e.user_message(),
            Self::Job(e) => e.user_message(),
            Self::Catalog(e) => e.user_message(),
            Self::Io(e) => format!("File system error: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Program(e) => e.context(),
            Self::Provider(e) => e.context(),
            Self::Submission(e) => e.context(),
            Self::Job(e) => e.context(),
            Self::Catalog(e) => e.context(),
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Program(e) => e.suggestions(),
            Self::Provider(e) => e.suggestions(),
            Self::Submission(e) => e.suggestions(),
            Self::Job(e) => e.suggestions(),
            Self::Catalog(e) => e.suggestions(),
            Self::Io(_) => vec!["Check file permissions".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Program(e) => e.category(),
            Self::Provider(e) => e.category(),
            Self::Submission(e) => e.category(),
            Self::Job(e) => e.category(),
            Self::Catalog(e) => e.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl NestorError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// The result is passed through [`redact_error_message`](crate::redaction::redact_error_message)
    /// so credentials from URLs never reach the terminal.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        crate::redaction::redact_error_message(&output)
    }

    /// Map this error to the appropriate CLI exit code.
    ///
    /// | Exit Code | Name | Description |
    /// |-----------|------|-------------|
    /// | 1 | INTERNAL | IO and other failures |
    /// | 2 | CONFIG | Configuration, provider selection, catalog setup |
    /// | 3 | INVALID_PROGRAM | Program definition or arguments rejected |
    /// | 4 | SUBMISSION_FAILED | Job server refused or was unreachable |
    /// | 5 | JOB_NOT_FOUND | Job id unknown to the job server |
    /// | 7 | WAIT_TIMEOUT | Job did not reach a terminal state in time |
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            Self::Config(_) | Self::Provider(_) => ExitCode::CONFIG,
            Self::Program(_) => ExitCode::INVALID_PROGRAM,
            Self::Submission(_) => ExitCode::SUBMISSION_FAILED,
            Self::Job(job_err) => match job_err {
                JobError::NotFound { .. } => ExitCode::JOB_NOT_FOUND,
                JobError::WaitTimeout { .. } => ExitCode::WAIT_TIMEOUT,
                _ => ExitCode::INTERNAL,
            },
            Self::Catalog(catalog_err) => match catalog_err {
                CatalogError::Misconfiguration(_) | CatalogError::MissingToken => ExitCode::CONFIG,
                CatalogError::InvalidEntry { .. } => ExitCode::INVALID_PROGRAM,
                _ => ExitCode::INTERNAL,
            },
            Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}
