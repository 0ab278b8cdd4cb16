//! Logging and observability setup for nestor
//!
//! Library crates only emit `tracing` events; the binary installs the
//! subscriber once through [`init_tracing`].

use std::io::IsTerminal;
use tracing::{Level, span};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Build the filter used by [`init_tracing`].
///
/// `RUST_LOG` wins when set; otherwise verbose mode enables debug output for
/// the nestor crates.
#[must_use]
pub fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("nestor=debug,info")
            } else {
                EnvFilter::try_new("nestor=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr so stdout stays reserved for command output (job ids,
/// JSON status, logs).
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(
    verbose: bool,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = default_filter(verbose);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(use_color())
                        .with_target(verbose)
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span covering every call made on behalf of one job.
#[must_use]
pub fn job_span(job_id: &str, resource: &str) -> tracing::Span {
    span!(Level::INFO, "job", job_id = %job_id, resource = %resource)
}

/// Span covering one submission attempt.
#[must_use]
pub fn submission_span(title: &str, resource: &str) -> tracing::Span {
    span!(Level::INFO, "submission", title = %title, resource = %resource)
}
