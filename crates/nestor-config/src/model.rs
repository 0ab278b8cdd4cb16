use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-request timeout against job servers and the catalog
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default interval between status polls while waiting on a job
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default command placed in front of the entrypoint
pub const DEFAULT_LAUNCHER: &str = "python";

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value loaded from configuration file.
    Config,
    /// Built-in default value (lowest precedence).
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Config => write!(f, "config"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// How a provider with several compute resources picks one per submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSelection {
    /// Always the first declared resource
    #[default]
    First,
    /// Cycle through resources in declaration order
    RoundRobin,
}

impl fmt::Display for ResourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::RoundRobin => write!(f, "round_robin"),
        }
    }
}

/// `[client]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Provider selected when no `--provider` flag is given
    pub active_provider: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,
    /// Interval between status polls in milliseconds
    pub poll_interval_ms: Option<u64>,
    /// Command prefix for the entrypoint (`""` submits the entrypoint verbatim)
    pub launcher: Option<String>,
}

/// One `[[providers.compute_resources]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComputeResourceConfig {
    pub name: String,
    pub host: String,
    pub port_job_server: u16,
}

/// One `[[providers]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub selection: ResourceSelection,
    #[serde(default)]
    pub compute_resources: Vec<ComputeResourceConfig>,
}

/// `[catalog]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog service, e.g. `http://localhost:8000`
    pub base_url: Option<String>,
    /// Environment variable holding a bearer token for write access
    pub token_env: Option<String>,
}

/// Configuration for nestor operations.
///
/// # Configuration File Format
///
/// ```toml
/// [client]
/// active_provider = "docker"
/// request_timeout_secs = 30
/// launcher = "python"
///
/// [[providers]]
/// name = "docker"
/// selection = "first"
///
/// [[providers.compute_resources]]
/// name = "docker"
/// host = "localhost"
/// port_job_server = 8265
///
/// [catalog]
/// base_url = "http://localhost:8000"
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub client: ClientConfig,
    pub providers: Vec<ProviderConfig>,
    pub catalog: CatalogConfig,
    /// Path of the loaded config file, if any
    pub config_path: Option<PathBuf>,
    /// Source of each effective value, keyed by dotted name
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Config {
    /// Effective request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.client
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Effective connect timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.client
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Effective poll interval
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.client.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Effective launcher
    #[must_use]
    pub fn launcher(&self) -> &str {
        self.client.launcher.as_deref().unwrap_or(DEFAULT_LAUNCHER)
    }

    /// Look up a configured provider by name
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// A config with one single-resource provider, for tests and examples.
    #[must_use]
    pub fn single_provider(name: &str, host: &str, port_job_server: u16) -> Self {
        Self {
            client: ClientConfig {
                active_provider: Some(name.to_string()),
                ..ClientConfig::default()
            },
            providers: vec![ProviderConfig {
                name: name.to_string(),
                selection: ResourceSelection::First,
                compute_resources: vec![ComputeResourceConfig {
                    name: name.to_string(),
                    host: host.to_string(),
                    port_job_server,
                }],
            }],
            ..Self::default()
        }
    }
}

/// Configuration values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file (skips discovery)
    pub config_path: Option<PathBuf>,
    /// Overrides `[client] active_provider`
    pub provider: Option<String>,
    /// Overrides `[client] request_timeout_secs`
    pub request_timeout_secs: Option<u64>,
    /// Overrides `[client] launcher`
    pub launcher: Option<String>,
    /// Overrides `[catalog] base_url`
    pub catalog_url: Option<String>,
}
