use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CatalogConfig, CliArgs, ClientConfig, Config, ConfigSource, ProviderConfig};

/// Environment variable pointing at a directory that holds `config.toml`
pub const NESTOR_HOME_ENV: &str = "NESTOR_HOME";

const CONFIG_DIR: &str = ".nestor";
const CONFIG_FILE: &str = "config.toml";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    client: Option<ClientConfig>,
    #[serde(default)]
    providers: Vec<ProviderConfig>,
    catalog: Option<CatalogConfig>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Config file lookup order:
    /// 1. `cli_args.config_path` when given
    /// 2. `$NESTOR_HOME/config.toml` when the variable is set
    /// 3. `.nestor/config.toml` searching upward from the current directory
    /// 4. `<user config dir>/nestor/config.toml`
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid depending on the
    /// process working directory.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut source_attribution = HashMap::new();

        for key in [
            "client.request_timeout_secs",
            "client.connect_timeout_secs",
            "client.poll_interval_ms",
            "client.launcher",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(nestor_utils::error::ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        let mut client = ClientConfig::default();
        let mut providers = Vec::new();
        let mut catalog = CatalogConfig::default();

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading config file");
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;

            if let Some(file_client) = file_config.client {
                let mut apply = |key: &str, present: bool| {
                    if present {
                        source_attribution.insert(format!("client.{key}"), ConfigSource::Config);
                    }
                };
                apply("active_provider", file_client.active_provider.is_some());
                apply(
                    "request_timeout_secs",
                    file_client.request_timeout_secs.is_some(),
                );
                apply(
                    "connect_timeout_secs",
                    file_client.connect_timeout_secs.is_some(),
                );
                apply("poll_interval_ms", file_client.poll_interval_ms.is_some());
                apply("launcher", file_client.launcher.is_some());
                client = file_client;
            }

            if !file_config.providers.is_empty() {
                source_attribution.insert("providers".to_string(), ConfigSource::Config);
                providers = file_config.providers;
            }

            if let Some(file_catalog) = file_config.catalog {
                if file_catalog.base_url.is_some() {
                    source_attribution.insert("catalog.base_url".to_string(), ConfigSource::Config);
                }
                catalog = file_catalog;
            }
        }

        // CLI overrides
        if let Some(provider) = &cli_args.provider {
            client.active_provider = Some(provider.clone());
            source_attribution.insert("client.active_provider".to_string(), ConfigSource::Cli);
        }
        if let Some(timeout) = cli_args.request_timeout_secs {
            client.request_timeout_secs = Some(timeout);
            source_attribution.insert("client.request_timeout_secs".to_string(), ConfigSource::Cli);
        }
        if let Some(launcher) = &cli_args.launcher {
            client.launcher = Some(launcher.clone());
            source_attribution.insert("client.launcher".to_string(), ConfigSource::Cli);
        }
        if let Some(url) = &cli_args.catalog_url {
            catalog.base_url = Some(url.clone());
            source_attribution.insert("catalog.base_url".to_string(), ConfigSource::Cli);
        }

        let config = Self {
            client,
            providers,
            catalog,
            config_path,
            source_attribution,
        };

        config.validate()?;

        Ok(config)
    }

    /// Find the config file that applies to `start_dir`, if any.
    ///
    /// Walks up the directory tree looking for `.nestor/config.toml`, stopping
    /// at repository root markers (.git, .hg) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        if let Some(home) = std::env::var_os(NESTOR_HOME_ENV) {
            let candidate = PathBuf::from(home).join(CONFIG_FILE);
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        let mut current_dir = Some(start_dir);
        while let Some(dir) = current_dir {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.exists() {
                return Ok(Some(candidate));
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }

            current_dir = dir.parent();
        }

        if let Some(user_dir) = dirs::config_dir() {
            let candidate = user_dir.join("nestor").join(CONFIG_FILE);
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    /// Load configuration from TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: TomlConfig = toml::from_str(&content).map_err(|e| {
            nestor_utils::error::ConfigError::InvalidFile(format!("{}: {e}", path.display()))
        })?;
        Ok(config)
    }
}
