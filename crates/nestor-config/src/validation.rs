use std::collections::HashSet;

use nestor_utils::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.client.request_timeout_secs {
            if timeout == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "request_timeout_secs".to_string(),
                    value: "must be greater than 0".to_string(),
                });
            }
            if timeout > 3600 {
                return Err(ConfigError::InvalidValue {
                    key: "request_timeout_secs".to_string(),
                    value: "exceeds maximum limit of 3600 seconds".to_string(),
                });
            }
        }

        if self.client.connect_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "connect_timeout_secs".to_string(),
                value: "must be greater than 0".to_string(),
            });
        }

        if let Some(interval) = self.client.poll_interval_ms
            && interval < 10
        {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_ms".to_string(),
                value: "must be at least 10 milliseconds".to_string(),
            });
        }

        let mut provider_names = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "providers.name".to_string(),
                    value: "must not be empty".to_string(),
                });
            }
            if !provider_names.insert(provider.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "providers.name".to_string(),
                    value: format!("duplicate provider '{}'", provider.name),
                });
            }
            if provider.compute_resources.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("providers.{}.compute_resources", provider.name),
                    value: "at least one compute resource is required".to_string(),
                });
            }

            let mut resource_names = HashSet::new();
            for resource in &provider.compute_resources {
                if !resource_names.insert(resource.name.as_str()) {
                    return Err(ConfigError::InvalidValue {
                        key: format!("providers.{}.compute_resources", provider.name),
                        value: format!("duplicate compute resource '{}'", resource.name),
                    });
                }
                if resource.host.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: format!("providers.{}.{}.host", provider.name, resource.name),
                        value: "must not be empty".to_string(),
                    });
                }
                if resource.port_job_server == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: format!(
                            "providers.{}.{}.port_job_server",
                            provider.name, resource.name
                        ),
                        value: "must be a non-zero port".to_string(),
                    });
                }
            }
        }

        if let Some(active) = &self.client.active_provider
            && !provider_names.contains(active.as_str())
        {
            return Err(ConfigError::InvalidValue {
                key: "active_provider".to_string(),
                value: format!("'{active}' is not a configured provider"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComputeResourceConfig, ProviderConfig, ResourceSelection};

    fn resource(name: &str) -> ComputeResourceConfig {
        ComputeResourceConfig {
            name: name.to_string(),
            host: "localhost".to_string(),
            port_job_server: 8265,
        }
    }

    fn invalid_key(config: &Config) -> String {
        match config.validate() {
            Err(ConfigError::InvalidValue { key, .. }) => key,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_single_provider_is_valid() {
        let config = Config::single_provider("docker", "localhost", 8265);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = Config::single_provider("docker", "localhost", 8265);
        config.client.request_timeout_secs = Some(0);
        assert_eq!(invalid_key(&config), "request_timeout_secs");
    }

    #[test]
    fn test_rejects_provider_without_resources() {
        let mut config = Config::single_provider("docker", "localhost", 8265);
        config.providers[0].compute_resources.clear();
        assert_eq!(invalid_key(&config), "providers.docker.compute_resources");
    }

    #[test]
    fn test_rejects_duplicate_resource_names() {
        let mut config = Config::single_provider("docker", "localhost", 8265);
        let duplicate = config.providers[0].compute_resources[0].clone();
        config.providers[0].compute_resources.push(duplicate);
        assert_eq!(invalid_key(&config), "providers.docker.compute_resources");
    }

    #[test]
    fn test_rejects_duplicate_provider_names() {
        let mut config = Config::single_provider("docker", "localhost", 8265);
        config.providers.push(ProviderConfig {
            name: "docker".to_string(),
            selection: ResourceSelection::RoundRobin,
            compute_resources: vec![resource("other")],
        });
        assert_eq!(invalid_key(&config), "providers.name");
    }

    #[test]
    fn test_rejects_unknown_active_provider() {
        let mut config = Config::single_provider("docker", "localhost", 8265);
        config.client.active_provider = Some("gpu".to_string());
        assert_eq!(invalid_key(&config), "active_provider");
    }

    #[test]
    fn test_rejects_zero_port() {
        let config = Config::single_provider("docker", "localhost", 0);
        assert_eq!(invalid_key(&config), "providers.docker.docker.port_job_server");
    }
}
