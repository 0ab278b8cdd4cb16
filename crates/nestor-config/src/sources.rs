use std::collections::BTreeMap;

use super::{Config, ConfigSource};

impl Config {
    /// Get effective configuration as key-value pairs with source attribution.
    ///
    /// Keys are dotted (`client.launcher`, `catalog.base_url`); the map is
    /// ordered so the output is stable for display.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = self
                .source_attribution
                .get(key)
                .cloned()
                .unwrap_or(ConfigSource::Default);
            config.insert(key.to_string(), (value, source));
        };

        if let Some(active) = &self.client.active_provider {
            add("client.active_provider", active.clone());
        }
        add(
            "client.request_timeout_secs",
            self.request_timeout().as_secs().to_string(),
        );
        add(
            "client.connect_timeout_secs",
            self.connect_timeout().as_secs().to_string(),
        );
        add(
            "client.poll_interval_ms",
            self.poll_interval().as_millis().to_string(),
        );
        add("client.launcher", self.launcher().to_string());
        if let Some(url) = &self.catalog.base_url {
            add("catalog.base_url", url.clone());
        }
        if !self.providers.is_empty() {
            let names: Vec<&str> = self.providers.iter().map(|p| p.name.as_str()).collect();
            add("providers", names.join(", "));
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_reports_defaults() {
        let config = Config::single_provider("docker", "localhost", 8265);
        let effective = config.effective_config();

        let (launcher, source) = effective.get("client.launcher").unwrap();
        assert_eq!(launcher, "python");
        assert_eq!(*source, ConfigSource::Default);

        let (providers, _) = effective.get("providers").unwrap();
        assert_eq!(providers, "docker");
        assert!(effective.contains_key("client.active_provider"));
        assert!(!effective.contains_key("catalog.base_url"));
    }
}
