//! JSON output shapes for `--json` flags
//!
//! All JSON goes through [`emit_jcs`], so output is RFC 8785 canonical and
//! stable across runs for the same data.

use anyhow::{Context, Result};
use nestor_config::{Config, ResourceSelection};
use nestor_jobserver::{JobInfo, JobStatus};
use serde::Serialize;

/// Serialize `value` as canonical JSON (JCS, RFC 8785)
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value).context("Failed to serialize value to JSON")?;
    let json_bytes =
        serde_json_canonicalizer::to_vec(&json_value).context("Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).context("JCS output contained invalid UTF-8")
}

/// `nestor run --json`
#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    pub job_id: &'a str,
    pub provider: &'a str,
    pub resource: &'a str,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

/// `nestor status --json`
#[derive(Debug, Serialize)]
pub struct StatusOutput<'a> {
    pub resource: &'a str,
    pub terminal: bool,
    #[serde(flatten)]
    pub info: &'a JobInfo,
}

#[derive(Debug, Serialize)]
pub struct ResourceOutput<'a> {
    pub name: &'a str,
    pub address: String,
}

/// One entry of `nestor providers --json`
#[derive(Debug, Serialize)]
pub struct ProviderOutput<'a> {
    pub name: &'a str,
    pub active: bool,
    pub selection: ResourceSelection,
    pub compute_resources: Vec<ResourceOutput<'a>>,
}

pub fn provider_outputs(config: &Config) -> Vec<ProviderOutput<'_>> {
    let active = config.client.active_provider.as_deref();
    let mut providers: Vec<_> = config
        .providers
        .iter()
        .map(|provider| ProviderOutput {
            name: &provider.name,
            active: active == Some(provider.name.as_str()),
            selection: provider.selection,
            compute_resources: provider
                .compute_resources
                .iter()
                .map(|resource| ResourceOutput {
                    name: &resource.name,
                    address: nestor_jobserver::ComputeResource::new(
                        &resource.name,
                        &resource.host,
                        resource.port_job_server,
                    )
                    .base_url(),
                })
                .collect(),
        })
        .collect();
    providers.sort_by(|a, b| a.name.cmp(b.name));
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_jcs_sorts_keys() {
        let output = RunOutput {
            job_id: "raysubmit_1",
            provider: "docker",
            resource: "docker",
            status: JobStatus::Pending,
            logs: None,
        };
        assert_eq!(
            emit_jcs(&output).unwrap(),
            r#"{"job_id":"raysubmit_1","provider":"docker","resource":"docker","status":"PENDING"}"#
        );
    }

    #[test]
    fn test_provider_outputs() {
        let mut config = Config::single_provider("docker", "localhost", 8265);
        config.providers.push(nestor_config::ProviderConfig {
            name: "cluster".to_string(),
            selection: ResourceSelection::RoundRobin,
            compute_resources: vec![nestor_config::ComputeResourceConfig {
                name: "head".to_string(),
                host: "https://ray.example".to_string(),
                port_job_server: 443,
            }],
        });

        let outputs = provider_outputs(&config);
        let json = emit_jcs(&outputs).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"[{"active":false,"compute_resources":[{"address":"https://ray.example:443","name":"head"}],"name":"cluster","selection":"round_robin"},"#,
                r#"{"active":true,"compute_resources":[{"address":"http://localhost:8265","name":"docker"}],"name":"docker","selection":"first"}]"#
            )
        );
    }
}
