//! The orchestration façade: provider registry plus job entry points

use nestor_catalog::CatalogClient;
use nestor_config::Config;
use nestor_jobserver::{ComputeResource, HttpConnector, JobServerConnector, JobStatus};
use nestor_program::NestedProgram;
use nestor_utils::error::{ConfigError, JobError, NestorError, ProviderError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info};

use crate::job::{Job, SharedStatus};
use crate::provider::Provider;
use crate::submitter::JobSubmitter;

/// Job server address and job id
type JobKey = (String, String);

/// Entry point for running nested programs and finding their jobs again.
///
/// Holds the provider registry and the active provider. Several clients may
/// coexist with different active providers.
///
/// The client also remembers the observed status of every job handle it has
/// handed out that is still alive, keyed by job server address and job id, so
/// all its handles to one job agree once a terminal state has been seen.
#[derive(Debug)]
pub struct NestorClient {
    providers: HashMap<String, Provider>,
    active: Option<String>,
    submitter: JobSubmitter,
    jobs: Mutex<HashMap<JobKey, Weak<Mutex<JobStatus>>>>,
}

impl NestorClient {
    /// Empty client talking to job servers through `connector`
    pub fn with_connector(connector: Arc<dyn JobServerConnector>) -> Self {
        Self {
            providers: HashMap::new(),
            active: None,
            submitter: JobSubmitter::new(connector),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Client over HTTP with the configured providers, timeouts and launcher.
    ///
    /// # Errors
    ///
    /// `NestorError::Provider` when a provider has no resources or the active
    /// provider is not configured; `NestorError::Config` when the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, NestorError> {
        let connector = HttpConnector::with_timeouts(config.request_timeout(), config.connect_timeout())
            .map_err(|e| ConfigError::InvalidValue {
                key: "client".to_string(),
                value: e.to_string(),
            })?;

        let mut client = Self::with_connector(Arc::new(connector)).with_launcher(config.launcher());
        for provider in &config.providers {
            client.register(Provider::try_from(provider)?);
        }
        if let Some(active) = &config.client.active_provider {
            client.set_provider(active)?;
        }
        Ok(client)
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.submitter = self.submitter.with_launcher(launcher);
        self
    }

    /// Add `provider`, replacing any provider registered under the same name.
    pub fn register(&mut self, provider: Provider) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_some() {
            debug!(provider = %name, "Replaced registered provider");
        } else {
            debug!(provider = %name, "Registered provider");
        }
    }

    /// Make `name` the provider used for submissions and lookups.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unknown` if no provider has that name; the
    /// previous selection is kept.
    pub fn set_provider(&mut self, name: &str) -> Result<(), ProviderError> {
        if !self.providers.contains_key(name) {
            return Err(ProviderError::Unknown {
                name: name.to_string(),
                registered: self.providers(),
            });
        }
        self.active = Some(name.to_string());
        info!(provider = %name, "Active provider set");
        Ok(())
    }

    /// Registered provider names, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// # Errors
    ///
    /// Returns `ProviderError::NoActiveProvider` until a provider is set.
    pub fn active_provider(&self) -> Result<&Provider, ProviderError> {
        self.active
            .as_deref()
            .and_then(|name| self.providers.get(name))
            .ok_or(ProviderError::NoActiveProvider)
    }

    pub fn submitter(&self) -> &JobSubmitter {
        &self.submitter
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobKey, Weak<Mutex<JobStatus>>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job_key(resource: &ComputeResource, job_id: &str) -> JobKey {
        (resource.base_url(), job_id.to_string())
    }

    /// Observed status of a live handle to `job_id` on `resource`, if any
    fn tracked_status(&self, resource: &ComputeResource, job_id: &str) -> Option<SharedStatus> {
        self.jobs()
            .get(&Self::job_key(resource, job_id))
            .and_then(Weak::upgrade)
    }

    fn track(&self, job: &Job) {
        let mut jobs = self.jobs();
        jobs.retain(|_, observed| observed.strong_count() > 0);
        jobs.insert(
            Self::job_key(job.resource(), job.job_id()),
            Arc::downgrade(job.shared_status()),
        );
    }

    async fn submit_to(&self, resource: &ComputeResource, program: &NestedProgram) -> Result<Job, NestorError> {
        let job = self.submitter.submit(resource, program).await?;
        self.track(&job);
        info!(
            provider = self.active.as_deref().unwrap_or_default(),
            job_id = %job.job_id(),
            resource = %resource.name,
            "Started nested program '{}'",
            program.title()
        );
        Ok(job)
    }

    /// Run `program` on the resource the active provider selects.
    ///
    /// # Errors
    ///
    /// `NestorError::Provider` without an active provider, otherwise the
    /// submission failure.
    pub async fn run(&self, program: &NestedProgram) -> Result<Job, NestorError> {
        let resource = self.active_provider()?.select();
        self.submit_to(resource, program).await
    }

    /// Run `program` on the active provider's resource named `resource`.
    ///
    /// # Errors
    ///
    /// `ProviderError::UnknownResource` when the active provider has no such
    /// resource; see [`NestorClient::run`] for the rest.
    pub async fn run_on(&self, program: &NestedProgram, resource: &str) -> Result<Job, NestorError> {
        let resource = self.active_provider()?.resource_named(resource)?;
        self.submit_to(resource, program).await
    }

    /// Look up the newest catalog entry titled `title` and run it.
    ///
    /// # Errors
    ///
    /// Catalog failures, including an entry that is not a valid program, and
    /// everything [`NestorClient::run`] returns.
    pub async fn run_from_catalog(&self, catalog: &CatalogClient, title: &str) -> Result<Job, NestorError> {
        self.active_provider()?;
        let program = catalog.find_by_title(title).await?.to_program()?;
        self.run(&program).await
    }

    /// Handle for an existing job on the active provider's current resource.
    ///
    /// When this client still holds a handle to the job, the new handle shares
    /// its observed status.
    ///
    /// # Errors
    ///
    /// `JobError::NotFound` when that job server has no record of `job_id`.
    pub async fn get_job_by_id(&self, job_id: &str) -> Result<Job, NestorError> {
        let resource = self.active_provider()?.current().clone();
        let server = self
            .submitter
            .connector()
            .connect(&resource)
            .map_err(|e| JobError::from_server(job_id, &resource.name, e))?;

        let info = server
            .job_info(job_id)
            .await
            .map_err(|e| JobError::from_server(job_id, &resource.name, e))?;
        debug!(job_id, resource = %resource.name, status = %info.status, "Found existing job");

        let observed = self
            .tracked_status(&resource, job_id)
            .unwrap_or_else(|| Arc::new(Mutex::new(info.status)));
        let job = Job::restored(job_id.to_string(), resource, server, observed, info.status);
        self.track(&job);
        Ok(job)
    }
}
