//! Providers: named groups of compute resources

use nestor_config::{ProviderConfig, ResourceSelection};
use nestor_utils::error::ProviderError;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use nestor_jobserver::ComputeResource;

/// Strategy a [`Provider`] uses to pick one of its resources per submission.
#[derive(Debug, Default)]
pub enum ResourceSelector {
    /// Always the first resource
    #[default]
    First,
    /// Resources in declaration order, wrapping around
    RoundRobin(AtomicUsize),
}

impl ResourceSelector {
    #[must_use]
    pub fn round_robin() -> Self {
        Self::RoundRobin(AtomicUsize::new(0))
    }

    /// Index of the resource for the next submission; advances round robin.
    fn next_index(&self, len: usize) -> usize {
        match self {
            Self::First => 0,
            Self::RoundRobin(next) => next.fetch_add(1, Ordering::Relaxed) % len,
        }
    }

    /// Index of the resource most recently handed out, without advancing.
    fn current_index(&self, len: usize) -> usize {
        match self {
            Self::First => 0,
            Self::RoundRobin(next) => next.load(Ordering::Relaxed).saturating_sub(1) % len,
        }
    }
}

impl Clone for ResourceSelector {
    fn clone(&self) -> Self {
        match self {
            Self::First => Self::First,
            Self::RoundRobin(next) => Self::RoundRobin(AtomicUsize::new(next.load(Ordering::Relaxed))),
        }
    }
}

impl From<ResourceSelection> for ResourceSelector {
    fn from(selection: ResourceSelection) -> Self {
        match selection {
            ResourceSelection::First => Self::First,
            ResourceSelection::RoundRobin => Self::round_robin(),
        }
    }
}

/// A named, non-empty set of compute resources.
#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    resources: Vec<ComputeResource>,
    selector: ResourceSelector,
}

impl Provider {
    /// # Errors
    ///
    /// Returns `ProviderError::NoComputeResources` if `resources` is empty.
    pub fn new(
        name: impl Into<String>,
        resources: Vec<ComputeResource>,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        if resources.is_empty() {
            return Err(ProviderError::NoComputeResources { provider: name });
        }
        Ok(Self {
            name,
            resources,
            selector: ResourceSelector::First,
        })
    }

    /// Provider with a single resource named after the provider
    #[must_use]
    pub fn single(name: impl Into<String>, host: impl Into<String>, port_job_server: u16) -> Self {
        let name = name.into();
        Self {
            resources: vec![ComputeResource::new(name.clone(), host, port_job_server)],
            name,
            selector: ResourceSelector::First,
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: ResourceSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> &[ComputeResource] {
        &self.resources
    }

    pub fn selector(&self) -> &ResourceSelector {
        &self.selector
    }

    /// Resource for the next submission
    pub fn select(&self) -> &ComputeResource {
        &self.resources[self.selector.next_index(self.resources.len())]
    }

    /// Resource the provider currently resolves to, without advancing the selector
    pub fn current(&self) -> &ComputeResource {
        &self.resources[self.selector.current_index(self.resources.len())]
    }

    /// # Errors
    ///
    /// Returns `ProviderError::UnknownResource` if no resource has that name.
    pub fn resource_named(&self, name: &str) -> Result<&ComputeResource, ProviderError> {
        self.resources
            .iter()
            .find(|resource| resource.name == name)
            .ok_or_else(|| ProviderError::UnknownResource {
                provider: self.name.clone(),
                resource: name.to_string(),
            })
    }
}

impl TryFrom<&ProviderConfig> for Provider {
    type Error = ProviderError;

    fn try_from(config: &ProviderConfig) -> Result<Self, Self::Error> {
        let resources = config
            .compute_resources
            .iter()
            .map(|r| ComputeResource::new(&r.name, &r.host, r.port_job_server))
            .collect();
        Ok(Self::new(&config.name, resources)?.with_selector(config.selection.into()))
    }
}
