//! Configuration model, discovery, and validation for nestor.
//!
//! Configuration is loaded with precedence CLI flags > config file > built-in
//! defaults. See [`Config::discover`] for the discovery rules.

mod discovery;
mod model;
mod sources;
mod validation;

pub use model::{
    CatalogConfig, CliArgs, ClientConfig, ComputeResourceConfig, Config, ConfigSource,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_LAUNCHER, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS, ProviderConfig, ResourceSelection,
};
