//! Foundation utilities shared by every nestor crate.
//!
//! - [`error`]: the typed error taxonomy and user-facing reporting
//! - [`exit_codes`]: stable CLI exit codes derived from errors
//! - [`logging`]: tracing subscriber setup and structured log helpers
//! - [`redaction`]: scrubbing credentials out of transport error text

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;

pub use error::NestorError;
pub use exit_codes::ExitCode;
