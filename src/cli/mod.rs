//! Command-line interface for nestor
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions and parsing structures (clap)
//! - `run`: Main entry point and command dispatch
//! - `commands`: Command implementations
//! - `output`: JSON output shapes

pub mod args;
mod commands;
mod output;
mod run;

pub use args::{CatalogCommands, Cli, Commands, ProgramArgs, RunArgs, build_cli};
pub use commands::build_program;
pub use output::emit_jcs;
pub use run::run;
