//! Nested program definitions and their argument codec.
//!
//! A [`NestedProgram`] is the unit of work nestor submits: an entrypoint, the
//! directory it runs in, and a mapping of arguments that must survive a JSON
//! round trip to the executor. Validation happens when the program is built,
//! so an invalid program never reaches a job server.

pub mod codec;
pub mod program;
mod serializer;

pub use codec::{ArgumentCodec, Arguments, MAX_ARGUMENT_DEPTH};
pub use program::{NestedProgram, NestedProgramBuilder};
